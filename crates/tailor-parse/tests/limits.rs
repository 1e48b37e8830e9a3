//! Nesting, lookahead and time limits. Deep inputs recurse once per body,
//! so the over-limit case runs on a thread with a generous stack.

use std::time::{Duration, Instant};
use tailor_ast::syntax::NodeKind;
use tailor_parse::{parse_str, parse_until, tokenize, ParseError, MAX_NESTING_DEPTH};

fn nested_closures(depth: usize) -> String {
    let mut src = String::new();
    for _ in 0..depth {
        src.push_str("run { ");
    }
    src.push_str("work()");
    for _ in 0..depth {
        src.push_str(" }");
    }
    src.push('\n');
    src
}

#[test]
fn moderate_block_nesting_parses() {
    assert!(parse_str(&nested_closures(50)).is_ok());
}

#[test]
fn moderate_paren_nesting_parses() {
    let src = format!("let x = {}1{}\n", "(".repeat(50), ")".repeat(50));
    assert!(parse_str(&src).is_ok());
}

#[test]
fn excessive_paren_nesting_is_rejected() {
    let depth = MAX_NESTING_DEPTH + 10;
    let src = format!("let x = {}1{}\n", "(".repeat(depth), ")".repeat(depth));
    let err = parse_str(&src).unwrap_err();
    assert!(matches!(err, ParseError::TooDeep { .. }));
    assert!(err.to_string().contains("nesting depth"));
}

#[test]
fn excessive_block_nesting_is_rejected() {
    let src = nested_closures(MAX_NESTING_DEPTH + 10);
    let result = std::thread::Builder::new()
        .stack_size(256 << 20)
        .spawn(move || parse_str(&src).map(|_| ()))
        .expect("spawn")
        .join()
        .expect("no stack overflow");
    assert!(matches!(result, Err(ParseError::TooDeep { .. })));
}

fn on_small_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    std::thread::Builder::new()
        .stack_size(1 << 20)
        .spawn(f)
        .expect("spawn")
        .join()
        .expect("no stack overflow")
}

#[test]
fn long_runs_of_modifier_words_stay_flat() {
    let lines = 60_000;
    let parse = on_small_stack(move || parse_str(&"final\n".repeat(lines)));
    let parse = parse.expect("parse");
    assert_eq!(parse.root.children.len(), lines);
    assert!(parse.root.children.iter().all(|n| n.kind == NodeKind::Statement));

    let one_line = on_small_stack(|| parse_str(&format!("{}func f() {{}}\n", "lazy ".repeat(60_000))));
    assert!(one_line.is_ok());
}

#[test]
fn modifier_runs_still_lead_to_declarations() {
    let parse = parse_str("open class A {}\nfinal\nclass B {}\nprivate(set) var c = 1\n")
        .expect("parse");
    let kinds: Vec<_> = parse.root.children.iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![NodeKind::Class, NodeKind::Statement, NodeKind::Class, NodeKind::Property]
    );
}

#[test]
fn passed_deadline_stops_parsing() {
    let src = "let a = 1\n".repeat(1_000);
    let tokens: Vec<_> = tokenize(&src).collect();

    let err = parse_until(&tokens, Some(Instant::now())).unwrap_err();
    assert!(matches!(err, ParseError::Deadline { .. }));

    let later = Instant::now() + Duration::from_secs(3600);
    assert!(parse_until(&tokens, Some(later)).is_ok());
}
