use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};
use tailor_ast::span::LineIndex;
use tailor_ast::syntax::SyntaxNode;
use tailor_check::engine::{in_rule, quiet_rule_panics, DeadlineExceeded};
use tailor_check::{
    Diagnostic, Engine, Registry, Rule, RuleContext, RuleError, Settings, Severity,
};

const SAMPLE: &str = "let kLimit = 10\nstruct point {}\nfunc Run() {\n    wait(30)\n}\n";

fn summary(diags: &[Diagnostic]) -> Vec<(String, &'static str)> {
    diags
        .iter()
        .map(|d| (d.position.to_string(), d.rule))
        .collect()
}

fn sample_findings() -> Vec<(String, &'static str)> {
    vec![
        ("1:5".to_string(), "constant-k-prefix"),
        ("2:8".to_string(), "upper-camel-case"),
        ("3:6".to_string(), "lower-camel-case"),
        ("4:10".to_string(), "avoid-magic-numeric-literal"),
    ]
}

#[test]
fn independent_violations_each_reported_once() {
    let engine = Engine::new(Registry::builtin(), Settings::default());
    let diags = engine.check_source(SAMPLE);
    assert_eq!(summary(&diags), sample_findings());
    assert_eq!(diags[1].severity, Severity::Error);
    assert_eq!(diags[3].severity, Severity::Warning);
}

struct Refuses;

impl Rule for Refuses {
    fn visit(
        &mut self,
        node: &SyntaxNode,
        _ancestors: &[&SyntaxNode],
        cx: &mut RuleContext<'_>,
    ) -> Result<(), RuleError> {
        // partial output must not leak
        cx.report(node.span, "half done");
        Err(RuleError::Failed("cannot continue".to_string()))
    }
}

struct Explodes;

impl Rule for Explodes {
    fn finish(&mut self, _cx: &mut RuleContext<'_>) -> Result<(), RuleError> {
        panic!("rule bug");
    }
}

#[test]
fn failing_rules_are_isolated() {
    quiet_rule_panics();
    let mut registry = Registry::builtin();
    registry.register("refuses", "always errors", Severity::Warning, |_| Box::new(Refuses));
    registry.register("explodes", "always panics", Severity::Warning, |_| Box::new(Explodes));
    let engine = Engine::new(registry, Settings::default());

    for _ in 0..2 {
        let diags = engine.check_source(SAMPLE);
        let mut expected = vec![
            ("1:1".to_string(), "rule-failure"),
            ("1:1".to_string(), "rule-failure"),
        ];
        expected.extend(sample_findings());
        assert_eq!(summary(&diags), expected);
        assert!(diags[0].message.contains("`refuses`"));
        assert!(diags[0].message.contains("cannot continue"));
        assert!(diags[1].message.contains("`explodes`"));
        assert!(diags[1].message.contains("rule bug"));
        assert!(diags.iter().all(|d| d.message != "half done"));
    }
}

#[test]
fn unterminated_brace_yields_only_parse_error() {
    let engine = Engine::new(Registry::builtin(), Settings::default());
    let diags = engine.check_source("extension Foo {\n    let kBad = 1;   \n");
    assert_eq!(summary(&diags), vec![("1:15".to_string(), "parse-error")]);
    assert_eq!(diags[0].severity, Severity::Error);
}

#[test]
fn lexer_and_syntax_errors_come_with_rule_output() {
    let engine = Engine::new(Registry::builtin(), Settings::default());
    let diags = engine.check_source("print(§)\nfunc 42() {}\nlet kName = 2\n");
    assert_eq!(
        summary(&diags),
        vec![
            ("1:7".to_string(), "invalid-token"),
            ("2:6".to_string(), "syntax-error"),
            ("3:5".to_string(), "constant-k-prefix"),
        ]
    );
}

#[test]
fn overrides_then_cap() {
    let settings = Settings::default()
        .with_severity("avoid-magic-numeric-literal", Severity::Error)
        .with_severity("upper-camel-case", Severity::Warning);
    let diags = Engine::new(Registry::builtin(), settings).check_source(SAMPLE);
    let severities: Vec<_> = diags.iter().map(|d| d.severity).collect();
    assert_eq!(
        severities,
        vec![
            Severity::Warning,
            Severity::Warning,
            Severity::Error,
            Severity::Error
        ]
    );

    let capped = Settings::default().with_max_severity(Severity::Warning);
    let diags = Engine::new(Registry::builtin(), capped).check_source(SAMPLE);
    assert!(diags.iter().all(|d| d.severity == Severity::Warning));
}

#[test]
fn disabled_rules_do_not_run() {
    let settings = Settings::default()
        .disable("constant-k-prefix")
        .disable("avoid-magic-numeric-literal");
    let diags = Engine::new(Registry::builtin(), settings).check_source(SAMPLE);
    let rules: Vec<_> = diags.iter().map(|d| d.rule).collect();
    assert_eq!(rules, vec!["upper-camel-case", "lower-camel-case"]);
}

#[test]
fn expired_deadline_replaces_findings() {
    let settings = Settings::default().with_timeout(Duration::ZERO);
    let diags = Engine::new(Registry::builtin(), settings).check_source(SAMPLE);
    assert_eq!(summary(&diags), vec![("1:1".to_string(), "timeout")]);
}

#[test]
fn check_runs_rules_over_a_parsed_tree() {
    let tokens: Vec<_> = tailor_parse::tokenize(SAMPLE).collect();
    let parsed = tailor_parse::parse(&tokens).expect("sample parses");
    let lines = LineIndex::new(SAMPLE);
    let engine = Engine::new(Registry::builtin(), Settings::default());

    let diags = engine
        .check(&parsed.root, SAMPLE, &tokens, &lines, None)
        .expect("no deadline");
    assert_eq!(summary(&diags), sample_findings());

    let expired = Some(Instant::now());
    assert_eq!(
        engine.check(&parsed.root, SAMPLE, &tokens, &lines, expired),
        Err(DeadlineExceeded)
    );
}

#[test]
fn deadline_covers_lexing_and_parsing() {
    // no rules at all: only the lexer and parser can notice the deadline
    let settings = Settings::default().with_timeout(Duration::ZERO);
    let src = "final\n".repeat(20_000);
    let diags = Engine::new(Registry::new(), settings).check_source(&src);
    assert_eq!(summary(&diags), vec![("1:1".to_string(), "timeout")]);
    assert_eq!(diags[0].message, "analysis exceeded the 0 ms time limit");
}

struct ReportsInRule;

impl Rule for ReportsInRule {
    fn finish(&mut self, cx: &mut RuleContext<'_>) -> Result<(), RuleError> {
        if in_rule() {
            cx.report(tailor_ast::span::Span::new(0, 1), "inside");
        }
        Ok(())
    }
}

#[test]
fn rules_run_flagged_as_in_rule() {
    let mut registry = Registry::new();
    registry.register("reports-in-rule", "test", Severity::Warning, |_| {
        Box::new(ReportsInRule)
    });
    let diags = Engine::new(registry, Settings::default()).check_source("x\n");
    assert_eq!(summary(&diags), vec![("1:1".to_string(), "reports-in-rule")]);
    assert!(!in_rule());
}
