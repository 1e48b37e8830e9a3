//! Per-file pipeline: lex, parse, run rules, order the findings.

use crate::diagnostic::{Diagnostic, Severity};
use crate::registry::Registry;
use crate::rule::{Rule, RuleContext, RuleError};
use crate::settings::Settings;
use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tailor_ast::span::{LineIndex, Span};
use tailor_ast::syntax::SyntaxNode;
use tailor_parse::{parse_until, tokenize, ParseError, Token, TokenKind};

pub const INVALID_TOKEN: &str = "invalid-token";
pub const SYNTAX_ERROR: &str = "syntax-error";
pub const PARSE_ERROR: &str = "parse-error";
pub const RULE_FAILURE: &str = "rule-failure";
pub const TIMEOUT: &str = "timeout";
pub const IO_ERROR: &str = "io-error";

/// Ids the engine reports under; rules may not reuse them.
pub const ENGINE_RULES: &[&str] = &[
    INVALID_TOKEN,
    SYNTAX_ERROR,
    PARSE_ERROR,
    RULE_FAILURE,
    TIMEOUT,
    IO_ERROR,
];

/// Tokens lexed between deadline checks.
const LEX_DEADLINE_STRIDE: usize = 1024;

thread_local! {
    static IN_RULE: Cell<bool> = const { Cell::new(false) };
}

/// True while the current thread is running a rule. Lets a panic hook
/// stay quiet about panics the engine turns into `rule-failure`.
pub fn in_rule() -> bool {
    IN_RULE.with(Cell::get)
}

/// Install a panic hook that logs rule panics at debug level instead of
/// printing them, and defers to the previous hook for everything else.
pub fn quiet_rule_panics() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if in_rule() {
            log::debug!("rule panicked: {}", info);
        } else {
            previous(info);
        }
    }));
}

/// Why a rule's traversal stopped early.
enum Interrupt {
    Failed(RuleError),
    Panicked(String),
    Deadline,
}

/// The per-file deadline passed while rules were running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineExceeded;

pub struct Engine {
    registry: Registry,
    settings: Settings,
}

impl Engine {
    pub fn new(registry: Registry, settings: Settings) -> Self {
        Self { registry, settings }
    }

    /// Check one file's text. Never fails: lexer, parser and rule problems
    /// all come back as diagnostics.
    pub fn check_source(&self, text: &str) -> Vec<Diagnostic> {
        let started = Instant::now();
        let deadline = self.settings.timeout.map(|t| started + t);
        let lines = LineIndex::new(text);
        let engine_diag = |rule: &'static str, message: String, span: Span| {
            Diagnostic::new(
                rule,
                Severity::Error,
                message,
                span,
                lines.position(text, span.start),
            )
        };
        let timed_out = || {
            let limit = self.settings.timeout.unwrap_or_default();
            vec![engine_diag(
                TIMEOUT,
                format!("analysis exceeded the {} ms time limit", limit.as_millis()),
                Span::default(),
            )]
        };

        let mut tokens: Vec<Token<'_>> = Vec::new();
        for tok in tokenize(text) {
            if tokens.len() % LEX_DEADLINE_STRIDE == 0 && past(deadline).is_err() {
                return timed_out();
            }
            tokens.push(tok);
        }

        let mut found: Vec<(usize, Diagnostic)> = tokens
            .iter()
            .filter_map(|tok| match tok.kind {
                TokenKind::Error(err) => {
                    Some((0, engine_diag(INVALID_TOKEN, err.to_string(), tok.span)))
                }
                _ => None,
            })
            .collect();

        let parsed = match parse_until(&tokens, deadline) {
            Ok(parsed) => parsed,
            Err(ParseError::Deadline { .. }) => return timed_out(),
            Err(fatal) => {
                log::debug!("parse aborted: {}", fatal);
                return vec![engine_diag(PARSE_ERROR, fatal.to_string(), fatal.span())];
            }
        };
        found.extend(
            parsed
                .errors
                .iter()
                .map(|e| (0, engine_diag(SYNTAX_ERROR, e.message.clone(), e.span))),
        );

        match self.run_rules(&parsed.root, text, &tokens, &lines, deadline) {
            Ok(diagnostics) => found.extend(diagnostics),
            Err(DeadlineExceeded) => return timed_out(),
        }

        found.sort_by_key(|(origin, d)| (d.span.start, *origin));
        log::debug!(
            "checked {} tokens in {:?}",
            tokens.len(),
            started.elapsed()
        );
        found.into_iter().map(|(_, d)| d).collect()
    }

    /// Run every enabled rule over an already parsed file, ordered by
    /// offset and then registration order.
    pub fn check(
        &self,
        root: &SyntaxNode,
        text: &str,
        tokens: &[Token<'_>],
        lines: &LineIndex,
        deadline: Option<Instant>,
    ) -> Result<Vec<Diagnostic>, DeadlineExceeded> {
        let mut found = self.run_rules(root, text, tokens, lines, deadline)?;
        found.sort_by_key(|(origin, d)| (d.span.start, *origin));
        Ok(found.into_iter().map(|(_, d)| d).collect())
    }

    /// Results are tagged with the rule's registration index plus one, so
    /// engine diagnostics (index 0) sort first on ties.
    fn run_rules(
        &self,
        root: &SyntaxNode,
        text: &str,
        tokens: &[Token<'_>],
        lines: &LineIndex,
        deadline: Option<Instant>,
    ) -> Result<Vec<(usize, Diagnostic)>, DeadlineExceeded> {
        let mut out = Vec::new();
        for (index, entry) in self.registry.entries().iter().enumerate() {
            let info = entry.info;
            if !self.settings.is_enabled(info.id) {
                continue;
            }
            let severity = self.settings.severity_for(info.id, info.default_severity);
            let mut cx = RuleContext::new(text, tokens, lines);
            IN_RULE.with(|flag| flag.set(true));
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                let mut rule = (entry.factory)(&self.settings.limits);
                run_rule(rule.as_mut(), root, &mut cx, deadline)
            }))
            .unwrap_or_else(|payload| Err(Interrupt::Panicked(panic_message(payload))));
            IN_RULE.with(|flag| flag.set(false));

            let origin = index + 1;
            match outcome {
                Ok(()) => out.extend(cx.into_findings().into_iter().map(|f| {
                    let position = lines.position(text, f.span.start);
                    (
                        origin,
                        Diagnostic::new(info.id, severity, f.message, f.span, position),
                    )
                })),
                Err(Interrupt::Deadline) => return Err(DeadlineExceeded),
                Err(Interrupt::Failed(err)) => {
                    log::warn!("rule {} failed: {}", info.id, err);
                    out.push((origin, rule_failure(info.id, &err.to_string(), lines, text)));
                }
                Err(Interrupt::Panicked(msg)) => {
                    log::warn!("rule {} panicked: {}", info.id, msg);
                    out.push((origin, rule_failure(info.id, &msg, lines, text)));
                }
            }
        }
        Ok(out)
    }
}

fn rule_failure(id: &str, detail: &str, lines: &LineIndex, text: &str) -> Diagnostic {
    Diagnostic::new(
        RULE_FAILURE,
        Severity::Error,
        format!("rule `{}` failed: {}", id, detail),
        Span::default(),
        lines.position(text, 0),
    )
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

fn run_rule(
    rule: &mut dyn Rule,
    root: &SyntaxNode,
    cx: &mut RuleContext<'_>,
    deadline: Option<Instant>,
) -> Result<(), Interrupt> {
    let mut ancestors = Vec::new();
    walk(rule, root, &mut ancestors, cx, deadline)?;
    past(deadline)?;
    rule.finish(cx).map_err(Interrupt::Failed)
}

fn walk<'t>(
    rule: &mut dyn Rule,
    node: &'t SyntaxNode,
    ancestors: &mut Vec<&'t SyntaxNode>,
    cx: &mut RuleContext<'_>,
    deadline: Option<Instant>,
) -> Result<(), Interrupt> {
    past(deadline)?;
    rule.visit(node, ancestors, cx).map_err(Interrupt::Failed)?;
    ancestors.push(node);
    for child in &node.children {
        walk(rule, child, ancestors, cx, deadline)?;
    }
    ancestors.pop();
    Ok(())
}

fn past(deadline: Option<Instant>) -> Result<(), Interrupt> {
    match deadline {
        Some(d) if Instant::now() >= d => Err(Interrupt::Deadline),
        _ => Ok(()),
    }
}

/// Convenience for callers holding a timeout in milliseconds, `0` meaning
/// no deadline.
pub fn timeout_from_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}
