//! The rule capability and the per-file context rules report into.

use tailor_ast::span::{LineIndex, Span};
use tailor_ast::syntax::SyntaxNode;
use tailor_parse::Token;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("{0}")]
    Failed(String),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// A location and message reported by a rule, before the engine attaches
/// the rule id, severity and position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub span: Span,
    pub message: String,
}

/// Read-only view of the file being checked plus the rule's own findings.
pub struct RuleContext<'a> {
    text: &'a str,
    tokens: &'a [Token<'a>],
    lines: &'a LineIndex,
    findings: Vec<Finding>,
}

impl<'a> RuleContext<'a> {
    pub fn new(text: &'a str, tokens: &'a [Token<'a>], lines: &'a LineIndex) -> Self {
        Self {
            text,
            tokens,
            lines,
            findings: Vec::new(),
        }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Full token stream, trivia and error tokens included.
    pub fn tokens(&self) -> &'a [Token<'a>] {
        self.tokens
    }

    pub fn lines(&self) -> &'a LineIndex {
        self.lines
    }

    pub fn report(&mut self, span: Span, message: impl Into<String>) {
        self.findings.push(Finding {
            span,
            message: message.into(),
        });
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }
}

/// A style check. One instance is created per file, so implementations may
/// keep state between `visit` calls but never across files.
///
/// `visit` is called for every node in pre-order with the chain of
/// ancestors (root first); `finish` runs once after the traversal and is
/// where text- and token-level checks live.
pub trait Rule {
    fn visit(
        &mut self,
        _node: &SyntaxNode,
        _ancestors: &[&SyntaxNode],
        _cx: &mut RuleContext<'_>,
    ) -> Result<(), RuleError> {
        Ok(())
    }

    fn finish(&mut self, _cx: &mut RuleContext<'_>) -> Result<(), RuleError> {
        Ok(())
    }
}
