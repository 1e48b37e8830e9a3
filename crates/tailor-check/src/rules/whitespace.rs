use crate::rule::{Rule, RuleContext, RuleError};
use tailor_ast::span::Span;

pub struct TrailingWhitespace;

impl Rule for TrailingWhitespace {
    fn finish(&mut self, cx: &mut RuleContext<'_>) -> Result<(), RuleError> {
        let text = cx.text();
        for line in 1..=cx.lines().line_count() as u32 {
            let Some(span) = cx.lines().line_span(text, line) else {
                break;
            };
            let content = &text[span.range()];
            let kept = content.trim_end_matches([' ', '\t']).len() as u32;
            if kept < span.len() {
                cx.report(
                    Span::new(span.start + kept, span.end),
                    "line should not have trailing whitespace",
                );
            }
        }
        Ok(())
    }
}

pub struct TerminatingNewline;

impl Rule for TerminatingNewline {
    fn finish(&mut self, cx: &mut RuleContext<'_>) -> Result<(), RuleError> {
        let text = cx.text();
        if text.is_empty() {
            return Ok(());
        }
        let end = text.len() as u32;
        if !text.ends_with('\n') {
            cx.report(Span::new(end, end), "file should end with a newline");
            return Ok(());
        }
        let body = text.trim_end_matches(['\n', '\r']).len();
        let tail = &text[body..];
        if tail.matches('\n').count() > 1 {
            // everything after the first newline is surplus
            let first = tail.find('\n').map(|i| body + i + 1).unwrap_or(body) as u32;
            cx.report(
                Span::new(first, end),
                "file should end with exactly one newline",
            );
        }
        Ok(())
    }
}

pub struct LeadingWhitespace;

impl Rule for LeadingWhitespace {
    fn finish(&mut self, cx: &mut RuleContext<'_>) -> Result<(), RuleError> {
        let text = cx.text();
        let leading = text.len() - text.trim_start().len();
        if leading > 0 {
            cx.report(
                Span::new(0, leading as u32),
                "file should not start with whitespace",
            );
        }
        Ok(())
    }
}
