use crate::rule::{Rule, RuleContext, RuleError};
use tailor_ast::span::Span;
use tailor_ast::syntax::{NodeKind, SyntaxNode};

pub struct MaxLineLength {
    limit: usize,
}

impl MaxLineLength {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl Rule for MaxLineLength {
    fn finish(&mut self, cx: &mut RuleContext<'_>) -> Result<(), RuleError> {
        if self.limit == 0 {
            return Ok(());
        }
        let text = cx.text();
        let lines = cx.lines();
        for line in 1..=lines.line_count() as u32 {
            let Some(span) = lines.line_span(text, line) else {
                break;
            };
            let content = &text[span.range()];
            let len = content.chars().count();
            if len <= self.limit {
                continue;
            }
            // point at the first character past the limit
            let over = content
                .char_indices()
                .nth(self.limit)
                .map(|(i, _)| i as u32)
                .unwrap_or(0);
            cx.report(
                Span::new(span.start + over, span.end),
                format!("line is {} characters long; the limit is {}", len, self.limit),
            );
        }
        Ok(())
    }
}

pub struct MaxFileLength {
    limit: usize,
}

impl MaxFileLength {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl Rule for MaxFileLength {
    fn finish(&mut self, cx: &mut RuleContext<'_>) -> Result<(), RuleError> {
        let count = cx.lines().line_count();
        if self.limit == 0 || count <= self.limit {
            return Ok(());
        }
        let first_extra = cx
            .lines()
            .line_span(cx.text(), self.limit as u32 + 1)
            .unwrap_or_default();
        cx.report(
            first_extra,
            format!("file is {} lines long; the limit is {}", count, self.limit),
        );
        Ok(())
    }
}

pub struct MaxNameLength {
    limit: usize,
}

impl MaxNameLength {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl Rule for MaxNameLength {
    fn visit(
        &mut self,
        node: &SyntaxNode,
        ancestors: &[&SyntaxNode],
        cx: &mut RuleContext<'_>,
    ) -> Result<(), RuleError> {
        if self.limit == 0 {
            return Ok(());
        }
        // extensions are named after a type declared elsewhere
        let declares = match node.kind {
            NodeKind::Extension => false,
            NodeKind::Parameter => true,
            NodeKind::Identifier => ancestors.last().is_some_and(|p| p.kind == NodeKind::Pattern),
            kind => kind.is_declaration(),
        };
        let Some(name) = node.name.as_ref().filter(|_| declares) else {
            return Ok(());
        };
        let len = name.bare().chars().count();
        if len > self.limit {
            cx.report(
                name.span,
                format!(
                    "name `{}` is {} characters long; the limit is {}",
                    name.bare(),
                    len,
                    self.limit
                ),
            );
        }
        Ok(())
    }
}

/// Line-count limit for one family of constructs (functions, closures,
/// classes or structs), measured from the first to the last line of the
/// node including attributes and braces.
pub struct MaxConstructLength {
    what: &'static str,
    kinds: &'static [NodeKind],
    limit: usize,
}

impl MaxConstructLength {
    pub fn new(what: &'static str, kinds: &'static [NodeKind], limit: usize) -> Self {
        Self { what, kinds, limit }
    }
}

impl Rule for MaxConstructLength {
    fn visit(
        &mut self,
        node: &SyntaxNode,
        _ancestors: &[&SyntaxNode],
        cx: &mut RuleContext<'_>,
    ) -> Result<(), RuleError> {
        if self.limit == 0 || !self.kinds.contains(&node.kind) || node.span.is_empty() {
            return Ok(());
        }
        let first = cx.lines().line_of(node.span.start);
        let last = cx.lines().line_of(node.span.end - 1);
        let count = (last - first + 1) as usize;
        if count > self.limit {
            let at = node.name.as_ref().map(|n| n.span).unwrap_or(node.span);
            cx.report(
                at,
                format!(
                    "{} is {} lines long; the limit is {}",
                    self.what, count, self.limit
                ),
            );
        }
        Ok(())
    }
}
