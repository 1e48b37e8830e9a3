#![forbid(unsafe_code)]
#![deny(unused_must_use)]

pub mod span {
    use serde::Serialize;

    /// Half-open byte range into the source text.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
    pub struct Span {
        pub start: u32,
        pub end: u32,
    }

    impl Span {
        pub fn new(start: u32, end: u32) -> Self {
            debug_assert!(start <= end, "span start {} past end {}", start, end);
            Self { start, end }
        }

        pub fn len(&self) -> u32 {
            self.end - self.start
        }

        pub fn is_empty(&self) -> bool {
            self.start == self.end
        }

        /// True when `other` lies entirely inside `self`.
        pub fn contains(&self, other: Span) -> bool {
            self.start <= other.start && other.end <= self.end
        }

        /// Smallest span covering both `self` and `other`.
        pub fn cover(self, other: Span) -> Span {
            Span {
                start: self.start.min(other.start),
                end: self.end.max(other.end),
            }
        }

        pub fn range(&self) -> std::ops::Range<usize> {
            self.start as usize..self.end as usize
        }
    }

    /// 1-based line and column. Columns count characters, not bytes.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
    pub struct Position {
        pub line: u32,
        pub column: u32,
    }

    impl std::fmt::Display for Position {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}:{}", self.line, self.column)
        }
    }

    /// Offset-to-position lookup table, built once per file.
    #[derive(Debug, Clone)]
    pub struct LineIndex {
        /// Byte offset where each line starts. Always begins with 0.
        starts: Vec<u32>,
        len: u32,
    }

    impl LineIndex {
        pub fn new(text: &str) -> Self {
            let mut starts = vec![0];
            for (i, b) in text.bytes().enumerate() {
                if b == b'\n' {
                    starts.push(i as u32 + 1);
                }
            }
            Self {
                starts,
                len: text.len() as u32,
            }
        }

        /// Number of lines, counting a trailing line without newline.
        /// A file ending in `\n` does not gain an extra empty line.
        pub fn line_count(&self) -> usize {
            match self.starts.last() {
                Some(&last) if last == self.len && self.starts.len() > 1 => self.starts.len() - 1,
                _ if self.len == 0 => 0,
                _ => self.starts.len(),
            }
        }

        /// Byte range of line `line` (1-based), excluding the newline.
        pub fn line_span(&self, text: &str, line: u32) -> Option<Span> {
            let idx = line.checked_sub(1)? as usize;
            let start = *self.starts.get(idx)?;
            let mut end = self
                .starts
                .get(idx + 1)
                .map(|next| next - 1)
                .unwrap_or(self.len);
            if end > start && text.as_bytes().get(end as usize - 1) == Some(&b'\r') {
                end -= 1;
            }
            Some(Span { start, end })
        }

        pub fn line_of(&self, offset: u32) -> u32 {
            match self.starts.binary_search(&offset) {
                Ok(i) => i as u32 + 1,
                Err(i) => i as u32,
            }
        }

        pub fn position(&self, text: &str, offset: u32) -> Position {
            let line = self.line_of(offset);
            let start = self.starts[line as usize - 1] as usize;
            let end = (offset as usize).min(text.len());
            let column = text
                .get(start..end)
                .map(|s| s.chars().count())
                .unwrap_or(end - start) as u32
                + 1;
            Position { line, column }
        }
    }

}

pub mod syntax {
    use super::span::Span;
    use serde::Serialize;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    pub enum NodeKind {
        SourceFile,
        Import,
        Attribute,
        Extension,
        Class,
        Struct,
        Enum,
        Protocol,
        TypeAlias,
        EnumCase,
        Function,
        Initializer,
        Deinitializer,
        Subscript,
        Parameter,
        /// `var` declaration
        Property,
        /// `let` declaration
        Constant,
        /// Destructuring pattern, e.g. `let (a, b) = pair`
        Pattern,
        /// `get`, `set`, `willSet` or `didSet` clause
        Accessor,
        TypeRef,
        WhereClause,
        Block,
        Closure,
        Statement,
        /// Compiler control line such as `#if os(iOS)`
        Directive,
        Identifier,
        IntegerLiteral,
        FloatLiteral,
        StringLiteral,
        /// Unparseable input skipped during recovery
        Error,
    }

    impl NodeKind {
        pub fn is_type_decl(self) -> bool {
            matches!(
                self,
                NodeKind::Class | NodeKind::Struct | NodeKind::Enum | NodeKind::Protocol
            )
        }

        pub fn is_literal(self) -> bool {
            matches!(
                self,
                NodeKind::IntegerLiteral | NodeKind::FloatLiteral | NodeKind::StringLiteral
            )
        }

        /// Kinds that introduce a new declaration scope for their contents.
        pub fn is_declaration(self) -> bool {
            matches!(
                self,
                NodeKind::Extension
                    | NodeKind::Class
                    | NodeKind::Struct
                    | NodeKind::Enum
                    | NodeKind::Protocol
                    | NodeKind::TypeAlias
                    | NodeKind::EnumCase
                    | NodeKind::Function
                    | NodeKind::Initializer
                    | NodeKind::Deinitializer
                    | NodeKind::Subscript
                    | NodeKind::Property
                    | NodeKind::Constant
            )
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    pub struct Ident {
        pub text: String,
        pub span: Span,
    }

    impl Ident {
        /// Name with surrounding backticks removed.
        pub fn bare(&self) -> &str {
            self.text.trim_matches('`')
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    pub struct SyntaxNode {
        pub kind: NodeKind,
        pub span: Span,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub name: Option<Ident>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub children: Vec<SyntaxNode>,
    }

    impl SyntaxNode {
        pub fn new(kind: NodeKind, span: Span) -> Self {
            Self {
                kind,
                span,
                name: None,
                children: Vec::new(),
            }
        }

        pub fn with_name(mut self, name: Ident) -> Self {
            self.name = Some(name);
            self
        }

        pub fn with_children(mut self, children: Vec<SyntaxNode>) -> Self {
            self.children = children;
            self
        }

        pub fn name_text(&self) -> Option<&str> {
            self.name.as_ref().map(|n| n.bare())
        }

        /// Pre-order iterator over this node and all of its descendants.
        pub fn descendants(&self) -> Descendants<'_> {
            Descendants { stack: vec![self] }
        }

        /// Names bound by a `Pattern` node, in source order.
        pub fn pattern_names(&self) -> Vec<&Ident> {
            self.descendants()
                .filter(|n| n.kind == NodeKind::Identifier)
                .filter_map(|n| n.name.as_ref())
                .collect()
        }

        /// Checks that every node's span contains its children's spans and
        /// that siblings do not overlap. Returns the first offending node.
        pub fn validate_spans(&self) -> Result<(), &SyntaxNode> {
            let mut prev_end = self.span.start;
            for child in &self.children {
                if !self.span.contains(child.span) || child.span.start < prev_end {
                    return Err(child);
                }
                prev_end = child.span.end;
                child.validate_spans()?;
            }
            Ok(())
        }
    }

    pub struct Descendants<'a> {
        stack: Vec<&'a SyntaxNode>,
    }

    impl<'a> Iterator for Descendants<'a> {
        type Item = &'a SyntaxNode;

        fn next(&mut self) -> Option<Self::Item> {
            let node = self.stack.pop()?;
            self.stack.extend(node.children.iter().rev());
            Some(node)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn ident(text: &str, start: u32) -> Ident {
            Ident {
                text: text.to_string(),
                span: Span::new(start, start + text.len() as u32),
            }
        }

        #[test]
        fn descendants_are_preorder() {
            let tree = SyntaxNode::new(NodeKind::SourceFile, Span::new(0, 20)).with_children(vec![
                SyntaxNode::new(NodeKind::Extension, Span::new(0, 10)).with_children(vec![
                    SyntaxNode::new(NodeKind::TypeRef, Span::new(10, 10)),
                ]),
                SyntaxNode::new(NodeKind::Statement, Span::new(11, 20)),
            ]);
            let kinds: Vec<_> = tree.descendants().map(|n| n.kind).collect();
            assert_eq!(
                kinds,
                vec![
                    NodeKind::SourceFile,
                    NodeKind::Extension,
                    NodeKind::TypeRef,
                    NodeKind::Statement
                ]
            );
        }

        #[test]
        fn validate_spans_rejects_escaping_child() {
            let bad = SyntaxNode::new(NodeKind::Block, Span::new(0, 5))
                .with_children(vec![SyntaxNode::new(NodeKind::Statement, Span::new(3, 8))]);
            assert!(bad.validate_spans().is_err());
        }

        #[test]
        fn bare_name_strips_backticks() {
            assert_eq!(ident("`default`", 0).bare(), "default");
            assert_eq!(ident("value", 0).bare(), "value");
        }
    }
}
