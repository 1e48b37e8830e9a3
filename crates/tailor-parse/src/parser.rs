use crate::lexer::tokenize;
use crate::token::{Token, TokenKind};
use serde::Serialize;
use std::time::Instant;
use tailor_ast::span::Span;
use tailor_ast::syntax::{Ident, NodeKind, SyntaxNode};
use thiserror::Error;

/// Maximum nesting of bodies, parameter lists and brackets before the
/// parser gives up on a file.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Parser steps between deadline checks.
const DEADLINE_STRIDE: u32 = 256;

/// Longest run of modifier tokens looked through to find a declaration.
const MAX_MODIFIER_RUN: usize = 16;

/// Malformed input the parser recovered from. The affected region is
/// usually covered by a `NodeKind::Error` node.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
}

/// Input the parser cannot recover from; analysis of the file stops.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unclosed `{delimiter}` at end of input")]
    Unclosed { delimiter: char, span: Span },
    #[error("nesting depth exceeds {limit}")]
    TooDeep { limit: usize, span: Span },
    /// The caller's deadline passed; `span` marks where parsing stopped.
    #[error("deadline passed while parsing")]
    Deadline { span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::Unclosed { span, .. }
            | ParseError::TooDeep { span, .. }
            | ParseError::Deadline { span } => *span,
        }
    }
}

/// A syntax tree plus the errors recovered while building it.
#[derive(Debug, Serialize)]
pub struct Parse {
    pub root: SyntaxNode,
    pub errors: Vec<SyntaxError>,
}

pub fn parse(tokens: &[Token<'_>]) -> Result<Parse, ParseError> {
    parse_until(tokens, None)
}

/// Like [`parse`], but gives up with [`ParseError::Deadline`] once
/// `deadline` has passed.
pub fn parse_until(tokens: &[Token<'_>], deadline: Option<Instant>) -> Result<Parse, ParseError> {
    let mut p = Parser::new(tokens);
    p.deadline = deadline;
    let root = p.parse_source_file()?;
    Ok(Parse {
        root,
        errors: p.errors,
    })
}

pub fn parse_str(src: &str) -> Result<Parse, ParseError> {
    let tokens: Vec<Token<'_>> = tokenize(src).collect();
    parse(&tokens)
}

const ACCESS_MODIFIERS: &[&str] = &["public", "private", "fileprivate", "internal", "static"];

const CONTEXTUAL_MODIFIERS: &[&str] = &[
    "open",
    "final",
    "mutating",
    "nonmutating",
    "override",
    "lazy",
    "weak",
    "unowned",
    "required",
    "convenience",
    "dynamic",
    "optional",
    "indirect",
    "prefix",
    "postfix",
    "infix",
    "nonisolated",
];

const DECL_KEYWORDS: &[&str] = &[
    "import",
    "extension",
    "class",
    "struct",
    "enum",
    "protocol",
    "typealias",
    "associatedtype",
    "func",
    "init",
    "deinit",
    "subscript",
    "var",
    "let",
    "case",
];

const DIRECTIVES: &[&str] = &[
    "#if",
    "#elseif",
    "#else",
    "#endif",
    "#warning",
    "#error",
    "#sourceLocation",
];

const CONTROL_KEYWORDS: &[&str] = &[
    "if", "guard", "while", "for", "switch", "repeat", "do", "defer", "else", "catch",
];

const ACCESSORS: &[&str] = &["get", "set", "willSet", "didSet"];

/// Operators that end an expression when they close a line.
const POSTFIX_OPERATORS: &[&str] = &["?", "!", "++", "--"];

/// Operators that continue the previous line's expression when they start a line.
const INFIX_CONTINUATIONS: &[&str] = &[
    "&&", "||", "??", "==", "!=", "===", "!==", "+", "*", "/", "%", "<", ">", "<=", ">=", "=", "?",
    "..<", "...", "+=", "-=", "*=", "/=",
];

#[derive(Clone, Copy, PartialEq, Eq)]
enum Ctx {
    /// Top level and function bodies: declarations and statements.
    Code,
    /// Type and extension bodies: declarations only.
    Member,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Stop {
    Statement,
    /// `var x = <expr>`: also ends at `,` and at an observer block.
    Initializer,
    /// Default argument: ends at `,` or `)`.
    Argument,
}

/// Significant token plus what the skipped trivia before it contained.
#[derive(Clone, Copy)]
struct Sig<'src> {
    tok: Token<'src>,
    line_break: bool,
    after_error: bool,
}

struct Parser<'src> {
    toks: Vec<Sig<'src>>,
    pos: usize,
    eof: u32,
    depth: usize,
    errors: Vec<SyntaxError>,
    deadline: Option<Instant>,
    steps: u32,
}

fn closer_of(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

fn leaf(kind: NodeKind, tok: Token<'_>) -> SyntaxNode {
    SyntaxNode::new(kind, tok.span).with_name(Ident {
        text: tok.text.to_string(),
        span: tok.span,
    })
}

impl<'src> Parser<'src> {
    fn new(tokens: &[Token<'src>]) -> Self {
        let mut toks = Vec::with_capacity(tokens.len() / 2);
        let mut line_break = false;
        let mut after_error = false;
        for tok in tokens {
            match tok.kind {
                TokenKind::Whitespace | TokenKind::Comment(_) => {
                    line_break |= tok.text.contains('\n');
                }
                // reported from the token stream, invisible to the grammar
                TokenKind::Error(_) => after_error = true,
                _ => {
                    toks.push(Sig {
                        tok: *tok,
                        line_break,
                        after_error,
                    });
                    line_break = false;
                    after_error = false;
                }
            }
        }
        Self {
            toks,
            pos: 0,
            eof: tokens.last().map(|t| t.span.end).unwrap_or(0),
            depth: 0,
            errors: Vec::new(),
            deadline: None,
            steps: 0,
        }
    }

    // ======= cursor =======

    fn peek(&self) -> Option<Token<'src>> {
        self.toks.get(self.pos).map(|s| s.tok)
    }

    fn nth(&self, n: usize) -> Option<Token<'src>> {
        self.toks.get(self.pos + n).map(|s| s.tok)
    }

    fn line_break(&self) -> bool {
        self.toks.get(self.pos).is_some_and(|s| s.line_break)
    }

    fn bump(&mut self) -> Option<Token<'src>> {
        let tok = self.peek()?;
        self.pos += 1;
        Some(tok)
    }

    fn at_punct(&self, p: &str) -> bool {
        self.peek().is_some_and(|t| t.is_punct(p))
    }

    fn at_kw(&self, k: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(k))
    }

    fn at_operator(&self, op: &str) -> bool {
        self.peek().is_some_and(|t| t.is_operator(op))
    }

    fn at_ident_in(&self, set: &[&str]) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == TokenKind::Identifier && set.contains(&t.text))
    }

    fn at_opening_angle(&self) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == TokenKind::Operator && t.text.starts_with('<'))
    }

    fn start(&self) -> u32 {
        self.peek().map(|t| t.span.start).unwrap_or(self.eof)
    }

    fn prev_end(&self) -> u32 {
        self.pos
            .checked_sub(1)
            .map(|i| self.toks[i].tok.span.end)
            .unwrap_or(0)
    }

    fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.prev_end().max(start))
    }

    fn eat_ident(&mut self) -> Option<Ident> {
        let tok = self.peek().filter(|t| t.kind == TokenKind::Identifier)?;
        self.bump();
        Some(Ident {
            text: tok.text.to_string(),
            span: tok.span,
        })
    }

    fn error_at(&mut self, span: Span, message: impl Into<String>) {
        self.errors.push(SyntaxError {
            message: message.into(),
            span,
        });
    }

    fn error_here(&mut self, message: impl Into<String>) {
        let span = self
            .peek()
            .map(|t| t.span)
            .unwrap_or(Span::new(self.eof, self.eof));
        self.error_at(span, message);
    }

    fn enter(&mut self, span: Span) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(ParseError::TooDeep {
                limit: MAX_NESTING_DEPTH,
                span,
            });
        }
        Ok(())
    }

    fn exit(&mut self) {
        self.depth -= 1;
    }

    /// Called once per loop step; consults the clock every
    /// `DEADLINE_STRIDE` steps.
    fn tick(&mut self) -> Result<(), ParseError> {
        let Some(deadline) = self.deadline else {
            return Ok(());
        };
        let step = self.steps;
        self.steps = self.steps.wrapping_add(1);
        if step % DEADLINE_STRIDE == 0 && Instant::now() >= deadline {
            let at = self.start();
            return Err(ParseError::Deadline {
                span: Span::new(at, at),
            });
        }
        Ok(())
    }

    // ======= recovery =======

    /// Skip a delimited group starting at the current opener, including
    /// everything nested inside it.
    fn skip_balanced(&mut self) -> Result<(), ParseError> {
        let mut stack: Vec<(char, Span)> = Vec::new();
        while let Some(tok) = self.peek() {
            self.tick()?;
            if tok.kind == TokenKind::Punctuation {
                match tok.text {
                    "(" | "[" | "{" => {
                        let open = tok.text.chars().next().unwrap_or('(');
                        stack.push((open, tok.span));
                        if self.depth + stack.len() > MAX_NESTING_DEPTH {
                            return Err(ParseError::TooDeep {
                                limit: MAX_NESTING_DEPTH,
                                span: tok.span,
                            });
                        }
                    }
                    ")" | "]" | "}" => {
                        let close = tok.text.chars().next().unwrap_or(')');
                        if stack.last().is_some_and(|&(open, _)| closer_of(open) == close) {
                            stack.pop();
                        } else {
                            self.error_here(format!("unexpected `{}`", tok.text));
                        }
                    }
                    _ => {}
                }
            }
            self.bump();
            if stack.is_empty() {
                return Ok(());
            }
        }
        match stack.first() {
            Some(&(delimiter, span)) => Err(ParseError::Unclosed { delimiter, span }),
            None => Ok(()),
        }
    }

    /// Skip to the next statement boundary: a line break or `;` at depth 0,
    /// or the `}` closing the enclosing body.
    fn skip_to_boundary(&mut self) -> Result<(), ParseError> {
        let first = self.pos;
        while let Some(tok) = self.peek() {
            if self.pos > first && self.line_break() {
                break;
            }
            if tok.is_punct("}") {
                break;
            }
            if tok.is_punct(";") {
                self.bump();
                break;
            }
            if tok.is_punct("{") || tok.is_punct("(") || tok.is_punct("[") {
                self.skip_balanced()?;
            } else {
                self.bump();
            }
        }
        Ok(())
    }

    fn recover(
        &mut self,
        start: u32,
        children: Vec<SyntaxNode>,
        message: impl Into<String>,
    ) -> Result<SyntaxNode, ParseError> {
        self.error_here(message);
        self.skip_to_boundary()?;
        Ok(SyntaxNode::new(NodeKind::Error, self.span_from(start)).with_children(children))
    }

    // ======= items =======

    fn parse_source_file(&mut self) -> Result<SyntaxNode, ParseError> {
        let children = self.parse_items(Ctx::Code, false)?;
        Ok(SyntaxNode::new(NodeKind::SourceFile, Span::new(0, self.eof)).with_children(children))
    }

    /// Parse declarations/statements until end of input, or until the
    /// closing `}` when `in_braces` (left for the caller to consume).
    fn parse_items(&mut self, ctx: Ctx, in_braces: bool) -> Result<Vec<SyntaxNode>, ParseError> {
        let mut items = Vec::new();
        while let Some(tok) = self.peek() {
            self.tick()?;
            if tok.is_punct(";") {
                self.bump();
                continue;
            }
            if tok.is_punct("}") && in_braces {
                break;
            }
            if tok.is_punct("}") || tok.is_punct(")") || tok.is_punct("]") {
                self.error_here(format!("unexpected `{}`", tok.text));
                self.bump();
                items.push(SyntaxNode::new(NodeKind::Error, tok.span));
                continue;
            }
            self.parse_item(ctx, &mut items)?;
        }
        Ok(items)
    }

    /// End of the modifier run starting at `i`: the index of the
    /// declaration keyword it leads to, or where it stops when it holds an
    /// access modifier. `None` when `i` does not start a modifier. The
    /// lookahead stays on one line and is capped at `MAX_MODIFIER_RUN`.
    fn modifier_run(&self, i: usize) -> Option<usize> {
        let mut k = i;
        let mut access = false;
        while k < i + MAX_MODIFIER_RUN {
            let Some(sig) = self.toks.get(k) else {
                break;
            };
            let tok = sig.tok;
            if k > i && sig.line_break {
                break;
            }
            let keyword = tok.kind == TokenKind::Keyword;
            if k > i && keyword && DECL_KEYWORDS.contains(&tok.text) {
                return Some(k);
            }
            match tok.kind {
                TokenKind::Keyword if ACCESS_MODIFIERS.contains(&tok.text) => {
                    access = true;
                    k = self.after_modifier(k);
                }
                // `class func`, `class var`: a type member, not a class
                TokenKind::Keyword if tok.text == "class" && k == i => {
                    let next = self.toks.get(k + 1).map(|s| s.tok);
                    match next {
                        Some(n) if n.kind == TokenKind::Keyword => {
                            return matches!(n.text, "func" | "var" | "let" | "subscript")
                                .then_some(k + 1);
                        }
                        _ => k += 1,
                    }
                }
                TokenKind::Identifier if CONTEXTUAL_MODIFIERS.contains(&tok.text) => {
                    k = self.after_modifier(k);
                }
                _ => break,
            }
        }
        (access && k > i).then_some(k)
    }

    fn after_modifier(&self, i: usize) -> usize {
        if self.modifier_argument_at(i + 1) {
            i + 4
        } else {
            i + 1
        }
    }

    /// `(set)` in `private(set)`, `(unsafe)` in `unowned(unsafe)`.
    fn modifier_argument_at(&self, i: usize) -> bool {
        let tok = |k: usize| self.toks.get(k).map(|s| s.tok);
        tok(i).is_some_and(|t| t.is_punct("("))
            && tok(i + 1).is_some_and(|t| t.kind == TokenKind::Identifier)
            && tok(i + 2).is_some_and(|t| t.is_punct(")"))
    }

    fn bump_modifier(&mut self) {
        self.bump();
        if self.modifier_argument_at(self.pos) {
            self.pos += 3;
        }
    }

    fn parse_item(&mut self, ctx: Ctx, out: &mut Vec<SyntaxNode>) -> Result<(), ParseError> {
        let start = self.start();
        let attrs = self.parse_attributes()?;
        let mut modifiers = 0;
        if let Some(end) = self.modifier_run(self.pos) {
            while self.pos < end {
                self.bump_modifier();
                modifiers += 1;
            }
        }

        let keyword = self
            .peek()
            .filter(|t| t.kind == TokenKind::Keyword)
            .map(|t| t.text);
        match keyword {
            Some("import") => out.push(self.parse_import(start, attrs)?),
            Some("extension") => out.push(self.parse_extension(start, attrs)?),
            Some("class" | "struct" | "enum" | "protocol") => {
                out.push(self.parse_type_decl(start, attrs)?)
            }
            Some("typealias" | "associatedtype") => out.push(self.parse_typealias(start, attrs)?),
            Some("func") => out.push(self.parse_function(start, attrs)?),
            Some("init") => out.push(self.parse_initializer(start, attrs)?),
            Some("deinit") => out.push(self.parse_deinitializer(start, attrs)?),
            Some("subscript") => out.push(self.parse_subscript(start, attrs)?),
            Some("var" | "let") => self.parse_binding(start, attrs, out)?,
            Some("case") if ctx == Ctx::Member => self.parse_enum_case(start, attrs, out)?,
            Some(d) if DIRECTIVES.contains(&d) => out.push(self.parse_directive(start, attrs)?),
            _ if modifiers > 0 => {
                out.push(self.recover(start, attrs, "expected declaration after modifiers")?)
            }
            _ if ctx == Ctx::Member => out.push(self.recover(start, attrs, "expected declaration")?),
            _ if self.peek().is_none() => out.extend(attrs),
            _ => out.push(self.parse_statement(start, attrs)?),
        }
        Ok(())
    }

    fn parse_attributes(&mut self) -> Result<Vec<SyntaxNode>, ParseError> {
        let mut attrs = Vec::new();
        while self.at_punct("@") {
            let start = self.start();
            self.bump();
            let name = self.eat_ident();
            if name.is_none() {
                self.error_here("expected attribute name");
            }
            if self.at_punct("(") && !self.line_break() {
                self.skip_balanced()?;
            }
            let mut node = SyntaxNode::new(NodeKind::Attribute, self.span_from(start));
            node.name = name;
            attrs.push(node);
        }
        Ok(attrs)
    }

    fn parse_import(&mut self, start: u32, attrs: Vec<SyntaxNode>) -> Result<SyntaxNode, ParseError> {
        self.bump();
        if self.peek().is_some_and(|t| {
            t.kind == TokenKind::Keyword
                && matches!(
                    t.text,
                    "struct" | "class" | "enum" | "protocol" | "func" | "var" | "let" | "typealias"
                )
        }) {
            self.bump();
        }
        let Some(first) = self.eat_ident() else {
            return self.recover(start, attrs, "expected module name after `import`");
        };
        let mut path = first;
        while self.at_punct(".") {
            self.bump();
            match self.peek() {
                Some(t) if matches!(t.kind, TokenKind::Identifier | TokenKind::Operator) => {
                    self.bump();
                    path.text.push('.');
                    path.text.push_str(t.text);
                    path.span = path.span.cover(t.span);
                }
                _ => {
                    self.error_here("expected name after `.` in import path");
                    break;
                }
            }
        }
        Ok(SyntaxNode::new(NodeKind::Import, self.span_from(start))
            .with_name(path)
            .with_children(attrs))
    }

    fn parse_extension(
        &mut self,
        start: u32,
        attrs: Vec<SyntaxNode>,
    ) -> Result<SyntaxNode, ParseError> {
        self.bump();
        let Some(extended) = self.parse_type()? else {
            return self.recover(start, attrs, "expected type name after `extension`");
        };
        let name = extended.name.clone();
        let mut children = attrs;
        children.push(extended);
        children.extend(self.parse_inheritance()?);
        if self.at_kw("where") {
            children.push(self.parse_where_clause()?);
        }
        if self.at_punct("{") {
            children.extend(self.parse_member_body()?);
        } else {
            self.error_here("expected `{` to open extension body");
        }
        let mut node = SyntaxNode::new(NodeKind::Extension, self.span_from(start));
        node.name = name;
        Ok(node.with_children(children))
    }

    fn parse_type_decl(
        &mut self,
        start: u32,
        attrs: Vec<SyntaxNode>,
    ) -> Result<SyntaxNode, ParseError> {
        let Some(keyword) = self.bump() else {
            return self.recover(start, attrs, "expected type declaration");
        };
        let kind = match keyword.text {
            "class" => NodeKind::Class,
            "struct" => NodeKind::Struct,
            "enum" => NodeKind::Enum,
            _ => NodeKind::Protocol,
        };
        let Some(name) = self.eat_ident() else {
            return self.recover(start, attrs, format!("expected {} name", keyword.text));
        };
        let mut children = attrs;
        if self.at_opening_angle() {
            self.skip_angles()?;
        }
        children.extend(self.parse_inheritance()?);
        if self.at_kw("where") {
            children.push(self.parse_where_clause()?);
        }
        if self.at_punct("{") {
            children.extend(self.parse_member_body()?);
        } else {
            self.error_here(format!("expected `{{` to open {} body", keyword.text));
        }
        Ok(SyntaxNode::new(kind, self.span_from(start))
            .with_name(name)
            .with_children(children))
    }

    fn parse_typealias(
        &mut self,
        start: u32,
        attrs: Vec<SyntaxNode>,
    ) -> Result<SyntaxNode, ParseError> {
        let keyword = self.bump().map(|t| t.text).unwrap_or("typealias");
        let Some(name) = self.eat_ident() else {
            return self.recover(start, attrs, format!("expected name after `{}`", keyword));
        };
        let mut children = attrs;
        if self.at_opening_angle() {
            self.skip_angles()?;
        }
        children.extend(self.parse_inheritance()?);
        if self.at_operator("=") {
            self.bump();
            match self.parse_type()? {
                Some(ty) => children.push(ty),
                None => self.error_here("expected type after `=`"),
            }
        }
        if self.at_kw("where") {
            children.push(self.parse_where_clause()?);
        }
        Ok(SyntaxNode::new(NodeKind::TypeAlias, self.span_from(start))
            .with_name(name)
            .with_children(children))
    }

    fn parse_function(
        &mut self,
        start: u32,
        attrs: Vec<SyntaxNode>,
    ) -> Result<SyntaxNode, ParseError> {
        self.bump();
        let name = match self.peek() {
            Some(t) if matches!(t.kind, TokenKind::Identifier | TokenKind::Operator) => {
                self.bump();
                Ident {
                    text: t.text.to_string(),
                    span: t.span,
                }
            }
            _ => return self.recover(start, attrs, "expected function name"),
        };
        let mut children = attrs;
        if self.at_opening_angle() {
            self.skip_angles()?;
        }
        if !self.at_punct("(") {
            return self.recover(start, children, "expected `(` after function name");
        }
        children.extend(self.parse_params()?);
        self.parse_signature_tail(&mut children)?;
        if self.at_punct("{") {
            children.push(self.parse_code_block(NodeKind::Block)?);
        }
        Ok(SyntaxNode::new(NodeKind::Function, self.span_from(start))
            .with_name(name)
            .with_children(children))
    }

    fn parse_initializer(
        &mut self,
        start: u32,
        attrs: Vec<SyntaxNode>,
    ) -> Result<SyntaxNode, ParseError> {
        self.bump();
        // failable `init?` / `init!`
        if self.at_operator("?") || self.at_operator("!") {
            self.bump();
        }
        let mut children = attrs;
        if self.at_opening_angle() {
            self.skip_angles()?;
        }
        if !self.at_punct("(") {
            return self.recover(start, children, "expected `(` after `init`");
        }
        children.extend(self.parse_params()?);
        self.parse_signature_tail(&mut children)?;
        if self.at_punct("{") {
            children.push(self.parse_code_block(NodeKind::Block)?);
        }
        Ok(SyntaxNode::new(NodeKind::Initializer, self.span_from(start)).with_children(children))
    }

    fn parse_deinitializer(
        &mut self,
        start: u32,
        attrs: Vec<SyntaxNode>,
    ) -> Result<SyntaxNode, ParseError> {
        self.bump();
        let mut children = attrs;
        if self.at_punct("{") {
            children.push(self.parse_code_block(NodeKind::Block)?);
        } else {
            self.error_here("expected `{` after `deinit`");
        }
        Ok(SyntaxNode::new(NodeKind::Deinitializer, self.span_from(start)).with_children(children))
    }

    fn parse_subscript(
        &mut self,
        start: u32,
        attrs: Vec<SyntaxNode>,
    ) -> Result<SyntaxNode, ParseError> {
        self.bump();
        let mut children = attrs;
        if self.at_opening_angle() {
            self.skip_angles()?;
        }
        if !self.at_punct("(") {
            return self.recover(start, children, "expected `(` after `subscript`");
        }
        children.extend(self.parse_params()?);
        self.parse_signature_tail(&mut children)?;
        if self.at_punct("{") {
            children.extend(self.parse_accessors_or_getter()?);
        }
        Ok(SyntaxNode::new(NodeKind::Subscript, self.span_from(start)).with_children(children))
    }

    /// Effects, return type and generic `where` clause after a parameter list.
    fn parse_signature_tail(&mut self, children: &mut Vec<SyntaxNode>) -> Result<(), ParseError> {
        self.skip_effects();
        if self.at_punct("->") {
            self.bump();
            match self.parse_type()? {
                Some(ty) => children.push(ty),
                None => self.error_here("expected return type after `->`"),
            }
        }
        if self.at_kw("where") {
            children.push(self.parse_where_clause()?);
        }
        Ok(())
    }

    fn skip_effects(&mut self) {
        while self.at_kw("throws") || self.at_kw("rethrows") || self.at_ident_in(&["async"]) {
            self.bump();
        }
    }

    fn parse_params(&mut self) -> Result<Vec<SyntaxNode>, ParseError> {
        let Some(open) = self.bump() else {
            return Ok(Vec::new());
        };
        self.enter(open.span)?;
        let mut params = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return Err(ParseError::Unclosed {
                        delimiter: '(',
                        span: open.span,
                    })
                }
                Some(t) if t.is_punct(")") => {
                    self.bump();
                    break;
                }
                Some(t) if t.is_punct(",") => {
                    self.bump();
                }
                Some(_) => params.push(self.parse_param()?),
            }
        }
        self.exit();
        Ok(params)
    }

    fn parse_param(&mut self) -> Result<SyntaxNode, ParseError> {
        let start = self.start();
        let mut children = self.parse_attributes()?;
        // Swift 2 style `var`/`let` parameters and `inout`
        while self.at_kw("var") || self.at_kw("let") || self.at_kw("inout") {
            self.bump();
        }

        let mut names = Vec::new();
        while names.len() < 2 {
            match self.peek() {
                Some(t) if t.kind == TokenKind::Identifier => {
                    self.bump();
                    names.push(Ident {
                        text: t.text.to_string(),
                        span: t.span,
                    });
                }
                // keyword used as an argument label: `func index(of x: Int)`
                Some(t)
                    if t.kind == TokenKind::Keyword
                        && names.is_empty()
                        && self.nth(1).is_some_and(|n| n.kind == TokenKind::Identifier) =>
                {
                    self.bump();
                    names.push(Ident {
                        text: t.text.to_string(),
                        span: t.span,
                    });
                }
                _ => break,
            }
        }
        let Some(name) = names.pop() else {
            self.error_here("expected parameter name");
            self.skip_param_rest()?;
            return Ok(SyntaxNode::new(NodeKind::Error, self.span_from(start)).with_children(children));
        };

        if self.at_punct(":") {
            self.bump();
            match self.parse_type()? {
                Some(ty) => children.push(ty),
                None => self.error_here("expected parameter type"),
            }
        }
        if self.at_operator("...") {
            self.bump();
        }
        if self.at_operator("=") {
            self.bump();
            self.scan_expression(Stop::Argument, &mut children)?;
        }
        if !(self.at_punct(",") || self.at_punct(")") || self.peek().is_none()) {
            let junk = self.start();
            self.error_here("unexpected token in parameter");
            self.skip_param_rest()?;
            children.push(SyntaxNode::new(NodeKind::Error, self.span_from(junk)));
        }
        Ok(SyntaxNode::new(NodeKind::Parameter, self.span_from(start))
            .with_name(name)
            .with_children(children))
    }

    fn skip_param_rest(&mut self) -> Result<(), ParseError> {
        while let Some(tok) = self.peek() {
            if tok.is_punct(",") || tok.is_punct(")") {
                break;
            }
            if tok.is_punct("(") || tok.is_punct("[") || tok.is_punct("{") {
                self.skip_balanced()?;
            } else {
                self.bump();
            }
        }
        Ok(())
    }

    fn parse_binding(
        &mut self,
        start: u32,
        attrs: Vec<SyntaxNode>,
        out: &mut Vec<SyntaxNode>,
    ) -> Result<(), ParseError> {
        let Some(keyword) = self.bump() else {
            return Ok(());
        };
        let kind = if keyword.text == "let" {
            NodeKind::Constant
        } else {
            NodeKind::Property
        };
        let mut attrs = Some(attrs);
        let mut binding_start = start;
        loop {
            let mut children = attrs.take().unwrap_or_default();
            let name = if let Some(name) = self.eat_ident() {
                Some(name)
            } else if self.at_punct("(") {
                children.push(self.parse_tuple_pattern()?);
                None
            } else {
                let message = format!("expected name after `{}`", keyword.text);
                out.push(self.recover(binding_start, children, message)?);
                return Ok(());
            };

            if self.at_punct(":") {
                self.bump();
                match self.parse_type()? {
                    Some(ty) => children.push(ty),
                    None => self.error_here("expected type annotation"),
                }
            }
            if self.at_operator("=") {
                self.bump();
                self.scan_expression(Stop::Initializer, &mut children)?;
            }
            if self.at_punct("{") {
                children.extend(self.parse_accessors_or_getter()?);
            }

            let mut node =
                SyntaxNode::new(kind, self.span_from(binding_start)).with_children(children);
            node.name = name;
            out.push(node);

            if !self.at_punct(",") {
                break;
            }
            self.bump();
            binding_start = self.start();
        }
        Ok(())
    }

    fn parse_tuple_pattern(&mut self) -> Result<SyntaxNode, ParseError> {
        let start = self.start();
        let mut names = Vec::new();
        let mut stack: Vec<Span> = Vec::new();
        while let Some(tok) = self.peek() {
            if tok.is_punct("(") {
                stack.push(tok.span);
            } else if tok.is_punct(")") {
                stack.pop();
            } else if tok.kind == TokenKind::Identifier && tok.text != "_" {
                names.push(leaf(NodeKind::Identifier, tok));
            }
            self.bump();
            if stack.is_empty() {
                return Ok(SyntaxNode::new(NodeKind::Pattern, self.span_from(start))
                    .with_children(names));
            }
        }
        Err(ParseError::Unclosed {
            delimiter: '(',
            span: stack.first().copied().unwrap_or_default(),
        })
    }

    /// Body of a property or subscript: either an accessor list
    /// (`get`/`set`/`willSet`/`didSet`) or a getter written as a plain block.
    fn parse_accessors_or_getter(&mut self) -> Result<Vec<SyntaxNode>, ParseError> {
        if self.is_accessor_list() {
            self.parse_accessor_list()
        } else {
            Ok(vec![self.parse_code_block(NodeKind::Block)?])
        }
    }

    fn is_accessor_list(&self) -> bool {
        let mut i = self.pos + 1;
        loop {
            let Some(tok) = self.toks.get(i).map(|s| s.tok) else {
                return false;
            };
            let is_modifier = tok.is_punct("@")
                || (tok.kind == TokenKind::Keyword && ACCESS_MODIFIERS.contains(&tok.text))
                || (tok.kind == TokenKind::Identifier
                    && matches!(tok.text, "mutating" | "nonmutating"));
            if is_modifier {
                // `@attr` consumes its name too
                i += if tok.is_punct("@") { 2 } else { 1 };
                continue;
            }
            if !(tok.kind == TokenKind::Identifier && ACCESSORS.contains(&tok.text)) {
                return false;
            }
            return self.toks.get(i + 1).is_some_and(|s| {
                let next = s.tok;
                next.is_punct("{")
                    || next.is_punct("}")
                    || next.is_punct("(") && tok.text != "get"
                    || next.is_keyword("throws")
                    || next.kind == TokenKind::Identifier
                        && (ACCESSORS.contains(&next.text) || next.text == "async")
            });
        }
    }

    fn parse_accessor_list(&mut self) -> Result<Vec<SyntaxNode>, ParseError> {
        let Some(open) = self.bump() else {
            return Ok(Vec::new());
        };
        self.enter(open.span)?;
        let mut accessors = Vec::new();
        loop {
            let Some(tok) = self.peek() else {
                return Err(ParseError::Unclosed {
                    delimiter: '{',
                    span: open.span,
                });
            };
            if tok.is_punct("}") {
                self.bump();
                break;
            }
            if tok.is_punct(";") {
                self.bump();
                continue;
            }
            let start = self.start();
            let mut children = self.parse_attributes()?;
            while self.peek().is_some_and(|t| {
                (t.kind == TokenKind::Keyword && ACCESS_MODIFIERS.contains(&t.text))
                    || (t.kind == TokenKind::Identifier
                        && matches!(t.text, "mutating" | "nonmutating"))
            }) {
                self.bump_modifier();
            }
            if !self.at_ident_in(ACCESSORS) {
                accessors.push(self.recover(start, children, "expected `get`, `set`, `willSet` or `didSet`")?);
                continue;
            }
            let name = self.eat_ident();
            if self.at_punct("(") {
                self.skip_balanced()?;
            }
            self.skip_effects();
            if self.at_punct("{") {
                children.push(self.parse_code_block(NodeKind::Block)?);
            }
            let mut node =
                SyntaxNode::new(NodeKind::Accessor, self.span_from(start)).with_children(children);
            node.name = name;
            accessors.push(node);
        }
        self.exit();
        Ok(accessors)
    }

    fn parse_enum_case(
        &mut self,
        start: u32,
        attrs: Vec<SyntaxNode>,
        out: &mut Vec<SyntaxNode>,
    ) -> Result<(), ParseError> {
        self.bump();
        let mut attrs = Some(attrs);
        let mut case_start = start;
        loop {
            let children = attrs.take().unwrap_or_default();
            let Some(name) = self.eat_ident() else {
                out.push(self.recover(case_start, children, "expected enum case name")?);
                return Ok(());
            };
            // associated values
            if self.at_punct("(") {
                self.skip_balanced()?;
            }
            // raw value
            if self.at_operator("=") {
                self.bump();
                if self.at_operator("-") {
                    self.bump();
                }
                match self.peek() {
                    Some(t) if matches!(t.kind, TokenKind::Literal(_) | TokenKind::Identifier) => {
                        self.bump();
                    }
                    _ => self.error_here("expected raw value after `=`"),
                }
            }
            out.push(
                SyntaxNode::new(NodeKind::EnumCase, self.span_from(case_start))
                    .with_name(name)
                    .with_children(children),
            );
            if !self.at_punct(",") {
                break;
            }
            self.bump();
            case_start = self.start();
        }
        Ok(())
    }

    fn parse_directive(
        &mut self,
        start: u32,
        attrs: Vec<SyntaxNode>,
    ) -> Result<SyntaxNode, ParseError> {
        let Some(keyword) = self.bump() else {
            return Ok(SyntaxNode::new(NodeKind::Directive, self.span_from(start)));
        };
        while let Some(tok) = self.peek() {
            if self.line_break() {
                break;
            }
            if tok.is_punct("(") || tok.is_punct("[") {
                self.skip_balanced()?;
            } else {
                self.bump();
            }
        }
        Ok(SyntaxNode::new(NodeKind::Directive, self.span_from(start))
            .with_name(Ident {
                text: keyword.text.to_string(),
                span: keyword.span,
            })
            .with_children(attrs))
    }

    fn parse_inheritance(&mut self) -> Result<Vec<SyntaxNode>, ParseError> {
        let mut types = Vec::new();
        if !self.at_punct(":") {
            return Ok(types);
        }
        self.bump();
        loop {
            match self.parse_type()? {
                Some(ty) => types.push(ty),
                None => {
                    self.error_here("expected type in inheritance clause");
                    break;
                }
            }
            if !self.at_punct(",") {
                break;
            }
            self.bump();
        }
        Ok(types)
    }

    fn parse_where_clause(&mut self) -> Result<SyntaxNode, ParseError> {
        let start = self.start();
        self.bump();
        let first = self.pos;
        while let Some(tok) = self.peek() {
            let continued = self.toks[self.pos - 1].tok.is_punct(",");
            if tok.is_punct("{") || tok.is_punct("}") || tok.is_punct(";") {
                break;
            }
            if self.pos > first && self.line_break() && !continued {
                break;
            }
            if tok.is_punct("(") || tok.is_punct("[") {
                self.skip_balanced()?;
            } else {
                self.bump();
            }
        }
        Ok(SyntaxNode::new(NodeKind::WhereClause, self.span_from(start)))
    }

    // ======= types =======

    fn parse_type(&mut self) -> Result<Option<SyntaxNode>, ParseError> {
        let Some(first) = self.peek() else {
            return Ok(None);
        };
        self.enter(first.span)?;
        let ty = self.parse_type_inner();
        self.exit();
        ty
    }

    fn parse_type_inner(&mut self) -> Result<Option<SyntaxNode>, ParseError> {
        let start = self.start();
        // `@escaping`, `@autoclosure`
        while self.at_punct("@") {
            self.bump();
            self.eat_ident();
        }
        while self.at_kw("inout")
            || (self.at_ident_in(&["some", "any"])
                && self.nth(1).is_some_and(|t| t.kind == TokenKind::Identifier))
        {
            self.bump();
        }

        let Some(tok) = self.peek() else {
            return Ok(None);
        };
        let mut name = None;
        if tok.kind == TokenKind::Identifier || tok.is_keyword("Self") || tok.is_keyword("class") {
            let mut text = String::new();
            let mut end = tok.span.end;
            while let Some(seg) = self.bump() {
                text.push_str(seg.text);
                end = seg.span.end;
                if self.at_opening_angle() {
                    self.skip_angles()?;
                }
                let dotted = self.at_punct(".")
                    && self
                        .nth(1)
                        .is_some_and(|t| t.kind == TokenKind::Identifier || t.is_keyword("Self"));
                if !dotted {
                    break;
                }
                self.bump();
                text.push('.');
            }
            name = Some(Ident {
                text,
                span: Span::new(tok.span.start, end),
            });
        } else if tok.is_punct("(") || tok.is_punct("[") {
            self.skip_balanced()?;
        } else {
            return Ok(None);
        }

        loop {
            let Some(tok) = self.peek() else { break };
            if tok.kind == TokenKind::Operator && tok.text.chars().all(|c| c == '?' || c == '!') {
                self.bump();
            } else if tok.is_punct(".")
                && self.nth(1).is_some_and(|t| matches!(t.text, "Type" | "Protocol"))
            {
                self.bump();
                self.bump();
            } else if (tok.is_keyword("throws") || tok.is_keyword("rethrows") || tok.text == "async")
                && self.nth(1).is_some_and(|t| t.is_punct("->") || t.is_keyword("throws"))
            {
                self.bump();
            } else if tok.is_punct("->") {
                self.bump();
                if self.parse_type()?.is_none() {
                    self.error_here("expected result type after `->`");
                }
            } else if tok.is_operator("&") {
                self.bump();
                if self.parse_type()?.is_none() {
                    self.error_here("expected type after `&`");
                }
            } else {
                break;
            }
        }

        let mut node = SyntaxNode::new(NodeKind::TypeRef, self.span_from(start));
        node.name = name;
        Ok(Some(node))
    }

    /// Skip a generic argument/parameter list starting at `<`. Operators
    /// such as `>>` close several levels at once.
    fn skip_angles(&mut self) -> Result<(), ParseError> {
        let mut depth: i32 = 0;
        while let Some(tok) = self.peek() {
            if tok.kind == TokenKind::Operator && (tok.text.contains('<') || tok.text.contains('>'))
            {
                for c in tok.text.chars() {
                    match c {
                        '<' => depth += 1,
                        '>' => depth -= 1,
                        _ => {}
                    }
                }
                self.bump();
                if depth <= 0 {
                    break;
                }
            } else if tok.is_punct("(") || tok.is_punct("[") {
                self.skip_balanced()?;
            } else if tok.is_punct("{") || tok.is_punct("}") || tok.is_punct(";") {
                self.error_here("unterminated generic argument list");
                break;
            } else {
                self.bump();
            }
        }
        Ok(())
    }

    // ======= blocks and statements =======

    fn parse_member_body(&mut self) -> Result<Vec<SyntaxNode>, ParseError> {
        let Some(open) = self.bump() else {
            return Ok(Vec::new());
        };
        self.enter(open.span)?;
        let members = self.parse_items(Ctx::Member, true)?;
        if self.bump().is_none() {
            return Err(ParseError::Unclosed {
                delimiter: '{',
                span: open.span,
            });
        }
        self.exit();
        Ok(members)
    }

    fn parse_code_block(&mut self, kind: NodeKind) -> Result<SyntaxNode, ParseError> {
        let Some(open) = self.bump() else {
            return Ok(SyntaxNode::new(kind, Span::new(self.eof, self.eof)));
        };
        self.enter(open.span)?;
        let children = self.parse_items(Ctx::Code, true)?;
        let Some(close) = self.bump() else {
            return Err(ParseError::Unclosed {
                delimiter: '{',
                span: open.span,
            });
        };
        self.exit();
        Ok(SyntaxNode::new(kind, open.span.cover(close.span)).with_children(children))
    }

    fn parse_statement(
        &mut self,
        start: u32,
        attrs: Vec<SyntaxNode>,
    ) -> Result<SyntaxNode, ParseError> {
        let mut children = attrs;
        self.scan_expression(Stop::Statement, &mut children)?;
        Ok(SyntaxNode::new(NodeKind::Statement, self.span_from(start)).with_children(children))
    }

    fn at_observer_block(&self) -> bool {
        self.at_punct("{")
            && self
                .nth(1)
                .is_some_and(|t| t.kind == TokenKind::Identifier && matches!(t.text, "willSet" | "didSet"))
    }

    /// Whether a line break before the current token is not a statement end.
    fn continues_line(&self, lead: Option<&str>, control: bool, saw_block: bool) -> bool {
        let Some(next) = self.peek() else {
            return false;
        };
        let Some(prev) = self.pos.checked_sub(1).map(|i| self.toks[i].tok) else {
            return false;
        };
        // a line ending in malformed input never carries over
        if self.toks.get(self.pos).is_some_and(|s| s.after_error) {
            return false;
        }
        if prev.kind == TokenKind::Operator && !POSTFIX_OPERATORS.contains(&prev.text) {
            return true;
        }
        if prev.is_punct(".") || prev.is_punct(",") || prev.is_punct("->") {
            return true;
        }
        if next.is_punct(".") {
            return true;
        }
        if next.kind == TokenKind::Operator && INFIX_CONTINUATIONS.contains(&next.text) {
            return true;
        }
        if next.is_keyword("else") || next.is_keyword("catch") {
            return true;
        }
        if next.is_keyword("while") && lead == Some("repeat") {
            return true;
        }
        next.is_punct("{") && control && !saw_block
    }

    /// Consume an expression (or statement) up to its boundary, collecting
    /// identifiers, literals and nested blocks/closures into `out`.
    fn scan_expression(&mut self, stop: Stop, out: &mut Vec<SyntaxNode>) -> Result<(), ParseError> {
        let first = self.pos;
        let lead = self.peek().map(|t| t.text);
        let control = self
            .peek()
            .is_some_and(|t| t.kind == TokenKind::Keyword && CONTROL_KEYWORDS.contains(&t.text));
        let mut saw_block = false;
        let mut stack: Vec<(char, Span)> = Vec::new();

        while let Some(tok) = self.peek() {
            self.tick()?;
            if stack.is_empty() {
                let boundary = match stop {
                    Stop::Argument => tok.is_punct(",") || tok.is_punct(")"),
                    Stop::Statement | Stop::Initializer => {
                        tok.is_punct(";")
                            || tok.is_punct("}")
                            || (stop == Stop::Initializer
                                && (tok.is_punct(",") || self.at_observer_block()))
                            || ((self.pos > first || stop == Stop::Initializer)
                                && self.line_break()
                                && !self.continues_line(lead, control, saw_block))
                    }
                };
                if boundary {
                    break;
                }
            }

            match tok.kind {
                TokenKind::Punctuation => match tok.text {
                    "(" | "[" => {
                        let open = if tok.text == "(" { '(' } else { '[' };
                        stack.push((open, tok.span));
                        if self.depth + stack.len() > MAX_NESTING_DEPTH {
                            return Err(ParseError::TooDeep {
                                limit: MAX_NESTING_DEPTH,
                                span: tok.span,
                            });
                        }
                        self.bump();
                    }
                    ")" | "]" => {
                        let open = if tok.text == ")" { '(' } else { '[' };
                        self.bump();
                        if stack.last().is_some_and(|&(c, _)| c == open) {
                            stack.pop();
                        } else {
                            self.error_at(tok.span, format!("unexpected `{}`", tok.text));
                            out.push(SyntaxNode::new(NodeKind::Error, tok.span));
                        }
                    }
                    "{" => {
                        let kind = if stack.is_empty() && control && stop == Stop::Statement {
                            NodeKind::Block
                        } else {
                            NodeKind::Closure
                        };
                        if stack.is_empty() {
                            saw_block = true;
                        }
                        out.push(self.parse_code_block(kind)?);
                    }
                    "}" => {
                        // the enclosing body ends while a bracket is still open
                        if let Some(&(open, span)) = stack.first() {
                            self.error_at(span, format!("unclosed `{}`", open));
                        }
                        break;
                    }
                    _ => {
                        self.bump();
                    }
                },
                TokenKind::Identifier => {
                    out.push(leaf(NodeKind::Identifier, tok));
                    self.bump();
                }
                TokenKind::Literal(literal) => {
                    let kind = match literal {
                        crate::token::LiteralKind::Integer => NodeKind::IntegerLiteral,
                        crate::token::LiteralKind::Float => NodeKind::FloatLiteral,
                        crate::token::LiteralKind::String => NodeKind::StringLiteral,
                    };
                    out.push(leaf(kind, tok));
                    self.bump();
                }
                _ => {
                    self.bump();
                }
            }
        }

        if self.peek().is_none() {
            if let Some(&(delimiter, span)) = stack.first() {
                return Err(ParseError::Unclosed { delimiter, span });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(node: &SyntaxNode) -> Vec<NodeKind> {
        node.children.iter().map(|c| c.kind).collect()
    }

    #[test]
    fn empty_input_is_an_empty_file() {
        let parse = parse_str("").expect("parse");
        assert_eq!(parse.root.kind, NodeKind::SourceFile);
        assert!(parse.root.children.is_empty());
        assert!(parse.errors.is_empty());
    }

    #[test]
    fn extension_with_conformances() {
        let parse = parse_str("extension SomeType: SomeProtocol, AnotherProtocol {\n}\n")
            .expect("parse");
        let ext = &parse.root.children[0];
        assert_eq!(ext.kind, NodeKind::Extension);
        assert_eq!(ext.name_text(), Some("SomeType"));
        assert_eq!(
            kinds(ext),
            vec![NodeKind::TypeRef, NodeKind::TypeRef, NodeKind::TypeRef]
        );
        assert_eq!(ext.children[2].name_text(), Some("AnotherProtocol"));
    }

    #[test]
    fn statement_ends_at_line_break() {
        let parse = parse_str("foo()\nbar()\n").expect("parse");
        assert_eq!(
            kinds(&parse.root),
            vec![NodeKind::Statement, NodeKind::Statement]
        );
    }

    #[test]
    fn binary_operator_continues_statement() {
        let parse = parse_str("let total = a +\n    b\nprint(total)\n").expect("parse");
        assert_eq!(
            kinds(&parse.root),
            vec![NodeKind::Constant, NodeKind::Statement]
        );
    }

    #[test]
    fn prefix_decrement_starts_new_statement() {
        let parse = parse_str("decimalBase *= 10\n--digitIndex\n").expect("parse");
        assert_eq!(
            kinds(&parse.root),
            vec![NodeKind::Statement, NodeKind::Statement]
        );
    }

    #[test]
    fn modifiers_are_skipped() {
        let parse = parse_str("struct S {\n    private(set) static var count = 0\n    mutating func bump() {}\n}\n")
            .expect("parse");
        let s = &parse.root.children[0];
        assert_eq!(kinds(s), vec![NodeKind::Property, NodeKind::Function]);
        assert!(parse.errors.is_empty(), "{:?}", parse.errors);
    }

    #[test]
    fn identifier_named_like_modifier_is_not_a_modifier() {
        let parse = parse_str("let final = 1\nfinal + 1\n").expect("parse");
        assert_eq!(
            kinds(&parse.root),
            vec![NodeKind::Constant, NodeKind::Statement]
        );
    }

    #[test]
    fn multiple_bindings_become_separate_nodes() {
        let parse = parse_str("let a = 1, b = 2\n").expect("parse");
        let names: Vec<_> = parse
            .root
            .children
            .iter()
            .map(|n| n.name_text().unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        parse.root.validate_spans().expect("spans");
    }

    #[test]
    fn observer_block_after_initializer() {
        let parse = parse_str("var x: Int = 0 {\n    didSet { print(x) }\n}\n").expect("parse");
        let prop = &parse.root.children[0];
        assert_eq!(prop.kind, NodeKind::Property);
        let accessor = prop
            .children
            .iter()
            .find(|c| c.kind == NodeKind::Accessor)
            .expect("accessor");
        assert_eq!(accessor.name_text(), Some("didSet"));
    }

    #[test]
    fn trailing_closure_is_closure_and_if_body_is_block() {
        let parse = parse_str("3.repetitions { print(\"x\") }\nif ok { run() }\n").expect("parse");
        let first = &parse.root.children[0];
        assert!(first.children.iter().any(|c| c.kind == NodeKind::Closure));
        let second = &parse.root.children[1];
        assert!(second.children.iter().any(|c| c.kind == NodeKind::Block));
    }
}
