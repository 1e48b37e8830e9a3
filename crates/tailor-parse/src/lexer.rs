use crate::token::{is_keyword, CommentKind, LexError, LiteralKind, Token, TokenKind};
use tailor_ast::span::Span;

/// Lazily splits source text into tokens, trivia included.
///
/// The lexer never fails: input it cannot classify comes out as
/// `TokenKind::Error` so that the concatenated token texts always
/// reproduce the source exactly.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

/// Start tokenizing `src` from the beginning.
pub fn tokenize(src: &str) -> Lexer<'_> {
    Lexer::new(src)
}

fn is_operator_char(c: char) -> bool {
    matches!(
        c,
        '/' | '=' | '-' | '+' | '!' | '*' | '%' | '<' | '>' | '&' | '|' | '^' | '~' | '?'
    )
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek2(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn bump_while(&mut self, pred: impl Fn(char) -> bool) {
        while matches!(self.peek(), Some(c) if pred(c)) {
            self.bump();
        }
    }

    fn at_comment_start(&self) -> bool {
        let rest = self.rest();
        rest.starts_with("//") || rest.starts_with("/*")
    }

    pub fn next_token(&mut self) -> Option<Token<'a>> {
        let start = self.pos;
        let c = self.peek()?;

        let kind = if c.is_whitespace() {
            self.bump_while(char::is_whitespace);
            TokenKind::Whitespace
        } else if self.rest().starts_with("//") {
            self.bump_while(|c| c != '\n');
            TokenKind::Comment(CommentKind::Line)
        } else if self.rest().starts_with("/*") {
            self.block_comment()
        } else if c == '"' {
            self.string(0)
        } else if c == '#' {
            self.pound()
        } else if c.is_ascii_digit() {
            self.number()
        } else if is_ident_start(c) {
            self.bump_while(is_ident_continue);
            if is_keyword(&self.src[start..self.pos]) {
                TokenKind::Keyword
            } else {
                TokenKind::Identifier
            }
        } else if c == '`' {
            self.escaped_ident()
        } else if c == '$' {
            self.bump();
            self.bump_while(is_ident_continue);
            TokenKind::Identifier
        } else if c == '.' {
            self.bump();
            if self.peek() == Some('.') {
                // dot operators: `...`, `..<`
                while let Some(c) = self.peek() {
                    if (c == '.' || is_operator_char(c)) && !self.at_comment_start() {
                        self.bump();
                    } else {
                        break;
                    }
                }
                TokenKind::Operator
            } else {
                TokenKind::Punctuation
            }
        } else if c == '-' && self.peek2() == Some('>') {
            self.pos += 2;
            TokenKind::Punctuation
        } else if is_operator_char(c) {
            self.bump();
            while let Some(c) = self.peek() {
                if is_operator_char(c) && !self.at_comment_start() {
                    self.bump();
                } else {
                    break;
                }
            }
            TokenKind::Operator
        } else if matches!(
            c,
            '(' | ')' | '[' | ']' | '{' | '}' | ',' | ':' | ';' | '@' | '\\'
        ) {
            self.bump();
            TokenKind::Punctuation
        } else {
            self.bump();
            TokenKind::Error(LexError::UnknownCharacter)
        };

        Some(Token {
            kind,
            text: &self.src[start..self.pos],
            span: Span::new(start as u32, self.pos as u32),
        })
    }

    fn block_comment(&mut self) -> TokenKind {
        self.pos += 2;
        let mut depth = 1usize;
        while depth > 0 {
            if self.rest().starts_with("/*") {
                self.pos += 2;
                depth += 1;
            } else if self.rest().starts_with("*/") {
                self.pos += 2;
                depth -= 1;
            } else if self.bump().is_none() {
                return TokenKind::Error(LexError::UnterminatedComment);
            }
        }
        TokenKind::Comment(CommentKind::Block)
    }

    fn escaped_ident(&mut self) -> TokenKind {
        self.bump();
        self.bump_while(|c| c != '`' && c != '\n');
        if self.peek() == Some('`') {
            self.bump();
            TokenKind::Identifier
        } else {
            TokenKind::Error(LexError::UnknownCharacter)
        }
    }

    /// `#if`-style directives, raw strings `#"..."#`, or a lone `#`.
    fn pound(&mut self) -> TokenKind {
        let hashes = self.rest().bytes().take_while(|&b| b == b'#').count();
        if self.rest()[hashes..].starts_with('"') {
            self.pos += hashes;
            return self.string(hashes);
        }
        self.bump();
        if matches!(self.peek(), Some(c) if is_ident_start(c)) {
            self.bump_while(is_ident_continue);
            TokenKind::Keyword
        } else {
            TokenKind::Punctuation
        }
    }

    fn number(&mut self) -> TokenKind {
        let first = self.bump();
        let radix = match (first, self.peek()) {
            (Some('0'), Some('x')) => 16,
            (Some('0'), Some('o')) => 8,
            (Some('0'), Some('b')) => 2,
            _ => 10,
        };
        if radix != 10 && matches!(self.peek2(), Some(c) if c.is_digit(radix)) {
            self.bump();
            self.bump_while(|c| c.is_digit(radix) || c == '_');
            if radix == 16 && self.hex_exponent() {
                return TokenKind::Literal(LiteralKind::Float);
            }
            return TokenKind::Literal(LiteralKind::Integer);
        }

        self.bump_while(|c| c.is_ascii_digit() || c == '_');
        let mut float = false;
        if self.peek() == Some('.') && matches!(self.peek2(), Some(c) if c.is_ascii_digit()) {
            self.bump();
            self.bump_while(|c| c.is_ascii_digit() || c == '_');
            float = true;
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let exp = &self.rest()[1..];
            let digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            if digits.starts_with(|c: char| c.is_ascii_digit()) {
                self.pos += 1 + (exp.len() - digits.len());
                self.bump_while(|c| c.is_ascii_digit() || c == '_');
                float = true;
            }
        }
        if float {
            TokenKind::Literal(LiteralKind::Float)
        } else {
            TokenKind::Literal(LiteralKind::Integer)
        }
    }

    /// Optional `.fraction` and `p` exponent of a hex float such as
    /// `0x1.8p3`. The fraction only counts when an exponent follows, so
    /// `0xFF.description` stays a member access.
    fn hex_exponent(&mut self) -> bool {
        let rest = self.rest();
        let fraction = match rest.strip_prefix('.') {
            Some(frac) => {
                let digits = frac
                    .bytes()
                    .take_while(|b| b.is_ascii_hexdigit() || *b == b'_')
                    .count();
                if digits > 0 {
                    1 + digits
                } else {
                    0
                }
            }
            None => 0,
        };
        let Some(exp) = rest[fraction..].strip_prefix(['p', 'P']) else {
            return false;
        };
        let digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
        if !digits.starts_with(|c: char| c.is_ascii_digit()) {
            return false;
        }
        self.pos += fraction + 1 + (exp.len() - digits.len());
        self.bump_while(|c| c.is_ascii_digit() || c == '_');
        true
    }

    /// Lex a string literal starting at its opening quote. `hashes` is the
    /// number of `#` delimiters already consumed for a raw string.
    fn string(&mut self, hashes: usize) -> TokenKind {
        let multiline = self.rest().starts_with("\"\"\"");
        self.pos += if multiline { 3 } else { 1 };
        match self.string_body(hashes, multiline) {
            Ok(()) => TokenKind::Literal(LiteralKind::String),
            Err(e) => TokenKind::Error(e),
        }
    }

    fn at_delimiter(&self, quote: &str, hashes: usize) -> bool {
        let rest = self.rest();
        rest.starts_with(quote)
            && rest.len() >= quote.len() + hashes
            && rest.as_bytes()[quote.len()..quote.len() + hashes]
                .iter()
                .all(|&b| b == b'#')
    }

    fn string_body(&mut self, hashes: usize, multiline: bool) -> Result<(), LexError> {
        let quote = if multiline { "\"\"\"" } else { "\"" };
        loop {
            let Some(c) = self.peek() else {
                return Err(LexError::UnterminatedString);
            };
            match c {
                '"' if self.at_delimiter(quote, hashes) => {
                    self.pos += quote.len() + hashes;
                    return Ok(());
                }
                '\\' if self.at_delimiter("\\", hashes) => {
                    self.pos += 1 + hashes;
                    match self.peek() {
                        Some('(') => {
                            self.bump();
                            self.interpolation(multiline)?;
                        }
                        Some('\n') if !multiline => return Err(LexError::UnterminatedString),
                        Some(_) => {
                            self.bump();
                        }
                        None => return Err(LexError::UnterminatedString),
                    }
                }
                '\n' if !multiline => return Err(LexError::UnterminatedString),
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Skip an interpolated expression up to its closing parenthesis.
    /// Nested parentheses and string literals are part of the expression.
    fn interpolation(&mut self, multiline: bool) -> Result<(), LexError> {
        let mut depth = 1usize;
        loop {
            let Some(c) = self.peek() else {
                return Err(LexError::UnterminatedString);
            };
            match c {
                '(' => {
                    self.bump();
                    depth += 1;
                }
                ')' => {
                    self.bump();
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                '"' => {
                    if let TokenKind::Error(e) = self.string(0) {
                        return Err(e);
                    }
                }
                '\n' if !multiline => return Err(LexError::UnterminatedString),
                _ => {
                    self.bump();
                }
            }
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        self.next_token()
    }
}
