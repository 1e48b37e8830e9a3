#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]

mod lexer;
mod parser;
mod token;

pub use lexer::{tokenize, Lexer};
pub use parser::{parse, parse_str, parse_until, Parse, ParseError, SyntaxError, MAX_NESTING_DEPTH};
pub use token::{is_keyword, CommentKind, LexError, LiteralKind, Token, TokenKind, KEYWORDS};
