use crate::rule::{Rule, RuleContext, RuleError};
use regex::Regex;
use tailor_ast::span::Span;
use tailor_parse::{Token, TokenKind};

/// Index of the next non-trivia token after `i`, and whether a line break
/// sits between them.
fn next_significant(tokens: &[Token<'_>], i: usize) -> (Option<usize>, bool) {
    let mut newline = false;
    for (j, tok) in tokens.iter().enumerate().skip(i + 1) {
        if tok.kind.is_trivia() {
            newline |= tok.text.contains('\n');
            continue;
        }
        return (Some(j), newline);
    }
    (None, newline)
}

pub struct TerminatingSemicolon;

impl Rule for TerminatingSemicolon {
    fn finish(&mut self, cx: &mut RuleContext<'_>) -> Result<(), RuleError> {
        let tokens = cx.tokens();
        for (i, tok) in tokens.iter().enumerate() {
            if !tok.is_punct(";") {
                continue;
            }
            let terminates = match next_significant(tokens, i) {
                (None, _) | (_, true) => true,
                (Some(j), false) => tokens[j].is_punct("}"),
            };
            if terminates {
                cx.report(tok.span, "statement should not end with a semicolon");
            }
        }
        Ok(())
    }
}

pub struct ForcedTypeCast;

impl Rule for ForcedTypeCast {
    fn finish(&mut self, cx: &mut RuleContext<'_>) -> Result<(), RuleError> {
        for pair in cx.tokens().windows(2) {
            let (cast, bang) = (pair[0], pair[1]);
            if cast.is_keyword("as")
                && bang.kind == TokenKind::Operator
                && bang.text.starts_with('!')
                && bang.span.start == cast.span.end
            {
                cx.report(
                    Span::new(cast.span.start, bang.span.start + 1),
                    "forced type cast `as!` should be avoided",
                );
            }
        }
        Ok(())
    }
}

const TODO_WORD: &str = r"\bTODO\b";
const TODO_FORM: &str = r"^TODO(\([^()\s]+\))?: \S";

/// TODO comments must read `TODO: text` or `TODO(owner): text`.
#[derive(Default)]
pub struct TodoSyntax {
    patterns: Option<(Regex, Regex)>,
}

impl Rule for TodoSyntax {
    fn finish(&mut self, cx: &mut RuleContext<'_>) -> Result<(), RuleError> {
        if self.patterns.is_none() {
            self.patterns = Some((Regex::new(TODO_WORD)?, Regex::new(TODO_FORM)?));
        }
        let Some((word, form)) = &self.patterns else {
            return Ok(());
        };
        for tok in cx.tokens() {
            if !matches!(tok.kind, TokenKind::Comment(_)) {
                continue;
            }
            for m in word.find_iter(tok.text) {
                if !form.is_match(&tok.text[m.start()..]) {
                    let start = tok.span.start + m.start() as u32;
                    cx.report(
                        Span::new(start, start + m.len() as u32),
                        "TODO should read `TODO: text` or `TODO(owner): text`",
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::rules::testing::{positions, run};
    use pretty_assertions::assert_eq;

    #[test]
    fn semicolons_at_line_end_and_before_brace() {
        let src = "let a = 1;\nlet b = 2; let c = 3\nif ok { run(); }\nlet d = 4; // note\n";
        let diags = run("terminating-semicolon", src);
        assert_eq!(positions(&diags), vec!["1:10", "3:14", "4:10"]);
    }

    #[test]
    fn forced_cast_only() {
        let src = "let a = x as! Int\nlet b = x as? Int\nlet c = x as Int\n";
        assert_eq!(positions(&run("forced-type-cast", src)), vec!["1:11"]);
    }

    #[test]
    fn todo_forms() {
        let src = "// TODO: fine\n// TODO(jane): fine\n// TODO fix this\n/* TODO:missing space */\n// TODOS are not todos\n";
        let diags = run("todo-syntax", src);
        assert_eq!(positions(&diags), vec!["3:4", "4:4"]);
    }
}
