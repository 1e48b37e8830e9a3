use crate::rule::{Rule, RuleContext, RuleError};
use tailor_ast::syntax::{Ident, NodeKind, SyntaxNode};

/// Names bound by a declaration node: its own name, or each name of a
/// destructuring pattern.
fn bound_names(node: &SyntaxNode) -> Vec<&Ident> {
    match &node.name {
        Some(name) => vec![name],
        None => node
            .children
            .iter()
            .filter(|c| c.kind == NodeKind::Pattern)
            .flat_map(|p| p.pattern_names())
            .collect(),
    }
}

fn is_k_prefixed(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next() == Some('k') && chars.next().is_some_and(char::is_uppercase)
}

fn is_upper_camel(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase) && !name.contains('_')
}

fn is_lower_camel(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_lowercase) && !name.contains('_')
}

pub struct ConstantKPrefix;

impl Rule for ConstantKPrefix {
    fn visit(
        &mut self,
        node: &SyntaxNode,
        _ancestors: &[&SyntaxNode],
        cx: &mut RuleContext<'_>,
    ) -> Result<(), RuleError> {
        if node.kind != NodeKind::Constant {
            return Ok(());
        }
        for name in bound_names(node) {
            if is_k_prefixed(name.bare()) {
                cx.report(
                    name.span,
                    format!("constant name `{}` should not be prefixed with `k`", name.bare()),
                );
            }
        }
        Ok(())
    }
}

pub struct UpperCamelCase;

impl Rule for UpperCamelCase {
    fn visit(
        &mut self,
        node: &SyntaxNode,
        _ancestors: &[&SyntaxNode],
        cx: &mut RuleContext<'_>,
    ) -> Result<(), RuleError> {
        let what = match node.kind {
            NodeKind::Class => "class",
            NodeKind::Struct => "struct",
            NodeKind::Enum => "enum",
            NodeKind::Protocol => "protocol",
            NodeKind::TypeAlias => "type alias",
            NodeKind::EnumCase => "enum case",
            _ => return Ok(()),
        };
        if let Some(name) = &node.name {
            if !is_upper_camel(name.bare()) {
                cx.report(
                    name.span,
                    format!("{} name `{}` should be UpperCamelCase", what, name.bare()),
                );
            }
        }
        Ok(())
    }
}

pub struct LowerCamelCase;

impl Rule for LowerCamelCase {
    fn visit(
        &mut self,
        node: &SyntaxNode,
        _ancestors: &[&SyntaxNode],
        cx: &mut RuleContext<'_>,
    ) -> Result<(), RuleError> {
        let what = match node.kind {
            NodeKind::Function => "function",
            NodeKind::Property => "variable",
            NodeKind::Constant => "constant",
            NodeKind::Parameter => "parameter",
            _ => return Ok(()),
        };
        for name in bound_names(node) {
            let bare = name.bare();
            // operator functions and `_` placeholders have no case
            if bare == "_" || !bare.starts_with(|c: char| c.is_alphabetic() || c == '_') {
                continue;
            }
            if !is_lower_camel(bare) {
                cx.report(
                    name.span,
                    format!("{} name `{}` should be lowerCamelCase", what, bare),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::{positions, run};
    use pretty_assertions::assert_eq;

    #[test]
    fn k_prefix_detection() {
        assert!(is_k_prefixed("kMaxCount"));
        assert!(!is_k_prefixed("kilometers"));
        assert!(!is_k_prefixed("k"));
    }

    #[test]
    fn k_prefix_only_applies_to_constants() {
        let src = "let kTimeout = 5\nvar kRetries = 3\nlet (kWidth, height) = size\n";
        let diags = run("constant-k-prefix", src);
        assert_eq!(positions(&diags), vec!["1:5", "3:6"]);
    }

    #[test]
    fn type_names_must_be_upper_camel() {
        let src = "struct point {}\nenum Kind {\n    case Zero, negative_one\n}\nprotocol Shape {}\n";
        let diags = run("upper-camel-case", src);
        assert_eq!(positions(&diags), vec!["1:8", "3:16"]);
        assert!(diags[0].message.contains("struct name `point`"));
    }

    #[test]
    fn members_must_be_lower_camel() {
        let src = "func Compute(First_value: Int, _ second: Int) {}\nlet Total = 1\nfunc ==(lhs: A, rhs: A) -> Bool {}\n";
        let diags = run("lower-camel-case", src);
        assert_eq!(positions(&diags), vec!["1:6", "1:14", "2:5"]);
    }

    #[test]
    fn backticks_are_ignored() {
        assert!(run("lower-camel-case", "let `default` = value\n").is_empty());
    }
}
