use crate::rule::{Rule, RuleContext, RuleError};
use tailor_ast::syntax::{NodeKind, SyntaxNode};

/// Flags numeric literals other than `0` and `1` unless they initialize a
/// `let` constant, which is how a literal gets its name.
pub struct AvoidMagicNumericLiteral;

fn is_trivial(text: &str) -> bool {
    matches!(literal_value(text), Some(v) if v == 0.0 || v == 1.0)
}

/// Numeric value of a Swift integer or float literal, honoring the `0x`,
/// `0o` and `0b` prefixes and hex float exponents.
fn literal_value(text: &str) -> Option<f64> {
    let digits = text.replace('_', "");
    let radix = match digits.get(..2) {
        Some("0x") => 16,
        Some("0o") => 8,
        Some("0b") => 2,
        _ => return digits.parse().ok(),
    };
    let body = &digits[2..];
    if radix != 16 {
        return u64::from_str_radix(body, radix).ok().map(|v| v as f64);
    }
    let (mantissa, exponent) = match body.split_once(['p', 'P']) {
        Some((m, e)) => (m, e.parse::<i32>().ok()?),
        None => (body, 0),
    };
    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let mut value = u64::from_str_radix(whole, 16).ok()? as f64;
    let mut scale = 1.0 / 16.0;
    for c in fraction.chars() {
        value += f64::from(c.to_digit(16)?) * scale;
        scale /= 16.0;
    }
    Some(value * 2f64.powi(exponent))
}

impl Rule for AvoidMagicNumericLiteral {
    fn visit(
        &mut self,
        node: &SyntaxNode,
        ancestors: &[&SyntaxNode],
        cx: &mut RuleContext<'_>,
    ) -> Result<(), RuleError> {
        if !matches!(node.kind, NodeKind::IntegerLiteral | NodeKind::FloatLiteral) {
            return Ok(());
        }
        let Some(text) = node.name_text() else {
            return Ok(());
        };
        if is_trivial(text) {
            return Ok(());
        }
        if ancestors.last().is_some_and(|p| p.kind == NodeKind::Constant) {
            return Ok(());
        }
        cx.report(
            node.span,
            format!("magic numeric literal `{}`; bind it to a named constant", text),
        );
        Ok(())
    }
}
