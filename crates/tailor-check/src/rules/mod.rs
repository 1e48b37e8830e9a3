//! Built-in rules, registered in a fixed order.

mod length;
mod magic_number;
mod naming;
mod tokens;
mod whitespace;

use crate::diagnostic::Severity::{Error, Warning};
use crate::registry::Registry;
use tailor_ast::syntax::NodeKind;

pub use length::{MaxConstructLength, MaxFileLength, MaxLineLength, MaxNameLength};
pub use magic_number::AvoidMagicNumericLiteral;
pub use naming::{ConstantKPrefix, LowerCamelCase, UpperCamelCase};
pub use tokens::{ForcedTypeCast, TerminatingSemicolon, TodoSyntax};
pub use whitespace::{LeadingWhitespace, TerminatingNewline, TrailingWhitespace};

pub(crate) fn register_builtin(r: &mut Registry) {
    r.register(
        "avoid-magic-numeric-literal",
        "numeric literals other than 0 and 1 must be named constants",
        Warning,
        |_| Box::new(AvoidMagicNumericLiteral),
    );
    r.register(
        "constant-k-prefix",
        "constant names must not use a `k` prefix",
        Warning,
        |_| Box::new(ConstantKPrefix),
    );
    r.register(
        "upper-camel-case",
        "type and enum case names must be UpperCamelCase",
        Error,
        |_| Box::new(UpperCamelCase),
    );
    r.register(
        "lower-camel-case",
        "function, variable and parameter names must be lowerCamelCase",
        Error,
        |_| Box::new(LowerCamelCase),
    );
    r.register(
        "max-line-length",
        "lines must not exceed the configured length",
        Error,
        |limits| Box::new(MaxLineLength::new(limits.line)),
    );
    r.register(
        "max-file-length",
        "files must not exceed the configured number of lines",
        Error,
        |limits| Box::new(MaxFileLength::new(limits.file)),
    );
    r.register(
        "max-name-length",
        "declared names must not exceed the configured length",
        Error,
        |limits| Box::new(MaxNameLength::new(limits.name)),
    );
    r.register(
        "max-function-length",
        "functions must not exceed the configured number of lines",
        Error,
        |limits| {
            Box::new(MaxConstructLength::new(
                "function",
                &[NodeKind::Function, NodeKind::Initializer, NodeKind::Deinitializer],
                limits.function,
            ))
        },
    );
    r.register(
        "max-closure-length",
        "closures must not exceed the configured number of lines",
        Error,
        |limits| Box::new(MaxConstructLength::new("closure", &[NodeKind::Closure], limits.closure)),
    );
    r.register(
        "max-class-length",
        "classes must not exceed the configured number of lines",
        Error,
        |limits| Box::new(MaxConstructLength::new("class", &[NodeKind::Class], limits.class)),
    );
    r.register(
        "max-struct-length",
        "structs must not exceed the configured number of lines",
        Error,
        |limits| Box::new(MaxConstructLength::new("struct", &[NodeKind::Struct], limits.struct_)),
    );
    r.register(
        "trailing-whitespace",
        "lines must not end with whitespace",
        Warning,
        |_| Box::new(TrailingWhitespace),
    );
    r.register(
        "terminating-newline",
        "files must end with exactly one newline",
        Warning,
        |_| Box::new(TerminatingNewline),
    );
    r.register(
        "leading-whitespace",
        "files must not start with whitespace",
        Warning,
        |_| Box::new(LeadingWhitespace),
    );
    r.register(
        "terminating-semicolon",
        "statements must not end with a semicolon",
        Warning,
        |_| Box::new(TerminatingSemicolon),
    );
    r.register(
        "forced-type-cast",
        "avoid forced casts with `as!`",
        Warning,
        |_| Box::new(ForcedTypeCast),
    );
    r.register(
        "todo-syntax",
        "TODO comments must read `TODO: text` or `TODO(owner): text`",
        Warning,
        |_| Box::new(TodoSyntax::default()),
    );
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::diagnostic::Diagnostic;
    use crate::engine::Engine;
    use crate::registry::Registry;
    use crate::settings::{Limits, Settings};

    /// Run a single built-in rule over `src`.
    pub fn run(rule: &str, src: &str) -> Vec<Diagnostic> {
        run_with(rule, Limits::default(), src)
    }

    pub fn run_with(rule: &str, limits: Limits, src: &str) -> Vec<Diagnostic> {
        let settings = Settings::default().only([rule]).with_limits(limits);
        Engine::new(Registry::builtin(), settings).check_source(src)
    }

    /// `line:column` of each diagnostic.
    pub fn positions(diags: &[Diagnostic]) -> Vec<String> {
        diags.iter().map(|d| d.position.to_string()).collect()
    }
}
