#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]

pub mod diagnostic;
pub mod engine;
pub mod registry;
pub mod rule;
pub mod rules;
pub mod settings;

pub use diagnostic::{Diagnostic, Severity};
pub use engine::Engine;
pub use registry::{Registry, RuleInfo};
pub use rule::{Finding, Rule, RuleContext, RuleError};
pub use settings::{Limits, Settings};
