#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]

pub mod config;
pub mod discover;
pub mod driver;
pub mod report;

pub use config::{ColorChoice, Config, ConfigError, OutputFormat};
pub use driver::{FileReport, Summary};
