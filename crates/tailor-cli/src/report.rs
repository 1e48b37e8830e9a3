//! Renders file reports as human-readable text or JSON.

use crate::config::OutputFormat;
use crate::driver::{FileReport, Summary};
use colored::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tailor_ast::span::Span;
use tailor_check::{Diagnostic, Severity};

pub trait Formatter {
    fn format(&self, reports: &[FileReport]) -> String;
}

pub fn formatter(format: OutputFormat, colored: bool) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter { colored }),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Render `reports` with files ordered by path and diagnostics in engine order.
pub fn report(reports: &[FileReport], format: OutputFormat, colored: bool) -> String {
    let mut sorted: Vec<&FileReport> = reports.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));
    let sorted: Vec<FileReport> = sorted.into_iter().cloned().collect();
    formatter(format, colored).format(&sorted)
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

/// Stable identity of a finding, independent of its column and severity.
pub fn fingerprint(path: &str, diagnostic: &Diagnostic) -> String {
    sha256_hex(&format!(
        "{}:{}:{}:{}",
        diagnostic.rule, path, diagnostic.position.line, diagnostic.message
    ))
}

pub struct TextFormatter {
    pub colored: bool,
}

impl TextFormatter {
    fn severity_str(&self, severity: Severity) -> ColoredString {
        let s = severity.to_string();
        if !self.colored {
            return s.normal();
        }
        match severity {
            Severity::Error => s.red().bold(),
            Severity::Warning => s.yellow().bold(),
        }
    }

    fn rule_str(&self, rule: &str) -> ColoredString {
        let s = format!("[{}]", rule);
        if self.colored {
            s.dimmed()
        } else {
            s.normal()
        }
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{} {}", n, word)
    } else {
        format!("{} {}s", n, word)
    }
}

impl Formatter for TextFormatter {
    fn format(&self, reports: &[FileReport]) -> String {
        let mut output = String::new();
        for report in reports {
            let path = report.path.display();
            for d in &report.diagnostics {
                output.push_str(&format!(
                    "{}:{}:{}: {}: {} {}\n",
                    path,
                    d.position.line,
                    d.position.column,
                    self.severity_str(d.severity),
                    self.rule_str(d.rule),
                    d.message
                ));
            }
        }

        let summary = Summary::of(reports);
        output.push_str(&format!(
            "{} checked, {} found ({}, {})\n",
            plural(summary.files, "file"),
            plural(summary.violations(), "violation"),
            plural(summary.errors, "error"),
            plural(summary.warnings, "warning"),
        ));
        output
    }
}

pub struct JsonFormatter;

#[derive(Serialize)]
struct JsonOutput<'a> {
    files: Vec<JsonFile<'a>>,
    summary: Summary,
}

#[derive(Serialize)]
struct JsonFile<'a> {
    path: String,
    diagnostics: Vec<JsonDiagnostic<'a>>,
}

#[derive(Serialize)]
struct JsonDiagnostic<'a> {
    rule: &'a str,
    severity: Severity,
    message: &'a str,
    line: u32,
    column: u32,
    span: Span,
    fingerprint: String,
}

impl Formatter for JsonFormatter {
    fn format(&self, reports: &[FileReport]) -> String {
        let files = reports
            .iter()
            .map(|report| {
                let path = report.path.display().to_string();
                let diagnostics = report
                    .diagnostics
                    .iter()
                    .map(|d| JsonDiagnostic {
                        rule: d.rule,
                        severity: d.severity,
                        message: &d.message,
                        line: d.position.line,
                        column: d.position.column,
                        span: d.span,
                        fingerprint: fingerprint(&path, d),
                    })
                    .collect();
                JsonFile { path, diagnostics }
            })
            .collect();
        let output = JsonOutput {
            files,
            summary: Summary::of(reports),
        };
        match serde_json::to_string_pretty(&output) {
            Ok(mut json) => {
                json.push('\n');
                json
            }
            Err(err) => format!("{{\"error\": \"{}\"}}\n", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tailor_ast::span::Position;

    fn sample() -> Vec<FileReport> {
        vec![
            FileReport {
                path: PathBuf::from("b.swift"),
                diagnostics: vec![],
            },
            FileReport {
                path: PathBuf::from("a.swift"),
                diagnostics: vec![
                    Diagnostic::new(
                        "constant-k-prefix",
                        Severity::Warning,
                        "Constant name should not be k prefixed",
                        Span::new(4, 10),
                        Position { line: 1, column: 5 },
                    ),
                    Diagnostic::new(
                        "upper-camel-case",
                        Severity::Error,
                        "Type name should be UpperCamelCase",
                        Span::new(23, 28),
                        Position { line: 2, column: 8 },
                    ),
                ],
            },
        ]
    }

    #[test]
    fn text_lines_sorted_by_path() {
        let out = report(&sample(), OutputFormat::Text, false);
        assert_eq!(
            out,
            "a.swift:1:5: warning: [constant-k-prefix] Constant name should not be k prefixed\n\
             a.swift:2:8: error: [upper-camel-case] Type name should be UpperCamelCase\n\
             2 files checked, 2 violations found (1 error, 1 warning)\n"
        );
    }

    #[test]
    fn json_carries_positions_and_fingerprints() {
        let out = report(&sample(), OutputFormat::Json, false);
        let value: serde_json::Value = serde_json::from_str(&out).expect("valid json");
        assert_eq!(value["files"][0]["path"], "a.swift");
        let first = &value["files"][0]["diagnostics"][0];
        assert_eq!(first["rule"], "constant-k-prefix");
        assert_eq!(first["severity"], "warning");
        assert_eq!(first["line"], 1);
        assert_eq!(first["column"], 5);
        assert_eq!(first["span"]["start"], 4);
        assert!(first["fingerprint"].as_str().expect("string").starts_with("sha256:"));
        assert_eq!(value["summary"]["errors"], 1);
        assert_eq!(value["summary"]["files"], 2);
    }

    #[test]
    fn output_is_deterministic() {
        let mut reversed = sample();
        reversed.reverse();
        for format in [OutputFormat::Text, OutputFormat::Json] {
            assert_eq!(report(&sample(), format, false), report(&reversed, format, false));
        }
    }

    #[test]
    fn fingerprint_ignores_column() {
        let reports = sample();
        let mut moved = reports[1].diagnostics[0].clone();
        moved.position.column = 9;
        assert_eq!(
            fingerprint("a.swift", &reports[1].diagnostics[0]),
            fingerprint("a.swift", &moved)
        );
        assert_ne!(
            fingerprint("a.swift", &moved),
            fingerprint("b.swift", &moved)
        );
    }
}
