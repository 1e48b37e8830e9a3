//! End-to-end tests for `tailor check`, `tailor rules` and `tailor parse`.
//!
//! These tests invoke the compiled binary from inside a scratch directory
//! so that no stray `.tailor.yml` or `$SRCROOT` leaks in.

use std::path::Path;
use std::process::{Command, Output};

const SAMPLE: &str = "let kLimit = 10\nstruct point {}\nfunc Run() {\n    wait(30)\n}\n";

fn tailor_bin(cwd: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tailor"));
    cmd.current_dir(cwd).env_remove("SRCROOT").env_remove("RUST_LOG");
    cmd
}

fn run(cwd: &Path, args: &[&str]) -> Output {
    tailor_bin(cwd).args(args).output().expect("run binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn check_reports_each_violation_and_fails() {
    let dir = tempfile::tempdir().expect("create tempdir");
    std::fs::write(dir.path().join("sample.swift"), SAMPLE).expect("write source");

    let output = run(dir.path(), &["check", "sample.swift"]);
    let out = stdout(&output);
    assert_eq!(output.status.code(), Some(1), "stderr: {}", stderr(&output));

    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 5, "output: {}", out);
    assert!(lines[0].starts_with("sample.swift:1:5: warning: [constant-k-prefix]"));
    assert!(lines[1].starts_with("sample.swift:2:8: error: [upper-camel-case]"));
    assert!(lines[2].starts_with("sample.swift:3:6: error: [lower-camel-case]"));
    assert!(lines[3].starts_with("sample.swift:4:10: warning: [avoid-magic-numeric-literal]"));
    assert_eq!(
        lines[4],
        "1 file checked, 4 violations found (2 errors, 2 warnings)"
    );
}

#[test]
fn clean_file_exits_zero() {
    let dir = tempfile::tempdir().expect("create tempdir");
    std::fs::write(dir.path().join("ok.swift"), "let answer = 42\n").expect("write source");

    let output = run(dir.path(), &["check", "ok.swift"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("0 violations found"));
}

#[test]
fn json_output_is_machine_readable() {
    let dir = tempfile::tempdir().expect("create tempdir");
    std::fs::write(dir.path().join("sample.swift"), SAMPLE).expect("write source");

    let output = run(dir.path(), &["check", "--format", "json", "sample.swift"]);
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("valid json");
    let diagnostics = value["files"][0]["diagnostics"]
        .as_array()
        .expect("diagnostics array");
    assert_eq!(diagnostics.len(), 4);
    assert_eq!(diagnostics[1]["rule"], "upper-camel-case");
    assert_eq!(diagnostics[1]["line"], 2);
    assert_eq!(value["summary"]["warnings"], 2);
}

#[test]
fn config_file_disables_and_caps() {
    let dir = tempfile::tempdir().expect("create tempdir");
    std::fs::write(dir.path().join("sample.swift"), SAMPLE).expect("write source");
    std::fs::write(
        dir.path().join(".tailor.yml"),
        "max_severity: warning\nrules:\n  upper-camel-case: disabled\n",
    )
    .expect("write config");

    let output = run(dir.path(), &["check", "sample.swift"]);
    let out = stdout(&output);
    assert!(output.status.success(), "stdout: {}", out);
    assert!(!out.contains("upper-camel-case"));
    assert!(out.contains("3 violations found (0 errors, 3 warnings)"));
}

#[test]
fn command_line_overrides_config() {
    let dir = tempfile::tempdir().expect("create tempdir");
    std::fs::write(dir.path().join("sample.swift"), SAMPLE).expect("write source");
    std::fs::write(dir.path().join(".tailor.yml"), "format: json\n").expect("write config");

    let output = run(
        dir.path(),
        &["check", "--format", "text", "--only", "constant-k-prefix", "sample.swift"],
    );
    let out = stdout(&output);
    assert!(output.status.success(), "stdout: {}", out);
    assert!(out.starts_with("sample.swift:1:5: warning: [constant-k-prefix]"));
    assert!(out.contains("1 violation found"));
}

#[test]
fn unknown_rule_is_a_usage_error() {
    let dir = tempfile::tempdir().expect("create tempdir");
    std::fs::write(dir.path().join("ok.swift"), "let answer = 42\n").expect("write source");

    let output = run(dir.path(), &["check", "--except", "no-such-rule", "ok.swift"]);
    assert!(!output.status.success());
    assert!(
        stderr(&output).contains("unknown rule `no-such-rule`"),
        "stderr: {}",
        stderr(&output)
    );
}

#[test]
fn directories_are_walked_with_excludes() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let root = dir.path();
    std::fs::create_dir_all(root.join("src/Pods")).expect("mkdir");
    std::fs::write(root.join("src/a.swift"), "let kA = 2\n").expect("write");
    std::fs::write(root.join("src/notes.txt"), "let kB = 2\n").expect("write");
    std::fs::write(root.join("src/Pods/vendor.swift"), "let kC = 2\n").expect("write");
    std::fs::write(root.join(".tailor.yml"), "exclude: [\"Pods/**\"]\n").expect("write config");

    let output = run(root, &["check", "src"]);
    let out = stdout(&output);
    assert!(out.contains("a.swift:1:5"), "stdout: {}", out);
    assert!(!out.contains("vendor.swift"));
    assert!(!out.contains("notes.txt"));
    assert!(out.contains("1 file checked"));
}

#[test]
fn srcroot_is_the_default_input() {
    let dir = tempfile::tempdir().expect("create tempdir");
    std::fs::write(dir.path().join("sample.swift"), SAMPLE).expect("write source");

    let output = tailor_bin(dir.path())
        .arg("check")
        .env("SRCROOT", dir.path())
        .output()
        .expect("run binary");
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("4 violations found"));

    let output = run(dir.path(), &["check"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("SRCROOT"));
}

#[test]
fn unreadable_file_is_reported_not_fatal() {
    let dir = tempfile::tempdir().expect("create tempdir");
    std::fs::write(dir.path().join("ok.swift"), "let answer = 42\n").expect("write source");

    let output = run(dir.path(), &["check", "missing.swift", "ok.swift"]);
    let out = stdout(&output);
    assert_eq!(output.status.code(), Some(1));
    assert!(out.contains("missing.swift:1:1: error: [io-error]"), "stdout: {}", out);
    assert!(out.contains("2 files checked"));
}

#[test]
fn rules_lists_every_builtin() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let output = run(dir.path(), &["rules"]);
    let out = stdout(&output);
    assert!(output.status.success());
    assert_eq!(out.lines().count(), 17);
    assert!(out.lines().any(|l| l.starts_with("todo-syntax")));
}

#[test]
fn parse_dumps_tree_as_json() {
    let dir = tempfile::tempdir().expect("create tempdir");
    std::fs::write(dir.path().join("ext.swift"), "extension Int {\n    func twice() {}\n}\n")
        .expect("write source");

    let output = run(dir.path(), &["parse", "ext.swift", "--format", "json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("valid json");
    assert_eq!(value["root"]["kind"], "SourceFile");
    assert_eq!(value["root"]["children"][0]["kind"], "Extension");
    assert_eq!(value["errors"].as_array().map(Vec::len), Some(0));
}

#[test]
fn parse_rejects_unclosed_input() {
    let dir = tempfile::tempdir().expect("create tempdir");
    std::fs::write(dir.path().join("bad.swift"), "func f() {\n").expect("write source");

    let output = run(dir.path(), &["parse", "bad.swift"]);
    assert!(!output.status.success());
    assert!(
        stderr(&output).contains("bad.swift:1:10: unclosed `{`"),
        "stderr: {}",
        stderr(&output)
    );
}

#[test]
fn no_sources_found_is_an_error() {
    let dir = tempfile::tempdir().expect("create tempdir");
    std::fs::create_dir_all(dir.path().join("empty")).expect("mkdir");
    std::fs::write(dir.path().join("empty/readme.md"), "notes\n").expect("write");

    let output = run(dir.path(), &["check", "empty"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).is_empty());
    assert!(
        stderr(&output).contains("no Swift source files found in empty"),
        "stderr: {}",
        stderr(&output)
    );
}

#[test]
fn default_config_flags_long_lines() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let line = format!("// {}\n", "x".repeat(118));
    std::fs::write(dir.path().join("long.swift"), line).expect("write source");

    let output = run(dir.path(), &["check", "long.swift"]);
    let out = stdout(&output);
    assert_eq!(output.status.code(), Some(1), "stdout: {}", out);
    assert!(out.starts_with("long.swift:1:121: error: [max-line-length]"), "stdout: {}", out);
}
