//! Checks files in parallel and collects per-file reports.

use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tailor_ast::span::{Position, Span};
use tailor_check::engine::IO_ERROR;
use tailor_check::{Diagnostic, Engine, Severity};

/// Maximum source file size in bytes (1MB)
pub const MAX_SOURCE_SIZE: u64 = 1_000_000;

/// Worker stack size; deeply nested files recurse once per level.
const WORKER_STACK_SIZE: usize = 16 << 20;

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub files: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl Summary {
    pub fn of(reports: &[FileReport]) -> Self {
        let mut summary = Summary {
            files: reports.len(),
            ..Summary::default()
        };
        for d in reports.iter().flat_map(|r| &r.diagnostics) {
            match d.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
            }
        }
        summary
    }

    pub fn violations(&self) -> usize {
        self.errors + self.warnings
    }

    /// 0 when nothing reached error severity, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        u8::from(self.errors > 0)
    }
}

fn io_error(message: String) -> Diagnostic {
    Diagnostic::new(
        IO_ERROR,
        Severity::Error,
        message,
        Span::default(),
        Position { line: 1, column: 1 },
    )
}

fn read_source(path: &Path) -> Result<String, String> {
    let meta = std::fs::metadata(path).map_err(|e| format!("cannot read file: {}", e))?;
    if meta.len() > MAX_SOURCE_SIZE {
        return Err(format!(
            "file exceeds {}MB limit ({} bytes)",
            MAX_SOURCE_SIZE / 1_000_000,
            meta.len()
        ));
    }
    let bytes = std::fs::read(path).map_err(|e| format!("cannot read file: {}", e))?;
    String::from_utf8(bytes).map_err(|_| "file is not valid UTF-8".to_string())
}

pub fn check_file(engine: &Engine, path: &Path) -> FileReport {
    let started = Instant::now();
    let diagnostics = match read_source(path) {
        Ok(text) => engine.check_source(&text),
        Err(message) => vec![io_error(message)],
    };
    log::debug!(
        "{}: {} diagnostics in {:?}",
        path.display(),
        diagnostics.len(),
        started.elapsed()
    );
    FileReport {
        path: path.to_path_buf(),
        diagnostics,
    }
}

/// Check every file on a pool of `jobs` threads (`0` = rayon default).
/// Reports come back in input order.
pub fn check_files(
    engine: &Engine,
    files: &[PathBuf],
    jobs: usize,
) -> Result<Vec<FileReport>, rayon::ThreadPoolBuildError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .stack_size(WORKER_STACK_SIZE)
        .build()?;
    Ok(pool.install(|| files.par_iter().map(|f| check_file(engine, f)).collect()))
}
