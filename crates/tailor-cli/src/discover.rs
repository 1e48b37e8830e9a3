//! Input discovery: expand paths into the sorted list of Swift files.

use crate::config::ConfigError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const SOURCE_EXTENSION: &str = "swift";

/// Environment variable Xcode sets to the project root in build phases.
pub const SRCROOT: &str = "SRCROOT";

pub fn exclude_set(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| ConfigError::Glob {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| ConfigError::Glob {
        pattern: patterns.join(", "),
        source,
    })
}

/// Roots to scan when the command line names none: `$SRCROOT`, if set.
pub fn default_roots() -> Option<Vec<PathBuf>> {
    std::env::var_os(SRCROOT)
        .filter(|v| !v.is_empty())
        .map(|root| vec![PathBuf::from(root)])
}

fn is_source(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION)
}

fn excluded(excludes: &GlobSet, root: &Path, path: &Path) -> bool {
    excludes.is_match(path)
        || path
            .strip_prefix(root)
            .is_ok_and(|relative| excludes.is_match(relative))
}

/// Expand `roots` into source files. Directories are walked recursively
/// for `*.swift`; files named explicitly are kept whatever their
/// extension, and missing paths are kept so that reading them reports an
/// error. The result is sorted and free of duplicates.
pub fn collect_files(roots: &[PathBuf], excludes: &GlobSet) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for root in roots {
        if !root.is_dir() {
            if !excluded(excludes, root, root) {
                files.push(root.clone());
            }
            continue;
        }
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !excluded(excludes, root, e.path()));
        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() && is_source(entry.path()) => {
                    files.push(entry.into_path());
                }
                Ok(_) => {}
                Err(err) => log::warn!("skipping unreadable entry under {}: {}", root.display(), err),
            }
        }
    }
    files.sort();
    files.dedup();
    log::debug!("discovered {} source files", files.len());
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, "let a = 1\n").expect("write");
    }

    #[test]
    fn walks_sorted_and_filters_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        touch(&root.join("b.swift"));
        touch(&root.join("a/z.swift"));
        touch(&root.join("a/readme.md"));
        let files = collect_files(&[root.to_path_buf()], &GlobSet::empty());
        assert_eq!(files, vec![root.join("a/z.swift"), root.join("b.swift")]);
    }

    #[test]
    fn excludes_apply_to_relative_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        touch(&root.join("Pods/Lib/x.swift"));
        touch(&root.join("App/main.swift"));
        let excludes = exclude_set(&["Pods/**".to_string()]).expect("glob");
        let files = collect_files(&[root.to_path_buf()], &excludes);
        assert_eq!(files, vec![root.join("App/main.swift")]);
    }

    #[test]
    fn explicit_and_missing_files_are_kept() {
        let dir = tempfile::tempdir().expect("tempdir");
        let notes = dir.path().join("notes.txt");
        touch(&notes);
        let missing = dir.path().join("gone.swift");
        let files = collect_files(&[missing.clone(), notes.clone(), notes.clone()], &GlobSet::empty());
        assert_eq!(files, vec![missing, notes]);
    }

    #[test]
    fn bad_glob_is_a_config_error() {
        assert!(exclude_set(&["[".to_string()]).is_err());
    }
}
