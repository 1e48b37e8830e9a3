//! `.tailor.yml` configuration.

use clap::ValueEnum;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tailor_check::engine::timeout_from_millis;
use tailor_check::{Limits, Registry, Settings, Severity};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = ".tailor.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("unknown rule `{0}`")]
    UnknownRule(String),
    #[error("invalid exclude pattern `{pattern}`: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

/// Per-rule entry under `rules:`. Either a bare `enabled`/`disabled` or a
/// map with `severity` and/or `enabled`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RuleEntry {
    Toggle(Toggle),
    Detail {
        #[serde(default)]
        severity: Option<Severity>,
        #[serde(default)]
        enabled: Option<bool>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    Enabled,
    Disabled,
}

impl RuleEntry {
    fn enabled(&self) -> bool {
        match self {
            RuleEntry::Toggle(t) => *t == Toggle::Enabled,
            RuleEntry::Detail { enabled, .. } => enabled.unwrap_or(true),
        }
    }

    fn severity(&self) -> Option<Severity> {
        match self {
            RuleEntry::Toggle(_) => None,
            RuleEntry::Detail { severity, .. } => *severity,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub format: OutputFormat,
    pub color: ColorChoice,
    /// Worker threads; `0` lets rayon decide.
    pub jobs: usize,
    /// Per-file analysis budget in milliseconds; `0` means none.
    pub timeout_ms: u64,
    pub max_severity: Option<Severity>,
    pub exclude: Vec<String>,
    pub only: Vec<String>,
    pub except: Vec<String>,
    pub rules: BTreeMap<String, RuleEntry>,
    pub limits: Limits,
}

impl Config {
    pub fn from_yaml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text, path)
    }

    /// Load `explicit` when given, else `.tailor.yml` under `dir` if it
    /// exists, else defaults.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = dir.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            log::debug!("using configuration {}", candidate.display());
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve into engine settings, rejecting rule ids the registry does
    /// not know.
    pub fn settings(&self, registry: &Registry) -> Result<Settings, ConfigError> {
        let known = |id: &String| {
            if registry.contains(id) {
                Ok(())
            } else {
                Err(ConfigError::UnknownRule(id.clone()))
            }
        };
        self.only
            .iter()
            .chain(&self.except)
            .chain(self.rules.keys())
            .try_for_each(known)?;

        let mut settings = Settings::default()
            .only(self.only.iter().cloned())
            .with_limits(self.limits);
        for id in &self.except {
            settings = settings.disable(id.clone());
        }
        for (id, entry) in &self.rules {
            if !entry.enabled() {
                settings = settings.disable(id.clone());
            }
            if let Some(severity) = entry.severity() {
                settings = settings.with_severity(id.clone(), severity);
            }
        }
        if let Some(max) = self.max_severity {
            settings = settings.with_max_severity(max);
        }
        settings.timeout = timeout_from_millis(self.timeout_ms);
        Ok(settings)
    }
}
