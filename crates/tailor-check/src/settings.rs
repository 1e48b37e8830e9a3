//! Resolved per-run settings: which rules run, at what severity, and the
//! numeric limits of the length rules.

use crate::diagnostic::Severity;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Maximum lengths for the `max-*-length` rules. `0` disables a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    /// Characters per line
    pub line: usize,
    /// Lines per file
    pub file: usize,
    /// Characters per declared name
    pub name: usize,
    /// Lines per function or initializer
    pub function: usize,
    /// Lines per closure
    pub closure: usize,
    /// Lines per class
    pub class: usize,
    /// Lines per struct
    #[serde(rename = "struct")]
    pub struct_: usize,
}

impl Limits {
    pub const DEFAULT_LINE: usize = 120;

    /// Every check disabled.
    pub fn none() -> Self {
        Self {
            line: 0,
            file: 0,
            name: 0,
            function: 0,
            closure: 0,
            class: 0,
            struct_: 0,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            line: Self::DEFAULT_LINE,
            ..Self::none()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// When non-empty, only these rules run.
    pub only: BTreeSet<String>,
    pub disabled: BTreeSet<String>,
    pub severities: BTreeMap<String, Severity>,
    /// Upper bound applied to rule diagnostics after overrides.
    pub max_severity: Severity,
    pub limits: Limits,
    pub timeout: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            only: BTreeSet::new(),
            disabled: BTreeSet::new(),
            severities: BTreeMap::new(),
            max_severity: Severity::Error,
            limits: Limits::default(),
            timeout: None,
        }
    }
}

impl Settings {
    pub fn only<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn disable(mut self, id: impl Into<String>) -> Self {
        self.disabled.insert(id.into());
        self
    }

    pub fn with_severity(mut self, id: impl Into<String>, severity: Severity) -> Self {
        self.severities.insert(id.into(), severity);
        self
    }

    pub fn with_max_severity(mut self, severity: Severity) -> Self {
        self.max_severity = severity;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        (self.only.is_empty() || self.only.contains(id)) && !self.disabled.contains(id)
    }

    /// Effective severity: the override if any, else the default, capped
    /// at `max_severity`.
    pub fn severity_for(&self, id: &str, default: Severity) -> Severity {
        self.severities
            .get(id)
            .copied()
            .unwrap_or(default)
            .min(self.max_severity)
    }
}
