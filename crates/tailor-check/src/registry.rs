//! Rule registry: the open set of rules known to the engine, in
//! registration order.

use crate::diagnostic::Severity;
use crate::engine::ENGINE_RULES;
use crate::rule::Rule;
use crate::rules;
use crate::settings::Limits;

/// Builds a fresh rule instance for one file.
pub type RuleFactory = Box<dyn Fn(&Limits) -> Box<dyn Rule> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleInfo {
    pub id: &'static str,
    pub description: &'static str,
    pub default_severity: Severity,
}

pub(crate) struct Registered {
    pub(crate) info: RuleInfo,
    pub(crate) factory: RuleFactory,
}

#[derive(Default)]
pub struct Registry {
    rules: Vec<Registered>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in rule.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        rules::register_builtin(&mut registry);
        registry
    }

    /// Add a rule. Registering an id twice replaces the earlier factory
    /// but keeps its position.
    pub fn register<F>(
        &mut self,
        id: &'static str,
        description: &'static str,
        default_severity: Severity,
        factory: F,
    ) where
        F: Fn(&Limits) -> Box<dyn Rule> + Send + Sync + 'static,
    {
        debug_assert!(
            !ENGINE_RULES.contains(&id),
            "rule id `{}` is reserved for the engine",
            id
        );
        let entry = Registered {
            info: RuleInfo {
                id,
                description,
                default_severity,
            },
            factory: Box::new(factory),
        };
        match self.rules.iter_mut().find(|r| r.info.id == id) {
            Some(existing) => *existing = entry,
            None => self.rules.push(entry),
        }
    }

    pub fn get(&self, id: &str) -> Option<&RuleInfo> {
        self.rules.iter().map(|r| &r.info).find(|info| info.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn infos(&self) -> impl Iterator<Item = &RuleInfo> {
        self.rules.iter().map(|r| &r.info)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub(crate) fn entries(&self) -> &[Registered] {
        &self.rules
    }
}
