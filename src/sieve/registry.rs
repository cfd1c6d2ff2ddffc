/// Grammar rule registry.
///
/// Rules are grouped by category (`action`, `test`, `whitespace`, ...).
/// Within a category rules are probed in registration order and the first
/// matcher that accepts the input wins, so registration order is the
/// documented tie-break between overlapping rules.
use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::config::EngineConfig;
use crate::sieve::ast::{Context, Node};
use crate::sieve::error::{Error, Result};
use crate::sieve::rules;

/// Cheap prefix test. Must not panic on malformed input.
pub type Matcher = fn(&str) -> bool;

/// Builds a node with its default content.
pub type Factory = fn(&mut Context<'_>) -> Box<dyn Node>;

#[derive(Debug, Clone)]
struct Rule {
    name: String,
    matcher: Matcher,
    factory: Factory,
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    categories: BTreeMap<String, Vec<Rule>>,
}

static GLOBAL: Lazy<Arc<Registry>> = Lazy::new(|| Arc::new(Registry::with_defaults()));

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in grammar with every extension enabled.
    pub fn with_defaults() -> Self {
        match Self::from_config(&EngineConfig::default()) {
            Ok(registry) => registry,
            Err(err) => unreachable!("built-in grammar is inconsistent: {err}"),
        }
    }

    /// The built-in grammar minus the extensions the config disables.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let mut registry = Self::empty();
        rules::register(&mut registry, config)?;
        Ok(registry)
    }

    /// Process-wide default instance.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    pub fn register(
        &mut self,
        category: &str,
        name: &str,
        matcher: Matcher,
        factory: Factory,
    ) -> Result<()> {
        let rules = self.categories.entry(category.to_string()).or_default();
        if rules.iter().any(|r| r.name == name) {
            return Err(Error::DuplicateRule {
                category: category.to_string(),
                name: name.to_string(),
            });
        }
        tracing::debug!(category, name, "registered grammar rule");
        rules.push(Rule {
            name: name.to_string(),
            matcher,
            factory,
        });
        Ok(())
    }

    /// Name of the first rule in `category` whose matcher accepts `input`.
    pub fn probe(&self, category: &str, input: &str) -> Option<&str> {
        let found = self
            .categories
            .get(category)?
            .iter()
            .find(|rule| (rule.matcher)(input))
            .map(|rule| rule.name.as_str());
        tracing::trace!(category, ?found, "probe");
        found
    }

    pub fn create(&self, category: &str, name: &str, cx: &mut Context<'_>) -> Result<Box<dyn Node>> {
        let rule = self
            .categories
            .get(category)
            .and_then(|rules| rules.iter().find(|r| r.name == name))
            .ok_or_else(|| Error::UnknownRule {
                category: category.to_string(),
                name: name.to_string(),
            })?;
        Ok((rule.factory)(cx))
    }

    pub fn contains(&self, category: &str, name: &str) -> bool {
        self.categories
            .get(category)
            .is_some_and(|rules| rules.iter().any(|r| r.name == name))
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Rule names of `category` in probe order.
    pub fn rules(&self, category: &str) -> impl Iterator<Item = &str> {
        self.categories
            .get(category)
            .into_iter()
            .flatten()
            .map(|r| r.name.as_str())
    }
}
