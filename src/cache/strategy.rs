//! Strategy Table Module
//!
//! Ordered registry mapping resource-class matchers to caching strategies.
//! Dispatch is deterministic: the first registered strategy whose matcher
//! accepts a key wins, so more specific strategies must be registered first.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

// == Strategy Mode ==
/// How a resource class is read from cache versus network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyMode {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
    NetworkOnly,
    CacheOnly,
}

impl StrategyMode {
    /// Returns true if the mode ever reads or writes its bucket.
    pub fn uses_cache(&self) -> bool {
        !matches!(self, StrategyMode::NetworkOnly)
    }
}

// == Priority ==
/// Relative value of a resource class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

// == Matcher ==
/// Predicate over a resource key.
#[derive(Clone)]
pub enum Matcher {
    /// Key starts with the prefix
    Prefix(String),
    /// Key (ignoring query string) ends with one of the suffixes
    Suffix(Vec<String>),
    /// Key contains the fragment
    Contains(String),
    /// Key equals the string
    Exact(String),
    /// Matches every key
    Any,
    /// Arbitrary predicate
    Custom(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl Matcher {
    /// Returns true if the matcher accepts `key`.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Matcher::Prefix(prefix) => key.starts_with(prefix.as_str()),
            Matcher::Suffix(suffixes) => {
                let path = key.split(['?', '#']).next().unwrap_or(key);
                suffixes.iter().any(|s| path.ends_with(s.as_str()))
            }
            Matcher::Contains(fragment) => key.contains(fragment.as_str()),
            Matcher::Exact(exact) => key == exact,
            Matcher::Any => true,
            Matcher::Custom(predicate) => predicate(key),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Prefix(p) => f.debug_tuple("Prefix").field(p).finish(),
            Matcher::Suffix(s) => f.debug_tuple("Suffix").field(s).finish(),
            Matcher::Contains(c) => f.debug_tuple("Contains").field(c).finish(),
            Matcher::Exact(e) => f.debug_tuple("Exact").field(e).finish(),
            Matcher::Any => f.write_str("Any"),
            Matcher::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

// == Cache Strategy ==
/// Immutable configuration of one resource class.
#[derive(Debug, Clone)]
pub struct CacheStrategy {
    pub name: String,
    pub matcher: Matcher,
    pub mode: StrategyMode,
    pub max_age: Duration,
    pub max_items: usize,
    pub priority: Priority,
}

impl CacheStrategy {
    /// Creates a strategy.
    pub fn new(
        name: impl Into<String>,
        matcher: Matcher,
        mode: StrategyMode,
        max_age: Duration,
        max_items: usize,
        priority: Priority,
    ) -> Self {
        Self {
            name: name.into(),
            matcher,
            mode,
            max_age,
            max_items,
            priority,
        }
    }

    /// Max age in milliseconds, saturating.
    pub fn max_age_ms(&self) -> u64 {
        u64::try_from(self.max_age.as_millis()).unwrap_or(u64::MAX)
    }
}

// == Serializable Spec ==
/// Matcher as written in a strategy file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum MatcherSpec {
    Prefix(String),
    Suffix(Vec<String>),
    Contains(String),
    Exact(String),
    Any,
}

impl From<MatcherSpec> for Matcher {
    fn from(spec: MatcherSpec) -> Self {
        match spec {
            MatcherSpec::Prefix(p) => Matcher::Prefix(p),
            MatcherSpec::Suffix(s) => Matcher::Suffix(s),
            MatcherSpec::Contains(c) => Matcher::Contains(c),
            MatcherSpec::Exact(e) => Matcher::Exact(e),
            MatcherSpec::Any => Matcher::Any,
        }
    }
}

/// One strategy as written in a strategy file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySpec {
    pub name: String,
    #[serde(rename = "match")]
    pub matcher: MatcherSpec,
    pub mode: StrategyMode,
    pub max_age_secs: u64,
    pub max_items: usize,
    #[serde(default = "default_priority")]
    pub priority: Priority,
}

fn default_priority() -> Priority {
    Priority::Medium
}

impl From<StrategySpec> for CacheStrategy {
    fn from(spec: StrategySpec) -> Self {
        CacheStrategy::new(
            spec.name,
            spec.matcher.into(),
            spec.mode,
            Duration::from_secs(spec.max_age_secs),
            spec.max_items,
            spec.priority,
        )
    }
}

// == Strategy Table ==
/// Registration-ordered list of strategies with unique names.
#[derive(Debug, Clone, Default)]
pub struct StrategyTable {
    strategies: Vec<CacheStrategy>,
}

impl StrategyTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a strategy after all existing ones.
    ///
    /// Fails on duplicate names or `max_items == 0`.
    pub fn register(&mut self, strategy: CacheStrategy) -> Result<()> {
        if strategy.name.is_empty() {
            return Err(CacheError::InvalidConfig(
                "strategy name must not be empty".to_string(),
            ));
        }
        if strategy.max_items == 0 {
            return Err(CacheError::InvalidConfig(format!(
                "strategy {} must allow at least one item",
                strategy.name
            )));
        }
        if self.get(&strategy.name).is_some() {
            return Err(CacheError::InvalidConfig(format!(
                "duplicate strategy name: {}",
                strategy.name
            )));
        }
        self.strategies.push(strategy);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, strategy: CacheStrategy) -> Result<Self> {
        self.register(strategy)?;
        Ok(self)
    }

    /// Builds a table from serialized specs, preserving their order.
    pub fn from_specs(specs: Vec<StrategySpec>) -> Result<Self> {
        let mut table = Self::new();
        for spec in specs {
            table.register(spec.into())?;
        }
        Ok(table)
    }

    /// Parses a JSON array of strategy specs.
    pub fn from_json(json: &str) -> Result<Self> {
        let specs: Vec<StrategySpec> = serde_json::from_str(json)
            .map_err(|e| CacheError::InvalidConfig(format!("strategy file: {}", e)))?;
        Self::from_specs(specs)
    }

    /// Returns the first registered strategy matching `key`.
    pub fn match_key(&self, key: &str) -> Option<&CacheStrategy> {
        self.strategies.iter().find(|s| s.matcher.matches(key))
    }

    /// Looks up a strategy by name.
    pub fn get(&self, name: &str) -> Option<&CacheStrategy> {
        self.strategies.iter().find(|s| s.name == name)
    }

    /// Iterates strategies in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &CacheStrategy> {
        self.strategies.iter()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    // == Default Table ==
    /// Built-in table for a typical web application, most specific first.
    pub fn default_web() -> Self {
        const DAY: u64 = 24 * 60 * 60;
        let strategies = vec![
            CacheStrategy::new(
                "app-shell",
                Matcher::Suffix(vec![".js".into(), ".css".into(), ".wasm".into()]),
                StrategyMode::CacheFirst,
                Duration::from_secs(7 * DAY),
                100,
                Priority::Critical,
            ),
            CacheStrategy::new(
                "fonts",
                Matcher::Suffix(vec![".woff".into(), ".woff2".into(), ".ttf".into()]),
                StrategyMode::CacheFirst,
                Duration::from_secs(365 * DAY),
                30,
                Priority::High,
            ),
            CacheStrategy::new(
                "images",
                Matcher::Suffix(vec![
                    ".png".into(),
                    ".jpg".into(),
                    ".jpeg".into(),
                    ".gif".into(),
                    ".webp".into(),
                    ".svg".into(),
                ]),
                StrategyMode::CacheFirst,
                Duration::from_secs(30 * DAY),
                200,
                Priority::Medium,
            ),
            CacheStrategy::new(
                "api",
                Matcher::Prefix("/api/".into()),
                StrategyMode::NetworkFirst,
                Duration::from_secs(5 * 60),
                50,
                Priority::Low,
            ),
            CacheStrategy::new(
                "documents",
                Matcher::Any,
                StrategyMode::StaleWhileRevalidate,
                Duration::from_secs(DAY),
                50,
                Priority::High,
            ),
        ];

        Self { strategies }
    }
}
