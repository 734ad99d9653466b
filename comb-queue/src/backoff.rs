//! Retry backoff strategies.
//!
//! A job only records the strategy name and base delay. The registry here
//! answers whether a name is known and lets a retry scheduler resolve the
//! next delay. New strategies are registered on the queue's registry.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Backoff settings stored in the job options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Backoff {
    /// Strategy name
    pub strategy: String,
    /// Delay in milliseconds
    pub delay: u64,
}

impl Backoff {
    /// Create backoff settings.
    pub fn new(strategy: impl Into<String>, delay: u64) -> Self {
        Self {
            strategy: strategy.into(),
            delay,
        }
    }
}

/// Computes the delay before the next retry.
pub trait BackoffStrategy: Send + Sync {
    /// Return the delay in milliseconds, updating `backoff` for the following
    /// retry if the strategy is stateful.
    fn next_delay(&self, backoff: &mut Backoff) -> u64;
}

impl<F> BackoffStrategy for F
where
    F: Fn(&mut Backoff) -> u64 + Send + Sync,
{
    fn next_delay(&self, backoff: &mut Backoff) -> u64 {
        self(backoff)
    }
}

/// Retry immediately.
pub struct Immediate;

impl BackoffStrategy for Immediate {
    fn next_delay(&self, _backoff: &mut Backoff) -> u64 {
        0
    }
}

/// Wait the configured delay every time.
pub struct Fixed;

impl BackoffStrategy for Fixed {
    fn next_delay(&self, backoff: &mut Backoff) -> u64 {
        backoff.delay
    }
}

/// Wait the configured delay, then double it for the next retry.
pub struct Exponential;

impl BackoffStrategy for Exponential {
    fn next_delay(&self, backoff: &mut Backoff) -> u64 {
        let delay = backoff.delay;
        backoff.delay = delay.saturating_mul(2);
        delay
    }
}

/// Named set of backoff strategies.
#[derive(Clone)]
pub struct BackoffStrategies {
    strategies: HashMap<String, Arc<dyn BackoffStrategy>>,
}

impl Default for BackoffStrategies {
    fn default() -> Self {
        Self::new()
            .with("immediate", Immediate)
            .with("fixed", Fixed)
            .with("exponential", Exponential)
    }
}

impl BackoffStrategies {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Add a strategy, returning the registry.
    pub fn with(mut self, name: impl Into<String>, strategy: impl BackoffStrategy + 'static) -> Self {
        self.register(name, strategy);
        self
    }

    /// Add or replace a strategy.
    pub fn register(&mut self, name: impl Into<String>, strategy: impl BackoffStrategy + 'static) {
        self.strategies.insert(name.into(), Arc::new(strategy));
    }

    /// Whether a strategy is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    /// Registered strategy names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve the next retry delay. `None` if the strategy is unknown.
    pub fn compute(&self, backoff: &mut Backoff) -> Option<u64> {
        let strategy = self.strategies.get(&backoff.strategy)?;
        Some(strategy.next_delay(backoff))
    }
}

impl fmt::Debug for BackoffStrategies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackoffStrategies")
            .field("strategies", &self.names())
            .finish()
    }
}
