use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::metrics::ConstraintMetrics;
use crate::types::{Result, SombraError};

/// Configuration options supplied when opening a [`super::Graph`].
#[derive(Clone, Default)]
pub struct KernelOptions {
    /// How long a writer waits for an index-entry lock; `None` waits indefinitely,
    /// so writers that lock values in opposite order deadlock
    pub lock_wait_timeout: Option<Duration>,
    /// Whether indexes created by a transaction are populated when it commits
    pub defer_population: bool,
    /// Optional metrics collection implementation
    pub metrics: Option<Arc<dyn ConstraintMetrics>>,
}

impl KernelOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the index-entry lock wait timeout.
    pub fn lock_wait_timeout(mut self, timeout: Duration) -> Self {
        self.lock_wait_timeout = Some(timeout);
        self
    }

    /// Leaves newly created indexes in `Populating` after commit until
    /// [`super::Graph::populate_index`] runs.
    pub fn defer_population(mut self, defer: bool) -> Self {
        self.defer_population = defer;
        self
    }

    /// Sets the metrics collection implementation.
    pub fn metrics(mut self, metrics: Arc<dyn ConstraintMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Parses options from a TOML document.
    ///
    /// ```toml
    /// [locks]
    /// wait_timeout_ms = 500
    ///
    /// [index]
    /// defer_population = false
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let raw: RawOptions =
            toml::from_str(text).map_err(|err| SombraError::Config(err.to_string()))?;
        let mut opts = Self::new();
        if let Some(ms) = raw.locks.wait_timeout_ms {
            opts = opts.lock_wait_timeout(Duration::from_millis(ms));
        }
        if let Some(defer) = raw.index.defer_population {
            opts = opts.defer_population(defer);
        }
        Ok(opts)
    }

    /// Reads and parses a TOML options file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOptions {
    #[serde(default)]
    locks: RawLocks,
    #[serde(default)]
    index: RawIndex,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLocks {
    wait_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawIndex {
    defer_population: Option<bool>,
}
