//! DUALLOG - Benchmark Configuration
//! Defines tunable parameters for the dual log benchmark.

use std::path::PathBuf;

use crate::error::{DualLogError, Result};

/// Smallest payload that still holds the item index stamped at its front.
pub const MIN_BLOB_SIZE: usize = 8;

/// Characters the store's key glob treats as wildcards.
const GLOB_METACHARACTERS: &[char] = &['*', '?', '[', ']'];

/// How the insert phase dispatches its writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// One insert at a time on the driver thread.
    Sequential,
    /// Inserts are spread across `workers` threads; the phase ends on a join.
    Parallel { workers: usize },
}

/// Configuration for a benchmark run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Prefix of every key the run touches.
    pub key_base_name: String,

    /// Number of items inserted.
    pub number_of_items: u64,

    /// Percentage of each block of 100 inserts routed to the prepend log.
    pub prepend_pct: u8,

    /// Size of each random payload in bytes.
    pub blob_size: usize,

    /// Number of items removed through the coalesce index.
    pub items_to_remove: u64,

    /// Iterations of each retrieval benchmark.
    pub number_of_retrievals: u32,

    /// Distance between consecutive logical timestamps.
    pub timestamp_step: i64,

    /// Keys examined per page when enumerating the coalesce index.
    pub scan_batch_size: usize,

    /// Insert dispatch mode.
    pub insert_mode: InsertMode,

    /// Seed for payloads and removal targets. `None` draws from entropy.
    pub rng_seed: Option<u64>,

    /// Where to dump the store after the insert phase, if anywhere.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_base_name: "benchmark".to_string(),
            number_of_items: 100_000,
            prepend_pct: 30,
            blob_size: 1000,
            items_to_remove: 100,
            number_of_retrievals: 25,
            timestamp_step: 10_000,
            scan_batch_size: 1000,
            insert_mode: InsertMode::Sequential,
            rng_seed: None,
            snapshot_path: None,
        }
    }
}

impl Config {
    /// Create a new Config with a custom key prefix.
    pub fn new(key_base_name: impl Into<String>) -> Self {
        Self {
            key_base_name: key_base_name.into(),
            ..Default::default()
        }
    }

    /// Default config overlaid with `DUALLOG_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(items) = env_parse::<u64>("DUALLOG_ITEMS")? {
            config.number_of_items = items;
            config.items_to_remove = config.items_to_remove.min(items);
        }
        if let Some(pct) = env_parse::<u8>("DUALLOG_PREPEND_PCT")? {
            config.prepend_pct = pct;
        }
        if let Some(workers) = env_parse::<usize>("DUALLOG_WORKERS")? {
            config.insert_mode = InsertMode::Parallel { workers };
        }
        if let Some(seed) = env_parse::<u64>("DUALLOG_SEED")? {
            config.rng_seed = Some(seed);
        }
        if let Ok(path) = std::env::var("DUALLOG_SNAPSHOT") {
            config.snapshot_path = Some(PathBuf::from(path));
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the number of inserted items.
    pub fn with_items(mut self, items: u64) -> Self {
        self.number_of_items = items;
        self
    }

    /// Set the prepend percentage.
    pub fn with_prepend_pct(mut self, pct: u8) -> Self {
        self.prepend_pct = pct;
        self
    }

    /// Set the payload size.
    pub fn with_blob_size(mut self, size: usize) -> Self {
        self.blob_size = size;
        self
    }

    /// Set how many items the removal phase deletes.
    pub fn with_removals(mut self, removals: u64) -> Self {
        self.items_to_remove = removals;
        self
    }

    /// Set the retrieval iteration count.
    pub fn with_retrievals(mut self, retrievals: u32) -> Self {
        self.number_of_retrievals = retrievals;
        self
    }

    /// Set the index scan page size.
    pub fn with_scan_batch_size(mut self, batch: usize) -> Self {
        self.scan_batch_size = batch;
        self
    }

    /// Set the insert dispatch mode.
    pub fn with_insert_mode(mut self, mode: InsertMode) -> Self {
        self.insert_mode = mode;
        self
    }

    /// Fix the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Dump the store to `path` after inserting.
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Reject settings the benchmark cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.key_base_name.is_empty() {
            return Err(DualLogError::Config("key_base_name is empty".into()));
        }
        // The base name is spliced into the index scan pattern unescaped.
        if self.key_base_name.contains(GLOB_METACHARACTERS) {
            return Err(DualLogError::Config(format!(
                "key_base_name must not contain glob characters, got {:?}",
                self.key_base_name
            )));
        }
        if self.prepend_pct > 100 {
            return Err(DualLogError::Config(format!(
                "prepend_pct must be at most 100, got {}",
                self.prepend_pct
            )));
        }
        // Scores must never collide, so the clock has to move.
        if self.timestamp_step <= 0 {
            return Err(DualLogError::Config(format!(
                "timestamp_step must be positive, got {}",
                self.timestamp_step
            )));
        }
        // Payloads are sorted-set members; equal payloads would collapse.
        if self.blob_size < MIN_BLOB_SIZE {
            return Err(DualLogError::Config(format!(
                "blob_size must be at least {} bytes, got {}",
                MIN_BLOB_SIZE, self.blob_size
            )));
        }
        if self.items_to_remove > self.number_of_items {
            return Err(DualLogError::Config(format!(
                "cannot remove {} of {} items",
                self.items_to_remove, self.number_of_items
            )));
        }
        if self.scan_batch_size == 0 {
            return Err(DualLogError::Config("scan_batch_size must be positive".into()));
        }
        if let InsertMode::Parallel { workers: 0 } = self.insert_mode {
            return Err(DualLogError::Config("parallel mode needs at least one worker".into()));
        }
        Ok(())
    }

    /// Ensure the snapshot's parent directory exists.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        match self.snapshot_path.as_ref().and_then(|p| p.parent()) {
            Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
            _ => Ok(()),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| DualLogError::Config(format!("{} has an invalid value: {:?}", name, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.key_base_name, "benchmark");
        assert_eq!(config.number_of_items, 100_000);
        assert_eq!(config.prepend_pct, 30);
        assert_eq!(config.insert_mode, InsertMode::Sequential);
    }

    #[test]
    fn test_rejects_bad_settings() {
        assert!(Config::default().with_prepend_pct(101).validate().is_err());
        assert!(Config::default().with_items(5).with_removals(6).validate().is_err());
        assert!(Config::default().with_scan_batch_size(0).validate().is_err());
        assert!(Config::default()
            .with_insert_mode(InsertMode::Parallel { workers: 0 })
            .validate()
            .is_err());

        let mut frozen_clock = Config::default();
        frozen_clock.timestamp_step = 0;
        assert!(frozen_clock.validate().is_err());
    }

    #[test]
    fn test_rejects_payloads_too_small_to_be_unique() {
        assert!(matches!(
            Config::default().with_blob_size(0).validate(),
            Err(DualLogError::Config(_))
        ));
        assert!(Config::default().with_blob_size(MIN_BLOB_SIZE - 1).validate().is_err());
        assert!(Config::default().with_blob_size(MIN_BLOB_SIZE).validate().is_ok());
    }

    #[test]
    fn test_rejects_glob_characters_in_base_name() {
        for base in ["bench*", "b?nch", "[bench]", "*"] {
            assert!(Config::new(base).validate().is_err(), "{} accepted", base);
        }
        assert!(Config::new("bench:run-1").validate().is_ok());
    }

    #[test]
    fn test_ensure_dirs_creates_snapshot_parent() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default().with_snapshot_path(dir.path().join("nested/store.snap"));
        config.ensure_dirs().unwrap();
        assert!(dir.path().join("nested").is_dir());
    }
}
