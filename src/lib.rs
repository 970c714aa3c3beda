//! DUALLOG - Append/Prepend Ordered Log Benchmark
//!
//! Benchmarks a dual ordered log built on a key-value + sorted-set store:
//! insertion, full-range retrieval, windowed retrieval, removal through a
//! secondary index, and bulk teardown.
//!
//! ## Components
//! - **Store**: the `OrderedLogStore` trait plus an in-process `MemoryStore`
//!   with snapshots and round-trip metrics
//! - **Logical Clock**: one atomic, strictly increasing score generator
//!   shared by both logs
//! - **Dual Log**: an append log (ascending) and a prepend log (descending)
//!   read as one timeline
//! - **Coalesce Index**: identifier -> `"<log>:<score>"` so any item can be
//!   removed with a single lookup
//! - **Benchmark Driver**: times each phase, sequentially or with parallel
//!   inserts, and returns a structured report
//!
//! ## Example
//! ```
//! use duallog::{bench::BenchmarkDriver, config::Config, store::MemoryStore};
//!
//! let config = Config::default().with_items(1_000).with_removals(10);
//! let mut driver = BenchmarkDriver::new(MemoryStore::new(), config).unwrap();
//! let report = driver.run().unwrap();
//! assert!(report.warnings.is_empty());
//! ```

pub mod bench;
pub mod config;
pub mod engine;
pub mod error;
pub mod store;
pub mod types;
