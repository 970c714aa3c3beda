//! DUALLOG - Benchmark Results
//! Structured timings returned by the driver; printing is left to callers.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::types::{LogKind, Score};

/// The measured operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operation {
    Insert,
    RetrieveAll,
    RetrieveWindow,
    RemoveById,
    Teardown,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::RetrieveAll => "retrieve_all",
            Operation::RetrieveWindow => "retrieve_window",
            Operation::RemoveById => "remove_by_id",
            Operation::Teardown => "teardown",
        }
    }
}

/// Timing of one benchmark phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationReport {
    pub operation: Operation,
    /// Items the phase worked over.
    pub item_count: u64,
    /// Units the average is taken over (items, or retrieval iterations).
    pub iterations: u64,
    pub elapsed: Duration,
    pub average: Duration,
}

impl OperationReport {
    pub fn new(operation: Operation, item_count: u64, iterations: u64, elapsed: Duration) -> Self {
        let average = match u32::try_from(iterations) {
            Ok(0) => Duration::ZERO,
            Ok(n) => elapsed / n,
            Err(_) => Duration::from_secs_f64(elapsed.as_secs_f64() / iterations as f64),
        };
        Self {
            operation,
            item_count,
            iterations,
            elapsed,
            average,
        }
    }
}

impl fmt::Display for OperationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<16} {:>8} items  {:>6} iterations  took {:?}, average {:?}",
            self.operation.name(),
            self.item_count,
            self.iterations,
            self.elapsed,
            self.average
        )
    }
}

/// A postcondition that failed without failing the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ConsistencyWarning {
    /// A removal by identifier deleted `removed` entries instead of one.
    RemovalCount {
        identifier: String,
        log: LogKind,
        score: Score,
        removed: u64,
    },
    /// Live entries after the removal phase differ from `items - removed`.
    LiveCount {
        expected: u64,
        append: u64,
        prepend: u64,
    },
}

impl fmt::Display for ConsistencyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyWarning::RemovalCount {
                identifier,
                log,
                score,
                removed,
            } => write!(
                f,
                "removing {} expected 1 entry at {} in the {} log, removed {}",
                identifier, score, log, removed
            ),
            ConsistencyWarning::LiveCount {
                expected,
                append,
                prepend,
            } => write!(
                f,
                "expected {} items to be left, got {} ({} append and {} prepend)",
                expected,
                append + prepend,
                append,
                prepend
            ),
        }
    }
}

/// Everything one run measured.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub operations: Vec<OperationReport>,
    pub warnings: Vec<ConsistencyWarning>,
}

impl BenchmarkReport {
    pub fn operation(&self, operation: Operation) -> Option<&OperationReport> {
        self.operations.iter().find(|r| r.operation == operation)
    }
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.operations {
            writeln!(f, "{}", report)?;
        }
        for warning in &self.warnings {
            writeln!(f, "WARN: {}", warning)?;
        }
        Ok(())
    }
}
