//! DUALLOG - Ordered Log Store
//! The key-value + sorted-set collaborator the dual log is built on.
//!
//! Every call is treated as an independent round trip: nothing is atomic
//! across calls, and a failing call surfaces as `DualLogError::Store`.

pub mod memory;
pub mod metrics;
pub mod snapshot;

use crate::error::Result;
use crate::types::{Payload, Score, ScoreBound};

pub use self::memory::MemoryStore;
pub use self::metrics::StoreMetrics;

/// Position of a paginated key scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanCursor {
    /// First page.
    Start,
    /// Resume after this key.
    After(String),
    /// The scan has visited every key.
    Done,
}

impl ScanCursor {
    pub fn is_done(&self) -> bool {
        matches!(self, ScanCursor::Done)
    }
}

/// Operations the dual log needs from its backing store.
pub trait OrderedLogStore: Send + Sync {
    /// Insert `member` at `score`, or move it there if it already exists.
    /// Returns true if the member is new.
    fn zadd(&self, set: &str, score: Score, member: Payload) -> Result<bool>;

    /// Members with `min <= score <= max`, ascending.
    fn zrange_asc(&self, set: &str, min: ScoreBound, max: ScoreBound) -> Result<Vec<Payload>>;

    /// Members with `min <= score <= max`, descending.
    fn zrange_desc(&self, set: &str, min: ScoreBound, max: ScoreBound) -> Result<Vec<Payload>>;

    /// Remove members with `min <= score <= max`; returns how many went.
    fn zrem_range(&self, set: &str, min: ScoreBound, max: ScoreBound) -> Result<u64>;

    /// Count members with `min <= score <= max`.
    fn zcount(&self, set: &str, min: ScoreBound, max: ScoreBound) -> Result<u64>;

    fn get(&self, key: &str) -> Result<Option<Payload>>;

    fn set(&self, key: &str, value: Payload) -> Result<()>;

    /// Push onto the head of a list; returns the new length.
    fn push_left(&self, key: &str, value: Payload) -> Result<u64>;

    /// Push onto the tail of a list; returns the new length.
    fn push_right(&self, key: &str, value: Payload) -> Result<u64>;

    /// One page of keys matching the glob `pattern`. At most `batch_size`
    /// keys are examined, so a page can be empty before the scan is done.
    fn scan(
        &self,
        cursor: &ScanCursor,
        pattern: &str,
        batch_size: usize,
    ) -> Result<(Vec<String>, ScanCursor)>;

    /// Delete keys of any type; returns how many existed.
    fn delete(&self, keys: &[String]) -> Result<u64>;

    /// Drop everything.
    fn flush_namespace(&self) -> Result<()>;
}

/// Glob match supporting `*` (any run) and `?` (any single char).
pub fn glob_match(pattern: &str, candidate: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();

    let (mut p, mut c) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while c < candidate.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == candidate[c]) {
            p += 1;
            c += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, c));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            c = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&ch| ch == '*')
}
