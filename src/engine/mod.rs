//! DUALLOG - Dual Log Engine
//! Two sorted-set logs read as one timeline: the prepend log (newest first)
//! is "before", the append log (oldest first) is "after". A coalesce index
//! locates any live item for removal without touching either log.

pub mod clock;
pub mod index;

use crate::error::{DualLogError, Result};
use crate::store::OrderedLogStore;
use crate::types::{LogKind, Payload, Placement, Score, ScoreBound};

use self::clock::LogicalClock;
use self::index::CoalesceIndex;

/// Both halves of a range read, each in its own meaningful order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    /// Prepend log, descending score.
    pub before: Vec<Payload>,
    /// Append log, ascending score.
    pub after: Vec<Payload>,
}

impl Timeline {
    pub fn len(&self) -> usize {
        self.before.len() + self.after.len()
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }

    /// Concatenate: prepend results first, then append results. The seam is
    /// positional, not a merge by score.
    pub fn into_payloads(self) -> Vec<Payload> {
        let mut payloads = self.before;
        payloads.extend(self.after);
        payloads
    }
}

/// Outcome of removing one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    /// Where the index said the item lived.
    pub placement: Placement,
    /// Log entries deleted at that score; exactly one when consistent.
    pub removed: u64,
}

/// The append/prepend log pair plus its coalesce index.
///
/// Insertion writes the log entry first and the index entry second. The
/// store offers no atomicity across the two calls, so a failure between
/// them leaves a log entry no identifier points at; nothing reconciles it.
///
/// Payloads double as sorted-set members, so a log holds each payload at
/// most once. Inserting a payload already live in the target log moves the
/// earlier entry to the new score; `insert` reports that as
/// `DuplicatePayload` and does not index the new identifier.
///
/// Removal follows a delete-on-remove policy: once the log entry is gone the
/// index entry is deleted too, and a second removal of the same identifier
/// is an `UnknownIdentifier` error.
///
/// `DualLog` is `Sync` whenever its store is, so inserts may run from many
/// threads at once; the clock is the only shared mutable state.
pub struct DualLog<S> {
    store: S,
    index: CoalesceIndex,
    clock: LogicalClock,
    append_key: String,
    prepend_key: String,
}

impl<S: OrderedLogStore> DualLog<S> {
    /// Dual log under `key_base_name` with a clock seeded from the wall clock.
    pub fn new(store: S, key_base_name: &str, timestamp_step: i64) -> Self {
        Self::with_clock(store, key_base_name, LogicalClock::starting_now(timestamp_step))
    }

    pub fn with_clock(store: S, key_base_name: &str, clock: LogicalClock) -> Self {
        Self {
            store,
            index: CoalesceIndex::new(key_base_name),
            clock,
            append_key: format!("{}:{}", key_base_name, LogKind::Append.name()),
            prepend_key: format!("{}:{}", key_base_name, LogKind::Prepend.name()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &LogicalClock {
        &self.clock
    }

    pub fn index(&self) -> &CoalesceIndex {
        &self.index
    }

    /// Store key of the sorted set backing `log`.
    pub fn log_key(&self, log: LogKind) -> &str {
        match log {
            LogKind::Append => &self.append_key,
            LogKind::Prepend => &self.prepend_key,
        }
    }

    /// Add `payload` under the next logical timestamp and index it by
    /// `identifier`. Returns the timestamp.
    pub fn insert(&self, identifier: &str, payload: Payload, assign_as_prepend: bool) -> Result<Score> {
        let log = if assign_as_prepend {
            LogKind::Prepend
        } else {
            LogKind::Append
        };
        let score = self.clock.next();

        let set = self.log_key(log);
        if !self.store.zadd(set, score, payload)? {
            return Err(DualLogError::DuplicatePayload {
                identifier: identifier.to_string(),
                log: set.to_string(),
            });
        }
        // Not atomic with the zadd above.
        self.index
            .record(&self.store, identifier, Placement::new(log, score))?;
        Ok(score)
    }

    /// Both logs over the inclusive window `[min, max]`, each read on its own.
    pub fn retrieve_partitioned(&self, min: ScoreBound, max: ScoreBound) -> Result<Timeline> {
        let before = self.store.zrange_desc(&self.prepend_key, min, max)?;
        let after = self.store.zrange_asc(&self.append_key, min, max)?;
        Ok(Timeline { before, after })
    }

    /// Timeline view of `[min, max]`: prepend log descending, then append log
    /// ascending.
    pub fn retrieve_range(&self, min: ScoreBound, max: ScoreBound) -> Result<Vec<Payload>> {
        Ok(self.retrieve_partitioned(min, max)?.into_payloads())
    }

    /// Remove the item indexed under `identifier`; returns how many log
    /// entries went. Anything other than exactly one is logged as a
    /// consistency warning and still returned to the caller.
    pub fn remove_by_id(&self, identifier: &str) -> Result<u64> {
        Ok(self.remove(identifier)?.removed)
    }

    /// Like [`DualLog::remove_by_id`], also reporting the placement used.
    pub fn remove(&self, identifier: &str) -> Result<Removal> {
        let placement = self.index.lookup(&self.store, identifier)?;
        let set = self.log_key(placement.log);
        let point = ScoreBound::Inclusive(placement.score);

        let removed = self.store.zrem_range(set, point, point)?;
        if removed != 1 {
            log::warn!(
                "Expected 1 item to be removed with range {} from {}, got {}",
                placement.score,
                set,
                removed
            );
        }

        self.index.forget(&self.store, identifier)?;
        Ok(Removal { placement, removed })
    }

    /// Live entries in `log`.
    pub fn count(&self, log: LogKind) -> Result<u64> {
        self.store.zcount(
            self.log_key(log),
            ScoreBound::NegInfinity,
            ScoreBound::PosInfinity,
        )
    }

    /// Live entries across both logs.
    pub fn live_count(&self) -> Result<u64> {
        Ok(self.count(LogKind::Append)? + self.count(LogKind::Prepend)?)
    }

    /// Drop both logs and every index entry. Returns the number of index
    /// entries deleted. Concurrent writers may leave keys behind.
    pub fn clear_all(&self, scan_batch_size: usize) -> Result<u64> {
        self.store
            .delete(&[self.prepend_key.clone(), self.append_key.clone()])?;
        self.index.clear(&self.store, scan_batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::HashSet;

    const ALL: (ScoreBound, ScoreBound) = (ScoreBound::NegInfinity, ScoreBound::PosInfinity);

    fn dual_log() -> DualLog<MemoryStore> {
        DualLog::with_clock(MemoryStore::new(), "t", LogicalClock::new(1_000, 10))
    }

    fn fill(log: &DualLog<MemoryStore>, n: u64, prepend_pct: u8) -> Vec<Score> {
        (0..n)
            .map(|i| {
                let prepend = LogKind::for_index(i, prepend_pct) == LogKind::Prepend;
                log.insert(&format!("id_{}", i), Payload::from(format!("p{}", i)), prepend)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_insert_assigns_distinct_scores() {
        let log = dual_log();
        let scores = fill(&log, 250, 30);
        let distinct: HashSet<_> = scores.iter().collect();
        assert_eq!(distinct.len(), 250);
        assert_eq!(scores[0], 1_000);
        assert_eq!(scores[1], 1_010);
    }

    #[test]
    fn test_insert_writes_log_and_index() {
        let log = dual_log();
        let score = log.insert("item", Payload::from("blob"), true).unwrap();

        assert_eq!(
            log.store().get("t:coalesce:item").unwrap(),
            Some(Payload::from(format!("prepend:{}", score)))
        );
        assert_eq!(
            log.store().zrange_asc("t:prepend", ALL.0, ALL.1).unwrap(),
            vec!["blob"]
        );
        assert_eq!(log.count(LogKind::Append).unwrap(), 0);
    }

    #[test]
    fn test_duplicate_payload_is_rejected() {
        let log = dual_log();
        let first = log.insert("a", Payload::from("same"), false).unwrap();

        match log.insert("b", Payload::from("same"), false) {
            Err(DualLogError::DuplicatePayload { identifier, log: set }) => {
                assert_eq!(identifier, "b");
                assert_eq!(set, "t:append");
            }
            other => panic!("expected DuplicatePayload, got {:?}", other),
        }
        assert_eq!(log.store().get("t:coalesce:b").unwrap(), None);
        assert_eq!(log.count(LogKind::Append).unwrap(), 1);
        // The earlier entry moved off its recorded score.
        let placement = log.index().lookup(log.store(), "a").unwrap();
        assert_eq!(placement.score, first);
        assert_eq!(log.remove_by_id("a").unwrap(), 0);

        // The same payload in the other log is a distinct member.
        log.insert("c", Payload::from("same"), true).unwrap();
        assert_eq!(log.count(LogKind::Prepend).unwrap(), 1);
    }

    #[test]
    fn test_ten_items_thirty_percent() {
        let log = dual_log();
        fill(&log, 10, 30);
        assert_eq!(log.count(LogKind::Prepend).unwrap(), 3);
        assert_eq!(log.count(LogKind::Append).unwrap(), 7);

        assert_eq!(log.remove_by_id("id_0").unwrap(), 1);
        assert_eq!(log.count(LogKind::Prepend).unwrap(), 2);
        assert_eq!(log.live_count().unwrap(), 9);
    }

    #[test]
    fn test_retrieve_range_timeline_order() {
        let log = dual_log();
        fill(&log, 10, 30);

        let timeline = log.retrieve_range(ALL.0, ALL.1).unwrap();
        let expected: Vec<Payload> = ["p2", "p1", "p0", "p3", "p4", "p5", "p6", "p7", "p8", "p9"]
            .iter()
            .map(|s| Payload::from(*s))
            .collect();
        assert_eq!(timeline, expected);
    }

    #[test]
    fn test_retrieve_window_counts() {
        let log = dual_log();
        let scores = fill(&log, 10, 30);

        // Items 2..=5: item 2 in prepend, 3..=5 in append.
        let window = log
            .retrieve_partitioned(
                ScoreBound::Inclusive(scores[2]),
                ScoreBound::Inclusive(scores[5]),
            )
            .unwrap();
        assert_eq!(window.before, vec!["p2"]);
        assert_eq!(window.after, vec!["p3", "p4", "p5"]);

        let tail = log
            .retrieve_range(ScoreBound::Inclusive(scores[5]), ALL.1)
            .unwrap();
        assert_eq!(tail.len(), 5);
    }

    #[test]
    fn test_removed_item_no_longer_retrieved() {
        let log = dual_log();
        fill(&log, 10, 30);

        log.remove_by_id("id_4").unwrap();
        let all = log.retrieve_range(ALL.0, ALL.1).unwrap();
        assert_eq!(all.len(), 9);
        assert!(!all.contains(&Payload::from("p4")));
    }

    #[test]
    fn test_remove_deletes_index_entry() {
        let log = dual_log();
        fill(&log, 3, 0);

        log.remove_by_id("id_1").unwrap();
        assert_eq!(log.store().get("t:coalesce:id_1").unwrap(), None);
        assert!(matches!(
            log.remove_by_id("id_1"),
            Err(DualLogError::UnknownIdentifier(_))
        ));
    }

    #[test]
    fn test_remove_with_stale_index_reports_zero() {
        let log = dual_log();
        fill(&log, 3, 0);

        // Point an identifier at a score no entry holds.
        log.index()
            .record(log.store(), "stale", Placement::new(LogKind::Append, 7))
            .unwrap();
        assert_eq!(log.remove_by_id("stale").unwrap(), 0);
        assert_eq!(log.live_count().unwrap(), 3);
        assert_eq!(log.store().get("t:coalesce:stale").unwrap(), None);
    }

    #[test]
    fn test_clear_all() {
        let log = dual_log();
        fill(&log, 120, 30);

        assert_eq!(log.clear_all(7).unwrap(), 120);
        assert_eq!(log.count(LogKind::Append).unwrap(), 0);
        assert_eq!(log.count(LogKind::Prepend).unwrap(), 0);
        assert!(log.store().is_empty().unwrap());
    }

    #[test]
    fn test_timeline_helpers() {
        let timeline = Timeline {
            before: vec![Payload::from("b")],
            after: vec![Payload::from("a")],
        };
        assert_eq!(timeline.len(), 2);
        assert!(!timeline.is_empty());
        assert!(Timeline::default().is_empty());
        assert_eq!(timeline.into_payloads(), vec!["b", "a"]);
    }
}
