//! DUALLOG - In-Memory Store
//! A single-process backend for [`OrderedLogStore`] holding one keyspace of
//! typed values behind an `RwLock`.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::ops::Bound;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;

use crate::error::{DualLogError, Result};
use crate::types::{Payload, Score, ScoreBound};

use super::metrics::StoreMetrics;
use super::snapshot::{self, SnapshotEntry, SnapshotValue};
use super::{glob_match, OrderedLogStore, ScanCursor};

/// A sorted set laid out like Redis': a member -> score map for point
/// lookups next to a `(score, member)` ordered set for range walks.
#[derive(Debug, Default, Clone)]
pub struct SortedSet {
    scores: HashMap<Payload, Score>,
    ordered: BTreeSet<(Score, Payload)>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Returns true if `member` was not present before.
    pub fn insert(&mut self, score: Score, member: Payload) -> bool {
        match self.scores.insert(member.clone(), score) {
            Some(old) => {
                self.ordered.remove(&(old, member.clone()));
                self.ordered.insert((score, member));
                false
            }
            None => {
                self.ordered.insert((score, member));
                true
            }
        }
    }

    /// Entries with `min <= score <= max` in ascending order.
    pub fn range_asc(
        &self,
        min: ScoreBound,
        max: ScoreBound,
    ) -> impl Iterator<Item = &(Score, Payload)> + '_ {
        let lower = match min {
            ScoreBound::NegInfinity => Bound::Unbounded,
            ScoreBound::Inclusive(s) => Bound::Included((s, Bytes::new())),
            ScoreBound::PosInfinity => Bound::Excluded((Score::MAX, Bytes::new())),
        };
        let empty = matches!(min, ScoreBound::PosInfinity);
        self.ordered
            .range((lower, Bound::Unbounded))
            .filter(move |_| !empty)
            .take_while(move |(score, _)| max.admits_from_above(*score))
    }

    /// Entries with `min <= score <= max` in descending order.
    pub fn range_desc(
        &self,
        min: ScoreBound,
        max: ScoreBound,
    ) -> impl Iterator<Item = &(Score, Payload)> + '_ {
        // The empty member sorts first, so `(s + 1, "")` bounds every member at `s`.
        let upper = match max {
            ScoreBound::Inclusive(s) if s < Score::MAX => Bound::Excluded((s + 1, Bytes::new())),
            ScoreBound::NegInfinity => Bound::Excluded((Score::MIN, Bytes::new())),
            _ => Bound::Unbounded,
        };
        let empty = matches!(max, ScoreBound::NegInfinity);
        self.ordered
            .range((Bound::Unbounded, upper))
            .rev()
            .filter(move |_| !empty)
            .take_while(move |(score, _)| min.admits_from_below(*score))
    }

    /// Remove every entry in the window; returns how many went.
    pub fn remove_range(&mut self, min: ScoreBound, max: ScoreBound) -> u64 {
        let doomed: Vec<(Score, Payload)> = self.range_asc(min, max).cloned().collect();
        for entry in &doomed {
            self.ordered.remove(entry);
            self.scores.remove(&entry.1);
        }
        doomed.len() as u64
    }

    fn entries(&self) -> impl Iterator<Item = &(Score, Payload)> + '_ {
        self.ordered.iter()
    }
}

/// A typed value in the keyspace.
#[derive(Debug, Clone)]
enum Value {
    Str(Payload),
    Sorted(SortedSet),
    List(VecDeque<Payload>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Sorted(_) => "zset",
            Value::List(_) => "list",
        }
    }
}

fn wrong_type(key: &str, found: &Value, wanted: &str) -> DualLogError {
    DualLogError::WrongType(format!(
        "{} holds a {}, expected a {}",
        key,
        found.type_name(),
        wanted
    ))
}

/// In-process [`OrderedLogStore`].
///
/// ## Example
/// ```
/// use duallog::store::{MemoryStore, OrderedLogStore};
/// use duallog::types::ScoreBound;
///
/// let store = MemoryStore::new();
/// store.zadd("log", 10, "a".into()).unwrap();
/// store.zadd("log", 20, "b".into()).unwrap();
/// let all = store
///     .zrange_desc("log", ScoreBound::NegInfinity, ScoreBound::PosInfinity)
///     .unwrap();
/// assert_eq!(all, vec!["b", "a"]);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    keyspace: RwLock<BTreeMap<String, Value>>,
    metrics: StoreMetrics,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Round-trip counters.
    pub fn metrics(&self) -> &StoreMetrics {
        &self.metrics
    }

    /// Number of keys of any type.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    /// Returns true if no keys exist.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Value>>> {
        self.keyspace
            .read()
            .map_err(|_| DualLogError::Store("keyspace lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Value>>> {
        self.keyspace
            .write()
            .map_err(|_| DualLogError::Store("keyspace lock poisoned".into()))
    }

    fn with_sorted<R>(&self, set: &str, f: impl FnOnce(&SortedSet) -> R) -> Result<Option<R>> {
        let keyspace = self.read()?;
        match keyspace.get(set) {
            Some(Value::Sorted(zset)) => Ok(Some(f(zset))),
            Some(other) => Err(wrong_type(set, other, "zset")),
            None => Ok(None),
        }
    }

    fn push(&self, key: &str, value: Payload, front: bool) -> Result<u64> {
        self.metrics.record_push(key.len(), value.len());
        let mut keyspace = self.write()?;
        let entry = keyspace
            .entry(key.to_string())
            .or_insert_with(|| Value::List(VecDeque::new()));
        match entry {
            Value::List(list) => {
                if front {
                    list.push_front(value);
                } else {
                    list.push_back(value);
                }
                Ok(list.len() as u64)
            }
            other => Err(wrong_type(key, other, "list")),
        }
    }

    /// Items of the list at `key`, head first.
    pub fn list_items(&self, key: &str) -> Result<Vec<Payload>> {
        let keyspace = self.read()?;
        match keyspace.get(key) {
            Some(Value::List(list)) => Ok(list.iter().cloned().collect()),
            Some(other) => Err(wrong_type(key, other, "list")),
            None => Ok(Vec::new()),
        }
    }

    /// Write the whole keyspace to `path`.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let entries: Vec<SnapshotEntry> = {
            let keyspace = self.read()?;
            keyspace
                .iter()
                .map(|(key, value)| SnapshotEntry {
                    key: key.clone(),
                    value: match value {
                        Value::Str(v) => SnapshotValue::Str(v.to_vec()),
                        Value::Sorted(zset) => SnapshotValue::Sorted(
                            zset.entries().map(|(s, m)| (*s, m.to_vec())).collect(),
                        ),
                        Value::List(list) => {
                            SnapshotValue::List(list.iter().map(|v| v.to_vec()).collect())
                        }
                    },
                })
                .collect()
        };

        snapshot::write_file(path.as_ref(), &entries)?;
        log::info!(
            "Store snapshot written to {:?} ({} keys)",
            path.as_ref(),
            entries.len()
        );
        Ok(())
    }

    /// Build a store from a snapshot written by [`MemoryStore::save_snapshot`].
    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Self> {
        let entries = snapshot::read_file(path.as_ref())?;
        let mut keyspace = BTreeMap::new();
        for SnapshotEntry { key, value } in entries {
            let value = match value {
                SnapshotValue::Str(v) => Value::Str(Bytes::from(v)),
                SnapshotValue::Sorted(members) => {
                    let mut zset = SortedSet::new();
                    for (score, member) in members {
                        zset.insert(score, Bytes::from(member));
                    }
                    Value::Sorted(zset)
                }
                SnapshotValue::List(items) => {
                    Value::List(items.into_iter().map(Bytes::from).collect())
                }
            };
            keyspace.insert(key, value);
        }

        log::info!(
            "Store restored from {:?} ({} keys)",
            path.as_ref(),
            keyspace.len()
        );
        Ok(Self {
            keyspace: RwLock::new(keyspace),
            metrics: StoreMetrics::new(),
        })
    }
}

impl OrderedLogStore for MemoryStore {
    fn zadd(&self, set: &str, score: Score, member: Payload) -> Result<bool> {
        self.metrics.record_zadd(set.len(), member.len());
        let mut keyspace = self.write()?;
        let entry = keyspace
            .entry(set.to_string())
            .or_insert_with(|| Value::Sorted(SortedSet::new()));
        match entry {
            Value::Sorted(zset) => Ok(zset.insert(score, member)),
            other => Err(wrong_type(set, other, "zset")),
        }
    }

    fn zrange_asc(&self, set: &str, min: ScoreBound, max: ScoreBound) -> Result<Vec<Payload>> {
        self.metrics.record_range_read();
        let members: Option<Vec<Payload>> = self.with_sorted(set, |zset| {
            zset.range_asc(min, max).map(|(_, m)| m.clone()).collect()
        })?;
        Ok(members.unwrap_or_default())
    }

    fn zrange_desc(&self, set: &str, min: ScoreBound, max: ScoreBound) -> Result<Vec<Payload>> {
        self.metrics.record_range_read();
        let members: Option<Vec<Payload>> = self.with_sorted(set, |zset| {
            zset.range_desc(min, max).map(|(_, m)| m.clone()).collect()
        })?;
        Ok(members.unwrap_or_default())
    }

    fn zrem_range(&self, set: &str, min: ScoreBound, max: ScoreBound) -> Result<u64> {
        self.metrics.record_range_removal();
        let mut keyspace = self.write()?;
        let (removed, now_empty) = match keyspace.get_mut(set) {
            Some(Value::Sorted(zset)) => (zset.remove_range(min, max), zset.is_empty()),
            Some(other) => return Err(wrong_type(set, other, "zset")),
            None => return Ok(0),
        };
        if now_empty {
            keyspace.remove(set);
        }
        Ok(removed)
    }

    fn zcount(&self, set: &str, min: ScoreBound, max: ScoreBound) -> Result<u64> {
        self.metrics.record_range_read();
        let count = self.with_sorted(set, |zset| zset.range_asc(min, max).count() as u64)?;
        Ok(count.unwrap_or(0))
    }

    fn get(&self, key: &str) -> Result<Option<Payload>> {
        self.metrics.record_get();
        let keyspace = self.read()?;
        match keyspace.get(key) {
            Some(Value::Str(v)) => Ok(Some(v.clone())),
            Some(other) => Err(wrong_type(key, other, "string")),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: Payload) -> Result<()> {
        self.metrics.record_set(key.len(), value.len());
        self.write()?.insert(key.to_string(), Value::Str(value));
        Ok(())
    }

    fn push_left(&self, key: &str, value: Payload) -> Result<u64> {
        self.push(key, value, true)
    }

    fn push_right(&self, key: &str, value: Payload) -> Result<u64> {
        self.push(key, value, false)
    }

    fn scan(
        &self,
        cursor: &ScanCursor,
        pattern: &str,
        batch_size: usize,
    ) -> Result<(Vec<String>, ScanCursor)> {
        self.metrics.record_scan();
        let lower = match cursor {
            ScanCursor::Start => Bound::Unbounded,
            ScanCursor::After(key) => Bound::Excluded(key.clone()),
            ScanCursor::Done => return Ok((Vec::new(), ScanCursor::Done)),
        };

        let keyspace = self.read()?;
        let examined: Vec<&String> = keyspace
            .range::<String, _>((lower, Bound::Unbounded))
            .take(batch_size.max(1))
            .map(|(key, _)| key)
            .collect();

        let next = match examined.last() {
            Some(last)
                if keyspace
                    .range::<String, _>((Bound::Excluded((*last).clone()), Bound::Unbounded))
                    .next()
                    .is_some() =>
            {
                ScanCursor::After((*last).clone())
            }
            _ => ScanCursor::Done,
        };

        let keys = examined
            .into_iter()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        Ok((keys, next))
    }

    fn delete(&self, keys: &[String]) -> Result<u64> {
        self.metrics.record_delete();
        let mut keyspace = self.write()?;
        Ok(keys
            .iter()
            .filter(|key| keyspace.remove(key.as_str()).is_some())
            .count() as u64)
    }

    fn flush_namespace(&self) -> Result<()> {
        self.write()?.clear();
        Ok(())
    }
}
