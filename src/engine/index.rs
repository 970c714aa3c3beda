//! DUALLOG - Coalesce Index
//! Maps an item identifier to the placement it was inserted under, so a
//! removal needs one key lookup instead of a scan of either log.

use crate::error::{DualLogError, Result};
use crate::store::{OrderedLogStore, ScanCursor};
use crate::types::{Payload, Placement};

/// Secondary index stored as plain keys: `"<base>:coalesce:<identifier>"`
/// holding the `"<log-name>:<score>"` descriptor.
#[derive(Debug, Clone)]
pub struct CoalesceIndex {
    prefix: String,
}

impl CoalesceIndex {
    pub fn new(key_base_name: &str) -> Self {
        Self {
            prefix: format!("{}:coalesce:", key_base_name),
        }
    }

    /// Store key for `identifier`.
    pub fn key(&self, identifier: &str) -> String {
        format!("{}{}", self.prefix, identifier)
    }

    /// Glob matching every key of this index.
    pub fn pattern(&self) -> String {
        format!("{}*", self.prefix)
    }

    /// Point `identifier` at `placement`.
    pub fn record<S: OrderedLogStore + ?Sized>(
        &self,
        store: &S,
        identifier: &str,
        placement: Placement,
    ) -> Result<()> {
        store.set(&self.key(identifier), Payload::from(placement.encode()))
    }

    /// Where `identifier` lives. An identifier with no entry is a caller error.
    pub fn lookup<S: OrderedLogStore + ?Sized>(
        &self,
        store: &S,
        identifier: &str,
    ) -> Result<Placement> {
        let raw = store
            .get(&self.key(identifier))?
            .ok_or_else(|| DualLogError::UnknownIdentifier(identifier.to_string()))?;
        let descriptor = std::str::from_utf8(&raw)
            .map_err(|_| DualLogError::MalformedPlacement(String::from_utf8_lossy(&raw).into()))?;
        Placement::parse(descriptor)
    }

    /// Drop the entry for `identifier`; returns true if one existed.
    pub fn forget<S: OrderedLogStore + ?Sized>(&self, store: &S, identifier: &str) -> Result<bool> {
        Ok(store.delete(&[self.key(identifier)])? == 1)
    }

    /// Delete every entry, one scan page at a time, until the store reports
    /// the scan complete. Returns the number of entries deleted.
    pub fn clear<S: OrderedLogStore + ?Sized>(&self, store: &S, batch_size: usize) -> Result<u64> {
        let pattern = self.pattern();
        let mut cursor = ScanCursor::Start;
        let mut deleted = 0;

        loop {
            let (mut keys, next) = store.scan(&cursor, &pattern, batch_size)?;
            // Wildcards in the base name can match keys outside the index.
            keys.retain(|key| key.starts_with(&self.prefix));
            if !keys.is_empty() {
                deleted += store.delete(&keys)?;
                log::debug!("Deleted {} coalesce keys matching {}", keys.len(), pattern);
            }
            if next.is_done() {
                break;
            }
            cursor = next;
        }

        Ok(deleted)
    }
}
