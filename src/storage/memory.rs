//! In-memory entry storage for tests and dry runs

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use super::EntryStorage;
use crate::models::Entry;
use crate::utils::error::StorageError;

/// `RwLock<BTreeMap>` implementation of [`EntryStorage`]
pub struct MemoryStorage {
    rows: RwLock<BTreeMap<i64, Entry>>,
    next_id: AtomicI64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Get the number of stored fragments
    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored fragment, ordered by id
    pub fn all(&self) -> Vec<Entry> {
        self.rows
            .read()
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntryStorage for MemoryStorage {
    async fn find_fragments_by_url(&self, url: &str) -> Result<Vec<Entry>, StorageError> {
        let rows = self.rows.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut found: Vec<Entry> = rows.values().filter(|e| e.url == url).cloned().collect();
        found.sort_by_key(|e| e.chunk);
        Ok(found)
    }

    async fn insert(&self, entry: &Entry) -> Result<i64, StorageError> {
        let mut rows = self.rows.write().map_err(|_| StorageError::LockPoisoned)?;

        if rows
            .values()
            .any(|e| e.url == entry.url && e.chunk == entry.chunk)
        {
            return Err(StorageError::Conflict {
                url: entry.url.clone(),
                chunk: entry.chunk,
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut stored = entry.clone();
        stored.id = Some(id);
        rows.insert(id, stored);
        Ok(id)
    }

    async fn update(&self, entry: &Entry) -> Result<(), StorageError> {
        let id = entry
            .id
            .ok_or_else(|| StorageError::MissingId(entry.url.clone()))?;

        let mut rows = self.rows.write().map_err(|_| StorageError::LockPoisoned)?;
        match rows.get_mut(&id) {
            Some(slot) => {
                *slot = entry.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound(id)),
        }
    }

    async fn delete(&self, id: i64) -> Result<(), StorageError> {
        let mut rows = self.rows.write().map_err(|_| StorageError::LockPoisoned)?;
        rows.remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NotFound(id))
    }
}
