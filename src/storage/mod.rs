//! Entry storage
//!
//! Fragments are persisted through the [`EntryStorage`] trait so the
//! reconciliation logic never depends on a concrete backend.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │            Reconciler / workers          │
//! └──────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌──────────────────────────────────────────┐
//! │          EntryStorage (async trait)      │
//! └──────────────────────────────────────────┘
//!            │                      │
//!            ▼                      ▼
//!   ┌─────────────────┐    ┌─────────────────┐
//!   │  SqliteStorage  │    │  MemoryStorage  │
//!   └─────────────────┘    └─────────────────┘
//! ```

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::Entry;
use crate::utils::error::StorageError;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

/// Persistence for article fragments
///
/// Implementations must be safe for concurrent use by all workers.
#[async_trait]
pub trait EntryStorage: Send + Sync {
    /// All fragments stored for `url`, ordered by chunk
    async fn find_fragments_by_url(&self, url: &str) -> Result<Vec<Entry>, StorageError>;

    /// Insert a new fragment and return its id
    async fn insert(&self, entry: &Entry) -> Result<i64, StorageError>;

    /// Rewrite the fragment identified by `entry.id`
    async fn update(&self, entry: &Entry) -> Result<(), StorageError>;

    /// Remove one fragment
    async fn delete(&self, id: i64) -> Result<(), StorageError>;
}

/// Shared storage handle
pub type SharedStorage = Arc<dyn EntryStorage>;
