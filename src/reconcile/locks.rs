//! Striped per-URL advisory locks
//!
//! Two workers that pick up the same URL at the same time would otherwise both
//! see "nothing stored" and both insert chunk 1. Reconciliation of one URL is
//! serialised by hashing the URL onto a fixed set of async mutexes.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tokio::sync::{Mutex, MutexGuard};

/// Default number of stripes
pub const DEFAULT_STRIPES: usize = 64;

pub struct UrlLocks {
    stripes: Vec<Mutex<()>>,
}

impl Default for UrlLocks {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPES)
    }
}

impl UrlLocks {
    pub fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Wait for exclusive access to `url`; released when the guard drops
    pub async fn lock(&self, url: &str) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_of(url)].lock().await
    }

    fn stripe_of(&self, url: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }
}
