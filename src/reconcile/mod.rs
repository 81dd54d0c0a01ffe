//! Reconciliation of observed entries against stored fragment sets
//!
//! ```text
//!  raw Entry ──▶ find_fragments_by_url
//!                   │
//!          ┌────────┴────────┐
//!       nothing           fragments
//!          │                 │
//!       enrich?        FreshnessPolicy ── fresh ──▶ Unchanged
//!          │                 │ stale
//!        split            enrich? ─▶ split
//!          │                 │
//!       insert 1..N     update 1..min(old,new), insert the rest
//! ```
//!
//! Work on one URL is serialised through [`UrlLocks`]; different URLs proceed
//! in parallel.

pub mod freshness;
pub mod locks;

use std::sync::Arc;

use crate::crawler::CrawlerRegistry;
use crate::metrics::Metrics;
use crate::models::{timestamp_now, Entry};
use crate::splitter::Splitter;
use crate::storage::SharedStorage;
use crate::utils::error::ReconcileError;

pub use freshness::{FreshnessConfig, FreshnessPolicy, StaleReason, Verdict};
pub use locks::UrlLocks;

/// What one reconciliation did
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// First sighting: every fragment inserted
    Created { entry: Entry, fragments: usize },
    /// Stale fragment set rewritten
    Updated {
        entry: Entry,
        reason: StaleReason,
        updated: usize,
        inserted: usize,
        pruned: usize,
    },
    /// Stored data is fresh; nothing written
    Unchanged,
}

impl ReconcileOutcome {
    /// The written entry, for created or updated outcomes
    pub fn entry(&self) -> Option<&Entry> {
        match self {
            Self::Created { entry, .. } | Self::Updated { entry, .. } => Some(entry),
            Self::Unchanged => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Updated { .. } => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Runs the reconciliation procedure for one entry at a time
pub struct Reconciler {
    storage: SharedStorage,
    crawlers: CrawlerRegistry,
    splitter: Splitter,
    policy: FreshnessPolicy,
    locks: UrlLocks,
    metrics: Option<Arc<Metrics>>,
    prune_orphans: bool,
}

impl Reconciler {
    pub fn new(
        storage: SharedStorage,
        crawlers: CrawlerRegistry,
        splitter: Splitter,
        policy: FreshnessPolicy,
    ) -> Self {
        Self {
            storage,
            crawlers,
            splitter,
            policy,
            locks: UrlLocks::default(),
            metrics: None,
            prune_orphans: false,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Delete stored fragments beyond the new fragment count on rewrite
    pub fn prune_orphans(mut self, prune: bool) -> Self {
        self.prune_orphans = prune;
        self
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// Reconcile one raw entry
    ///
    /// # Errors
    ///
    /// Storage failures and enrichment failures abort the task. An enrichment
    /// failure happens before any write, so stored data stays untouched.
    pub async fn reconcile(&self, entry: Entry) -> Result<ReconcileOutcome, ReconcileError> {
        let _timer = self
            .metrics
            .as_ref()
            .map(|m| m.start_reconcile_timer(entry.source.as_str()));
        let _guard = self.locks.lock(&entry.url).await;

        let stored = self.storage.find_fragments_by_url(&entry.url).await?;

        let Some(head) = stored.first() else {
            return self.create(entry).await;
        };

        match self.policy.evaluate(head, &entry) {
            Verdict::Fresh => {
                tracing::trace!(url = %entry.url, "Stored entry is fresh");
                Ok(ReconcileOutcome::Unchanged)
            }
            Verdict::Stale(reason) => {
                tracing::debug!(url = %entry.url, reason = reason.as_str(), "Stored entry is stale");
                self.rewrite(entry, &stored, reason).await
            }
        }
    }

    async fn create(&self, entry: Entry) -> Result<ReconcileOutcome, ReconcileError> {
        let entry = self.enrich(entry).await?;
        let fragments = self.splitter.split_entry(&entry);
        let now = timestamp_now();

        let count = fragments.len();
        let mut inserted = Vec::with_capacity(count);
        for mut fragment in fragments {
            fragment.created = Some(now);
            fragment.updated_at = Some(now);
            match self.storage.insert(&fragment).await {
                Ok(id) => inserted.push(id),
                Err(e) => {
                    self.discard(&entry.url, &inserted).await;
                    return Err(e.into());
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_inserted(entry.source.as_str(), count as u64);
        }
        tracing::info!(url = %entry.url, title = %entry.title, fragments = count, "Entry created");

        Ok(ReconcileOutcome::Created {
            entry,
            fragments: count,
        })
    }

    /// Remove the fragments of an unfinished create so the next poll starts over
    async fn discard(&self, url: &str, ids: &[i64]) {
        for &id in ids {
            if let Err(e) = self.storage.delete(id).await {
                tracing::error!(url = %url, id, error = %e, "Cannot remove partially created fragment");
            }
        }
        if !ids.is_empty() {
            tracing::warn!(url = %url, fragments = ids.len(), "Partial create rolled back");
        }
    }

    async fn rewrite(
        &self,
        entry: Entry,
        stored: &[Entry],
        reason: StaleReason,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let entry = self.enrich(entry).await?;
        let fragments = self.splitter.split_entry(&entry);
        let now = timestamp_now();
        let created = stored.first().and_then(|e| e.created).or(Some(now));

        let new_count = fragments.len();
        let mut updated = 0;
        let mut inserted = 0;

        for (index, mut fragment) in fragments.into_iter().enumerate() {
            fragment.created = created;
            fragment.updated_at = Some(now);

            match stored.get(index).and_then(|old| old.id) {
                Some(id) => {
                    fragment.id = Some(id);
                    self.storage.update(&fragment).await?;
                    updated += 1;
                }
                None => {
                    fragment.id = None;
                    self.storage.insert(&fragment).await?;
                    inserted += 1;
                }
            }
        }

        let mut pruned = 0;
        if stored.len() > new_count {
            if self.prune_orphans {
                for orphan in &stored[new_count..] {
                    if let Some(id) = orphan.id {
                        self.storage.delete(id).await?;
                        pruned += 1;
                    }
                }
            } else {
                tracing::debug!(
                    url = %entry.url,
                    stored = stored.len(),
                    fragments = new_count,
                    "Trailing fragments kept"
                );
            }
        }

        if let Some(metrics) = &self.metrics {
            let source = entry.source.as_str();
            metrics.record_updated(source, updated as u64);
            metrics.record_inserted(source, inserted as u64);
            metrics.record_pruned(source, pruned as u64);
        }
        tracing::info!(
            url = %entry.url,
            reason = reason.as_str(),
            updated,
            inserted,
            pruned,
            "Entry updated"
        );

        Ok(ReconcileOutcome::Updated {
            entry,
            reason,
            updated,
            inserted,
            pruned,
        })
    }

    async fn enrich(&self, entry: Entry) -> Result<Entry, ReconcileError> {
        let Some(crawler) = self.crawlers.get(entry.source) else {
            return Ok(entry);
        };

        let url = entry.url.clone();
        crawler.enrich(entry).await.map_err(|source| {
            tracing::warn!(url = %url, crawler = crawler.name(), error = %source, "Enrichment failed");
            ReconcileError::Enrichment { url, source }
        })
    }
}
