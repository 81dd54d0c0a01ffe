//! Wiring of configured sources, storage and the worker pool
//!
//! ```text
//!  Config ──▶ open_storage ─────────────┐
//!         ──▶ build_reconciler ─────────┤
//!         ──▶ notifications::build_hook ┼──▶ WorkerPool ──▶ PoolHandle
//!         ──▶ build_walkers ──▶ spawn(walker.run(queue, shutdown)) ...
//! ```
//!
//! [`run`] returns once every walker has stopped and the pool has drained, or
//! promptly after the shutdown signal fires.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use tokio::sync::watch;

use crate::config::{Config, StorageConfig};
use crate::crawler::{crawler_for, CrawlerRegistry, PageFetcher};
use crate::metrics::Metrics;
use crate::models::SourceKind;
use crate::notifications;
use crate::pipeline::{StatsSnapshot, WorkerPool};
use crate::reconcile::{FreshnessPolicy, Reconciler};
use crate::sources::build_source;
use crate::splitter::Splitter;
use crate::storage::{SharedStorage, SqliteStorage};
use crate::walker::{Cursor, SourceWalker, WalkSummary};

/// Outcome of a pipeline run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub walks: Vec<WalkSummary>,
    pub stats: StatsSnapshot,
}

/// Run options not carried by the config file
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Read a single page per source, then drain and exit
    pub once: bool,
}

/// Open the configured SQLite database
pub fn open_storage(config: &StorageConfig) -> Result<SharedStorage> {
    let storage = if config.is_memory() {
        SqliteStorage::in_memory()?
    } else {
        SqliteStorage::open(&config.sqlite_path)?
    };
    Ok(Arc::new(storage))
}

/// Crawlers for every source kind that has enrichment enabled
pub fn build_crawlers(config: &Config, metrics: &Arc<Metrics>) -> Result<CrawlerRegistry> {
    let mut registry = CrawlerRegistry::new();
    let mut fetcher: Option<Arc<PageFetcher>> = None;

    for source in &config.sources {
        let kind = source.kind()?;
        if !source.enrichment_enabled()? || registry.get(kind).is_some() {
            continue;
        }

        let fetcher = match &fetcher {
            Some(fetcher) => Arc::clone(fetcher),
            None => {
                let created = Arc::new(
                    PageFetcher::new(config.crawler.fetcher_config())
                        .context("Failed to create enrichment fetcher")?
                        .with_metrics(Arc::clone(metrics)),
                );
                fetcher = Some(Arc::clone(&created));
                created
            }
        };

        match crawler_for(kind, fetcher) {
            Some(crawler) => registry.register(kind, crawler),
            None => {
                tracing::warn!(source = %kind, "Enrichment requested but no crawler exists for this source");
            }
        }
    }

    Ok(registry)
}

/// Reconciler with the configured splitter, policy and crawlers
pub fn build_reconciler(
    config: &Config,
    storage: SharedStorage,
    crawlers: CrawlerRegistry,
    metrics: Arc<Metrics>,
) -> Reconciler {
    Reconciler::new(
        storage,
        crawlers,
        Splitter::new(config.splitter.optimal_size, config.splitter.max_size),
        FreshnessPolicy::new(&config.freshness),
    )
    .with_metrics(metrics)
    .prune_orphans(config.pipeline.prune_orphans)
}

/// One walker per configured source, each with its own fetcher
pub fn build_walkers(
    config: &Config,
    metrics: &Arc<Metrics>,
    options: RunOptions,
) -> Result<Vec<SourceWalker>> {
    config
        .sources
        .iter()
        .map(|source| {
            let kind: SourceKind = source.kind()?;
            let name = source.display_name();

            let fetcher = PageFetcher::new(source.fetcher_config(&config.crawler))
                .with_context(|| format!("Failed to create fetcher for {name}"))?
                .with_metrics(Arc::clone(metrics));

            let feed = build_source(source.format()?, kind, &source.lang, Arc::new(fetcher));
            let cursor = Cursor::new(source.url.clone(), source.pagination.clone());

            let mut walker_config = source.walker_config(&config.crawler);
            if options.once {
                walker_config.max_pages = Some(1);
            }

            Ok(SourceWalker::new(name, feed, cursor, walker_config))
        })
        .collect()
}

/// Walk every source and reconcile until done or shut down
pub async fn run(
    config: &Config,
    storage: SharedStorage,
    metrics: Arc<Metrics>,
    options: RunOptions,
    shutdown: watch::Receiver<bool>,
) -> Result<RunReport> {
    let crawlers = build_crawlers(config, &metrics)?;
    let reconciler = build_reconciler(config, storage, crawlers, Arc::clone(&metrics));
    let hook = notifications::build_hook(&config.index_now)?;
    let walkers = build_walkers(config, &metrics, options)?;

    let pool = WorkerPool::new(config.pipeline.pool_config(), Arc::new(reconciler), hook)
        .with_metrics(Arc::clone(&metrics));
    let queue = pool.queue();
    let handle = pool.run_background();

    tracing::info!(sources = walkers.len(), once = options.once, "Starting source walkers");

    let tasks: Vec<_> = walkers
        .into_iter()
        .map(|walker| tokio::spawn(walker.run(queue.clone(), shutdown.clone())))
        .collect();
    drop(queue);

    let mut walks = Vec::with_capacity(tasks.len());
    for result in join_all(tasks).await {
        match result {
            Ok(summary) => walks.push(summary),
            Err(e) => tracing::error!(error = %e, "Walker task panicked"),
        }
    }

    let stats = if *shutdown.borrow() {
        handle.stop().await
    } else {
        handle.join().await
    };

    Ok(RunReport { walks, stats })
}
