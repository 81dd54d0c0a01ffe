//! feedmill - news feed ingestion and reconciliation pipeline
//!
//! Harvests articles from heterogeneous news sources, reconciles them with
//! previously stored fragments and splits long bodies into bounded fragments
//! for a full-text search index.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`walker`] - Per-source pagination loops
//! - [`sources`] - Listing page readers (RSS/Atom, mid.ru, mil.ru)
//! - [`pipeline`] - Bounded task queue and worker pool
//! - [`reconcile`] - Freshness policy and the reconciliation procedure
//! - [`splitter`] - Paragraph-aware content splitting
//! - [`crawler`] - HTTP fetching and article enrichment
//! - [`parser`] - HTML selectors and sanitising helpers
//! - [`storage`] - Fragment persistence (SQLite, in-memory)
//! - [`notifications`] - Completion hooks (IndexNow)
//! - [`metrics`] - Prometheus metrics and the `/metrics` endpoint
//! - [`models`] - Core data structures and types
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use feedmill::app::{self, RunOptions};
//! use feedmill::config::Config;
//! use feedmill::metrics::Metrics;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let storage = app::open_storage(&config.storage)?;
//!     let metrics = Arc::new(Metrics::new()?);
//!     let (_stop, shutdown) = tokio::sync::watch::channel(false);
//!     let report = app::run(&config, storage, metrics, RunOptions::default(), shutdown).await?;
//!     println!("created {}", report.stats.created);
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod config;
pub mod crawler;
pub mod error;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod parser;
pub mod pipeline;
pub mod reconcile;
pub mod sources;
pub mod splitter;
pub mod storage;
pub mod utils;
pub mod walker;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::{Crawler, CrawlerRegistry};
    pub use crate::error::{Error, ErrorCategory, FeedmillErrorTrait, Result};
    pub use crate::models::{Entry, SourceKind};
    pub use crate::pipeline::{CompletionHook, TaskQueue, WorkerPool};
    pub use crate::reconcile::{FreshnessPolicy, Reconciler};
    pub use crate::splitter::Splitter;
    pub use crate::storage::{EntryStorage, SharedStorage};
}

// Direct re-exports for convenience
pub use models::{Entry, SourceKind};
