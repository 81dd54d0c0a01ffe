//! Unified error handling for the feedmill crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while keeping the domain errors available
//! for code that needs to match on them.
//!
//! # Architecture
//!
//! - [`FeedmillErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use feedmill::error::{Error, FeedmillErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         tracing::warn!(error = %err, "will retry on next poll");
//!     } else {
//!         tracing::error!(error = %err, category = ?err.category(), "fatal");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

pub use crate::utils::error::{
    CrawlerError, FetchError, NotificationError, ParseError, PipelineError, ReconcileError,
    SourceError, StorageError,
};

/// Common trait for all feedmill error types
pub trait FeedmillErrorTrait: std::error::Error {
    /// Check if this error is recoverable (the operation can be retried later)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout, rate limit)
    Network,
    /// Parsing and data extraction errors
    Parsing,
    /// Storage and I/O errors
    Storage,
    /// Configuration and validation errors
    Config,
    /// Pipeline and worker errors
    Pipeline,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Short label used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Parsing => "parsing",
            Self::Storage => "storage",
            Self::Config => "config",
            Self::Pipeline => "pipeline",
            Self::Other => "other",
        }
    }
}

/// Unified error type for the feedmill crate
#[derive(Error, Debug)]
pub enum Error {
    /// Enrichment crawler errors
    #[error("Crawler error: {0}")]
    Crawler(#[from] CrawlerError),

    /// Fetch-specific errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Parse-specific errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Feed source errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Entry storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Reconciliation errors
    #[error("Reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// Worker pool errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Completion notifier errors
    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl FeedmillErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Crawler(CrawlerError::Fetch(e)) | Self::Fetch(e) => e.is_transient(),
            Self::Crawler(_) => false,
            Self::Parse(_) => false,
            Self::Source(e) => e.is_transient(),
            Self::Storage(StorageError::Database(_)) => true,
            Self::Storage(_) => false,
            Self::Reconcile(ReconcileError::Storage(_)) => true,
            Self::Reconcile(ReconcileError::Enrichment { source, .. }) => {
                matches!(source, CrawlerError::Fetch(e) if e.is_transient())
            }
            Self::Pipeline(_) => false,
            Self::Notification(NotificationError::Http(_)) => true,
            Self::Notification(_) => false,
            Self::Io(_) => true, // I/O errors are often transient
            Self::Json(_) => false,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Crawler(_) | Self::Fetch(_) | Self::Notification(_) => ErrorCategory::Network,
            Self::Source(SourceError::Fetch(_)) => ErrorCategory::Network,
            Self::Parse(_) | Self::Source(SourceError::Parse(_)) | Self::Json(_) => {
                ErrorCategory::Parsing
            }
            Self::Storage(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Reconcile(ReconcileError::Storage(_)) => ErrorCategory::Storage,
            Self::Reconcile(ReconcileError::Enrichment { .. }) => ErrorCategory::Network,
            Self::Pipeline(_) => ErrorCategory::Pipeline,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type alias using the unified Error
pub type Result<T> = std::result::Result<T, Error>;
