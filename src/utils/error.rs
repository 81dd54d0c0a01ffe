//! Error types for the feedmill pipeline
//!
//! This module defines the domain error types used by fetchers, feed sources,
//! crawlers, storage backends and the reconciliation procedure.

use thiserror::Error;

/// Errors that can occur during HTTP fetching operations
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Non-success status code returned by the server
    #[error("Server error: {0}")]
    ServerError(u16),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Maximum retry attempts exceeded
    #[error("Maximum retry attempts exceeded ({attempts} attempts, last error: {last})")]
    MaxRetriesExceeded { attempts: u32, last: String },

    /// Content decoding error
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Whether another attempt at the same request could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimit | Self::Timeout | Self::MaxRetriesExceeded { .. } => {
                true
            }
            Self::ServerError(status) => matches!(status, 429 | 500..=599),
            Self::Decode(_) | Self::InvalidUrl(_) => false,
        }
    }
}

/// Errors that can occur while extracting data from fetched documents
#[derive(Error, Debug)]
pub enum ParseError {
    /// Title not found in document
    #[error("Title not found in article")]
    TitleNotFound,

    /// Content not found in document
    #[error("Content not found in article")]
    ContentNotFound,

    /// Invalid URL format
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Malformed feed document (XML or JSON)
    #[error("Malformed feed: {0}")]
    MalformedFeed(String),

    /// Unknown or unsupported page layout
    #[error("Unknown or unsupported format")]
    UnknownFormat,
}

/// Errors raised by article enrichment crawlers
#[derive(Error, Debug)]
pub enum CrawlerError {
    /// Fetch error
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Invalid date format
    #[error("Invalid date format: {0}")]
    InvalidDate(String),
}

/// Errors returned by feed sources when reading a listing page
#[derive(Error, Debug)]
pub enum SourceError {
    /// Transport failure; the page may be retried on the next iteration
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The page was fetched but could not be understood
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

impl SourceError {
    /// Whether the failure is a transport problem rather than a structural one
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch(e) if e.is_transient())
    }
}

/// Errors returned by entry storage backends
#[derive(Error, Debug)]
pub enum StorageError {
    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A fragment with the same URL and chunk already exists
    #[error("Fragment already stored: {url} (chunk {chunk})")]
    Conflict { url: String, chunk: u32 },

    /// Update or delete addressed a row that does not exist
    #[error("Entry not found: {0}")]
    NotFound(i64),

    /// Update was called on an entry that has no storage id
    #[error("Entry has no storage id: {0}")]
    MissingId(String),

    /// The connection lock was poisoned by a panicking thread
    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Errors that abort one reconciliation task
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Storage lookup or write failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The enrichment crawler could not produce a full article
    #[error("Enrichment failed for {url}: {source}")]
    Enrichment {
        url: String,
        #[source]
        source: CrawlerError,
    },
}

/// Errors that can occur in the worker pool
#[derive(Error, Debug)]
pub enum PipelineError {
    /// All workers are gone and the queue no longer accepts tasks
    #[error("Task queue closed")]
    QueueClosed,
}

/// Errors raised by completion notifiers
#[derive(Error, Debug)]
pub enum NotificationError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a status outside the accepted set
    #[error("Unexpected status {status} from {endpoint}")]
    UnexpectedStatus { status: u16, endpoint: String },

    /// Invalid notifier configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
