//! Integration tests module
//!
//! End-to-end tests for the feedmill pipeline, including:
//! - Complete walk → reconcile → store flow
//! - Source readers over HTTP
//! - Error handling and recovery scenarios

pub mod error_scenarios;
pub mod fixtures;
pub mod pipeline_test;
pub mod sources_test;
