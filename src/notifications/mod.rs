//! Completion notifications
//!
//! Hooks run by the worker pool after each reconciliation. Only IndexNow is
//! implemented; a disabled configuration yields the no-op hook.

pub mod indexnow;

use std::sync::Arc;

use crate::pipeline::{CompletionHook, NoopHook};
use crate::utils::error::NotificationError;

pub use indexnow::{IndexNowConfig, IndexNowHook, Submission};

/// Build the completion hook for a configuration
pub fn build_hook(config: &IndexNowConfig) -> Result<Arc<dyn CompletionHook>, NotificationError> {
    if !config.enabled {
        return Ok(Arc::new(NoopHook));
    }

    let hook = IndexNowHook::new(config)?;
    tracing::info!(endpoint = %config.endpoint, "IndexNow notifications enabled");
    Ok(Arc::new(hook))
}
