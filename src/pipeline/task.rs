//! Task type and completion hook

use std::time::Instant;

use async_trait::async_trait;

use crate::models::Entry;
use crate::reconcile::{ReconcileOutcome, Reconciler};

/// Side effect run after every successful reconciliation
///
/// Receives the written entry when fragments were created or rewritten and
/// `None` when nothing changed, so collaborators act only on new content.
#[async_trait]
pub trait CompletionHook: Send + Sync {
    async fn on_complete(&self, entry: Option<&Entry>) -> anyhow::Result<()>;
}

/// Hook that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

#[async_trait]
impl CompletionHook for NoopHook {
    async fn on_complete(&self, _entry: Option<&Entry>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// One raw entry waiting for reconciliation
#[derive(Debug, Clone)]
pub struct Task {
    pub entry: Entry,
    pub enqueued_at: Instant,
}

impl Task {
    pub fn new(entry: Entry) -> Self {
        Self {
            entry,
            enqueued_at: Instant::now(),
        }
    }
}

/// How a task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Created,
    Updated,
    Unchanged,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Failed => "failed",
        }
    }
}

/// Reconcile one task and run the hook
///
/// The hook runs once per task, with `None` for unchanged and failed tasks.
/// Failures are logged and reported as [`TaskStatus::Failed`]; the pool never
/// retries, the next poll of the feed presents the URL again.
pub async fn execute(
    worker_id: usize,
    task: Task,
    reconciler: &Reconciler,
    hook: &dyn CompletionHook,
) -> TaskStatus {
    let url = task.entry.url.clone();
    let waited = task.enqueued_at.elapsed();

    tracing::debug!(worker_id, url = %url, waited_ms = waited.as_millis() as u64, "Processing task");

    let (status, outcome) = match reconciler.reconcile(task.entry).await {
        Ok(outcome) => {
            let status = match &outcome {
                ReconcileOutcome::Created { .. } => TaskStatus::Created,
                ReconcileOutcome::Updated { .. } => TaskStatus::Updated,
                ReconcileOutcome::Unchanged => TaskStatus::Unchanged,
            };
            (status, Some(outcome))
        }
        Err(e) => {
            tracing::error!(worker_id, url = %url, error = %e, "Task failed");
            (TaskStatus::Failed, None)
        }
    };

    let written = outcome.as_ref().and_then(ReconcileOutcome::entry);
    if let Err(e) = hook.on_complete(written).await {
        tracing::warn!(worker_id, url = %url, error = %e, "Completion hook failed");
    }

    status
}
