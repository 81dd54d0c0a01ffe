//! Bounded task queue and worker pool
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐
//! │ Walker A │──┐                        ┌──────────┐
//! └──────────┘  │   bounded mpsc (1000)  │ Worker 0 │──▶ Reconciler ──▶ hook
//! ┌──────────┐  ├──────────────────────▶ │ Worker 1 │──▶ Reconciler ──▶ hook
//! │ Walker B │──┘     TaskQueue          │   ...    │
//! └──────────┘                           └──────────┘
//!                                             │
//!                                        Heartbeat / Stats
//! ```
//!
//! Workers share the receiver through an `Arc<Mutex<Receiver>>` and nothing
//! else besides atomic counters. There is no ordering between tasks.

pub mod task;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::metrics::Metrics;
use crate::models::Entry;
use crate::reconcile::Reconciler;
use crate::utils::error::PipelineError;
use crate::walker::cancelled;

pub use task::{execute, CompletionHook, NoopHook, Task, TaskStatus};

// ============================================================================
// Configuration
// ============================================================================

/// Pool configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of long-lived workers
    pub workers: usize,

    /// Task queue capacity; producers wait when it is full
    pub queue_capacity: usize,

    /// Interval of the heartbeat log line
    pub heartbeat: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            queue_capacity: 1000,
            heartbeat: Duration::from_secs(10),
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Pool statistics (thread-safe)
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// Tasks accepted by the queue
    pub enqueued: AtomicU64,
    pub created: AtomicU64,
    pub updated: AtomicU64,
    pub unchanged: AtomicU64,
    pub failed: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a finished task
    pub fn record(&self, status: TaskStatus) {
        let counter = match status {
            TaskStatus::Created => &self.created,
            TaskStatus::Updated => &self.updated,
            TaskStatus::Unchanged => &self.unchanged,
            TaskStatus::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of pool statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub enqueued: u64,
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub failed: u64,
}

impl StatsSnapshot {
    /// Tasks that reached a final status
    pub fn processed(&self) -> u64 {
        self.created + self.updated + self.unchanged + self.failed
    }

    /// Tasks still queued or in flight
    pub fn pending(&self) -> u64 {
        self.enqueued.saturating_sub(self.processed())
    }
}

// ============================================================================
// Queue
// ============================================================================

/// Producer side of the task queue
///
/// Cheap to clone. The queue closes once every clone and the pool itself are
/// dropped, which lets the workers drain and exit.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<Task>,
    stats: Arc<PipelineStats>,
}

impl TaskQueue {
    /// Enqueue a raw entry, waiting while the queue is full
    pub async fn push(&self, entry: Entry) -> Result<(), PipelineError> {
        self.add_task(Task::new(entry)).await
    }

    pub async fn add_task(&self, task: Task) -> Result<(), PipelineError> {
        self.tx
            .send(task)
            .await
            .map_err(|_| PipelineError::QueueClosed)?;
        self.stats.record_enqueued();
        Ok(())
    }

    /// Number of queued tasks
    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ============================================================================
// Pool
// ============================================================================

/// Fixed-size worker pool over one bounded queue
pub struct WorkerPool {
    config: PipelineConfig,
    reconciler: Arc<Reconciler>,
    hook: Arc<dyn CompletionHook>,
    metrics: Option<Arc<Metrics>>,
    queue: TaskQueue,
    rx: mpsc::Receiver<Task>,
    stats: Arc<PipelineStats>,
}

impl WorkerPool {
    pub fn new(
        config: PipelineConfig,
        reconciler: Arc<Reconciler>,
        hook: Arc<dyn CompletionHook>,
    ) -> Self {
        let capacity = config.queue_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let stats = PipelineStats::new();

        Self {
            config,
            reconciler,
            hook,
            metrics: None,
            queue: TaskQueue {
                tx,
                stats: Arc::clone(&stats),
            },
            rx,
            stats,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Producer handle for walkers
    pub fn queue(&self) -> TaskQueue {
        self.queue.clone()
    }

    pub async fn add_task(&self, task: Task) -> Result<(), PipelineError> {
        self.queue.add_task(task).await
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /// Spawn the workers and the heartbeat
    ///
    /// The pool's own sender is dropped here; only queues handed out through
    /// [`WorkerPool::queue`] keep the channel open.
    pub fn run_background(self) -> PoolHandle {
        let Self {
            config,
            reconciler,
            hook,
            metrics,
            queue,
            rx,
            stats,
        } = self;

        let (stop_tx, stop_rx) = watch::channel(false);
        let rx = Arc::new(Mutex::new(rx));
        let activity = Arc::new(Activity::new());
        let workers = config.workers.max(1);

        tracing::info!(
            workers,
            queue_capacity = config.queue_capacity,
            "Starting worker pool"
        );

        let handles = (0..workers)
            .map(|worker_id| {
                let worker = Worker {
                    id: worker_id,
                    rx: Arc::clone(&rx),
                    reconciler: Arc::clone(&reconciler),
                    hook: Arc::clone(&hook),
                    metrics: metrics.clone(),
                    stats: Arc::clone(&stats),
                    activity: Arc::clone(&activity),
                };
                tokio::spawn(worker.run(stop_rx.clone()))
            })
            .collect();

        let (beat_tx, beat_rx) = watch::channel(false);
        let heartbeat = tokio::spawn(heartbeat(
            config.heartbeat,
            queue.tx.downgrade(),
            Arc::clone(&stats),
            activity,
            beat_rx,
        ));
        drop(queue);

        PoolHandle {
            stop_tx,
            beat_tx,
            workers: handles,
            heartbeat,
            stats,
        }
    }
}

/// Handle to a running pool
pub struct PoolHandle {
    stop_tx: watch::Sender<bool>,
    beat_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
    heartbeat: JoinHandle<()>,
    stats: Arc<PipelineStats>,
}

impl PoolHandle {
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Signal every worker to exit and wait for them
    ///
    /// Tasks still queued are dropped; in-flight reconciliations finish.
    pub async fn stop(self) -> StatsSnapshot {
        let _ = self.stop_tx.send(true);
        self.finish().await
    }

    /// Wait until every queue handle is dropped and the queue is drained
    pub async fn join(self) -> StatsSnapshot {
        self.finish().await
    }

    async fn finish(self) -> StatsSnapshot {
        for handle in self.workers {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker panicked");
            }
        }

        let _ = self.beat_tx.send(true);
        let _ = self.heartbeat.await;

        let snapshot = self.stats.snapshot();
        tracing::info!(
            created = snapshot.created,
            updated = snapshot.updated,
            unchanged = snapshot.unchanged,
            failed = snapshot.failed,
            "Worker pool stopped"
        );
        snapshot
    }
}

// ============================================================================
// Workers
// ============================================================================

/// Last dequeue time and number of busy workers
struct Activity {
    started: Instant,
    last_task_ms: AtomicU64,
    busy: AtomicUsize,
}

impl Activity {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            last_task_ms: AtomicU64::new(0),
            busy: AtomicUsize::new(0),
        }
    }

    fn mark(&self) {
        let now = self.started.elapsed().as_millis() as u64;
        self.last_task_ms.store(now, Ordering::Relaxed);
    }

    fn idle_for(&self) -> Duration {
        let last = self.last_task_ms.load(Ordering::Relaxed);
        self.started
            .elapsed()
            .saturating_sub(Duration::from_millis(last))
    }
}

struct Worker {
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<Task>>>,
    reconciler: Arc<Reconciler>,
    hook: Arc<dyn CompletionHook>,
    metrics: Option<Arc<Metrics>>,
    stats: Arc<PipelineStats>,
    activity: Arc<Activity>,
}

impl Worker {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::debug!(worker_id = self.id, "Worker started");

        loop {
            let task = {
                let mut rx = self.rx.lock().await;
                tokio::select! {
                    biased;
                    _ = cancelled(&mut shutdown) => None,
                    task = rx.recv() => task,
                }
            };

            let Some(task) = task else {
                break;
            };

            if *shutdown.borrow() {
                tracing::debug!(worker_id = self.id, url = %task.entry.url, "Task dropped on shutdown");
                break;
            }

            self.activity.mark();
            self.activity.busy.fetch_add(1, Ordering::Relaxed);
            let status = execute(self.id, task, &self.reconciler, self.hook.as_ref()).await;
            self.activity.busy.fetch_sub(1, Ordering::Relaxed);
            self.activity.mark();

            self.stats.record(status);
            if let Some(metrics) = &self.metrics {
                metrics.record_task(status.as_str());
            }
        }

        tracing::debug!(worker_id = self.id, "Worker shutting down");
    }
}

async fn heartbeat(
    period: Duration,
    queue: mpsc::WeakSender<Task>,
    stats: Arc<PipelineStats>,
    activity: Arc<Activity>,
    mut stop: watch::Receiver<bool>,
) {
    if period.is_zero() {
        return;
    }

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancelled(&mut stop) => break,
            _ = interval.tick() => {}
        }

        let depth = queue
            .upgrade()
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0);
        let busy = activity.busy.load(Ordering::Relaxed);
        let snapshot = stats.snapshot();

        if depth == 0 && busy == 0 {
            tracing::info!(
                idle_secs = activity.idle_for().as_secs(),
                processed = snapshot.processed(),
                "Workers waiting for tasks"
            );
        } else {
            tracing::info!(
                queue_depth = depth,
                busy_workers = busy,
                processed = snapshot.processed(),
                failed = snapshot.failed,
                "Pipeline heartbeat"
            );
        }
    }
}
