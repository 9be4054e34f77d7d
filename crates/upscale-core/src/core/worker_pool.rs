use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::UpscaleError;
use crate::core::queue::{QueueConsumer, QueueProducer};
use crate::telemetry::tags;
use crate::telemetry::worker::{DefaultWorkerTelemetry, WorkerTelemetry};
use crate::transform::FrameTransform;
use crate::types::{Result, WorkItem, WorkerMessage, WorkerOutput};

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Fixed-size pool of transform workers fed by a bounded queue.
///
/// Workers never coordinate with each other: each one pulls the next message
/// from the shared input queue, transforms it, and pushes the outcome to the
/// shared output queue in whatever order it finishes.
pub struct WorkerPool {
    num_workers: usize,
    telemetry: Arc<dyn WorkerTelemetry>,
}

impl WorkerPool {
    /// Creates a worker pool using the default worker telemetry implementation.
    pub fn new(num_workers: usize) -> Result<Self> {
        Self::with_telemetry(num_workers, Arc::new(DefaultWorkerTelemetry))
    }

    /// Creates a worker pool with a custom telemetry backend.
    pub fn with_telemetry(num_workers: usize, telemetry: Arc<dyn WorkerTelemetry>) -> Result<Self> {
        if num_workers == 0 {
            return Err(UpscaleError::InvalidConfig(
                "worker count must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            num_workers,
            telemetry,
        })
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Spawns the worker threads.
    ///
    /// Every worker owns a clone of `inbox` and `outbox`; the caller should
    /// drop its own copies so that queue hang-ups propagate.
    pub fn spawn<T, F>(
        &self,
        inbox: QueueConsumer<WorkerMessage<T>>,
        outbox: QueueProducer<WorkerOutput<T>>,
        transform: F,
    ) -> Result<WorkerPoolHandle>
    where
        T: Send + 'static,
        F: FrameTransform<T> + 'static,
    {
        let state = Arc::new(WorkerPoolState::new(
            Arc::clone(&self.telemetry),
            self.num_workers,
        ));
        let transform = Arc::new(transform);

        let mut worker_handles = Vec::with_capacity(self.num_workers);
        for worker_id in 0..self.num_workers {
            let worker_state = Arc::clone(&state);
            let worker_transform = Arc::clone(&transform);
            let worker_inbox = inbox.clone();
            let worker_outbox = outbox.clone();

            let handle = thread::Builder::new()
                .name(format!("upscale-worker-{worker_id}"))
                .spawn(move || {
                    run_worker_loop(
                        worker_id,
                        worker_state,
                        worker_transform,
                        worker_inbox,
                        worker_outbox,
                    );
                })?;
            worker_handles.push(handle);
        }

        Ok(WorkerPoolHandle {
            state,
            worker_handles,
        })
    }
}

struct WorkerPoolState {
    telemetry: Arc<dyn WorkerTelemetry>,
    started_at: Instant,
    completed: AtomicUsize,
    failed: AtomicUsize,
    task_counts: Vec<AtomicUsize>,
    failure_counts: Vec<AtomicUsize>,
    worker_started_offsets_us: Vec<AtomicU64>,
    worker_stopped_offsets_us: Vec<AtomicU64>,
    worker_busy_us: Vec<AtomicU64>,
}

impl WorkerPoolState {
    fn new(telemetry: Arc<dyn WorkerTelemetry>, num_workers: usize) -> Self {
        let counters = || (0..num_workers).map(|_| AtomicUsize::new(0)).collect();
        let offsets = || (0..num_workers).map(|_| AtomicU64::new(0)).collect();
        Self {
            telemetry,
            started_at: Instant::now(),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            task_counts: counters(),
            failure_counts: counters(),
            worker_started_offsets_us: offsets(),
            worker_stopped_offsets_us: offsets(),
            worker_busy_us: offsets(),
        }
    }

    // Offsets are stored +1 so that zero means "not yet recorded".
    fn mark_offset(&self, slots: &[AtomicU64], worker_id: usize) {
        let now_us = elapsed_us(self.started_at.elapsed());
        slots[worker_id].store(now_us.saturating_add(1), Ordering::Release);
    }
}

/// Per-worker runtime metrics captured by the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerRuntimeSnapshot {
    pub worker_id: usize,
    /// Frames taken off the input queue, failures included.
    pub tasks_processed: usize,
    pub tasks_failed: usize,
    pub uptime: Duration,
    pub busy: Duration,
    pub idle: Duration,
    pub utilization: f64,
}

/// Runtime metrics snapshot for the worker pool.
#[derive(Debug, Clone, Default)]
pub struct PoolRuntimeSnapshot {
    pub elapsed: Duration,
    pub completed: usize,
    pub failed: usize,
    pub workers: Vec<WorkerRuntimeSnapshot>,
}

impl PoolRuntimeSnapshot {
    /// Frames that left a worker, successfully or not.
    pub fn processed(&self) -> usize {
        self.completed.saturating_add(self.failed)
    }
}

/// Runtime handle for a spawned worker pool.
pub struct WorkerPoolHandle {
    state: Arc<WorkerPoolState>,
    worker_handles: Vec<JoinHandle<()>>,
}

impl WorkerPoolHandle {
    /// Number of worker threads spawned; one stop sentinel is owed to each.
    pub fn num_workers(&self) -> usize {
        self.state.task_counts.len()
    }

    pub fn completed_count(&self) -> usize {
        self.state.completed.load(Ordering::Acquire)
    }

    pub fn failed_count(&self) -> usize {
        self.state.failed.load(Ordering::Acquire)
    }

    /// Per-worker processed frame counts, failures included.
    pub fn worker_task_counts(&self) -> Vec<usize> {
        self.state
            .task_counts
            .iter()
            .map(|counter| counter.load(Ordering::Acquire))
            .collect()
    }

    /// Returns true once every worker thread has been joined.
    pub fn is_joined(&self) -> bool {
        self.worker_handles.is_empty()
    }

    /// Returns runtime metrics for the pool and each worker.
    pub fn runtime_snapshot(&self) -> PoolRuntimeSnapshot {
        let elapsed = self.state.started_at.elapsed();
        let elapsed_us = elapsed_us(elapsed);

        let workers = (0..self.num_workers())
            .map(|worker_id| {
                let started_raw =
                    self.state.worker_started_offsets_us[worker_id].load(Ordering::Acquire);
                let stopped_raw =
                    self.state.worker_stopped_offsets_us[worker_id].load(Ordering::Acquire);
                let busy_us_raw = self.state.worker_busy_us[worker_id].load(Ordering::Acquire);

                let start_us = started_raw.saturating_sub(1);
                let stop_us = if stopped_raw == 0 {
                    elapsed_us
                } else {
                    stopped_raw.saturating_sub(1)
                };
                let uptime_us = if started_raw == 0 {
                    0
                } else {
                    stop_us.saturating_sub(start_us)
                };
                let busy_us = busy_us_raw.min(uptime_us);
                let utilization = if uptime_us == 0 {
                    0.0
                } else {
                    busy_us as f64 / uptime_us as f64
                };

                WorkerRuntimeSnapshot {
                    worker_id,
                    tasks_processed: self.state.task_counts[worker_id].load(Ordering::Acquire),
                    tasks_failed: self.state.failure_counts[worker_id].load(Ordering::Acquire),
                    uptime: Duration::from_micros(uptime_us),
                    busy: Duration::from_micros(busy_us),
                    idle: Duration::from_micros(uptime_us.saturating_sub(busy_us)),
                    utilization,
                }
            })
            .collect();

        PoolRuntimeSnapshot {
            elapsed,
            completed: self.completed_count(),
            failed: self.failed_count(),
            workers,
        }
    }

    /// Joins every worker thread.
    ///
    /// Blocks until each worker has consumed its stop sentinel (or seen its
    /// queues hang up). Calling it again after a successful join is a no-op.
    ///
    /// # Errors
    /// Returns [`UpscaleError::WorkerPanicked`] for the first worker whose
    /// thread panicked outside the guarded transform call.
    pub fn join(&mut self) -> Result<()> {
        let mut first_error = None;
        for handle in self.worker_handles.drain(..) {
            if let Err(payload) = handle.join() {
                first_error.get_or_insert(UpscaleError::WorkerPanicked(panic_message(
                    payload.as_ref(),
                )));
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn run_worker_loop<T, F>(
    worker_id: usize,
    state: Arc<WorkerPoolState>,
    transform: Arc<F>,
    inbox: QueueConsumer<WorkerMessage<T>>,
    outbox: QueueProducer<WorkerOutput<T>>,
) where
    T: Send,
    F: FrameTransform<T> + ?Sized,
{
    state.mark_offset(&state.worker_started_offsets_us, worker_id);

    while let Some(message) = inbox.get() {
        let WorkerMessage::Work(item) = message else {
            tracing::debug!(target: tags::TARGET_WORKER, worker_id, "stop sentinel received");
            break;
        };

        state.telemetry.on_queue_depth(worker_id, inbox.len());
        let (sequence, unit) = item.into_parts();
        state.telemetry.on_task_started(worker_id, sequence);
        let started_at = Instant::now();

        let outcome = match catch_unwind(AssertUnwindSafe(|| transform.apply(unit))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(UpscaleError::WorkerPanicked(panic_message(payload.as_ref()))),
        };

        let elapsed = started_at.elapsed();
        state.worker_busy_us[worker_id].fetch_add(elapsed_us(elapsed), Ordering::AcqRel);
        state.task_counts[worker_id].fetch_add(1, Ordering::AcqRel);

        let output = match outcome {
            Ok(unit) => {
                state.telemetry.on_task_finished(worker_id, sequence, elapsed);
                state.completed.fetch_add(1, Ordering::AcqRel);
                WorkerOutput::Completed(WorkItem::new(sequence, unit))
            }
            Err(error) => {
                state.telemetry.on_task_failed(worker_id, sequence, elapsed);
                state.failed.fetch_add(1, Ordering::AcqRel);
                state.failure_counts[worker_id].fetch_add(1, Ordering::AcqRel);
                tracing::warn!(
                    target: tags::TARGET_WORKER,
                    worker_id,
                    sequence,
                    %error,
                    "frame dropped after transform failure"
                );
                WorkerOutput::Skipped {
                    sequence,
                    reason: error.to_string(),
                }
            }
        };

        if outbox.put(output).is_err() {
            tracing::debug!(
                target: tags::TARGET_WORKER,
                worker_id,
                "output queue closed; worker exiting early"
            );
            break;
        }
    }

    state.mark_offset(&state.worker_stopped_offsets_us, worker_id);
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn elapsed_us(elapsed: Duration) -> u64 {
    elapsed.as_micros().min(u64::MAX as u128) as u64
}
