use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::UpscaleError;
use crate::core::{
    DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS, PoolRuntimeSnapshot, WorkerRuntimeSnapshot,
};
use crate::types::Result;

/// Knobs consumed by the pipeline core.
///
/// Transform parameters are configured on the transform itself; the core
/// never interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineOptions {
    /// Number of concurrent transform workers.
    pub workers: usize,
    /// Capacity of both the input and the output queue, in frames.
    pub queue_capacity: usize,
    /// Interval between progress snapshots, in milliseconds.
    pub progress_interval_ms: u64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            progress_interval_ms: 250,
        }
    }
}

impl PipelineOptions {
    /// Rejects settings that could never run; called before any thread starts.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(UpscaleError::InvalidConfig(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(UpscaleError::InvalidConfig(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(10))
    }
}

/// Point-in-time view of a running pipeline.
#[derive(Debug, Clone)]
pub struct PipelineProgressSnapshot {
    pub elapsed: Duration,
    /// Frame count reported by the source up front, when known.
    pub frames_total: Option<u64>,
    /// Sequence numbers handed out by the source so far.
    pub produced: u64,
    pub delivered: u64,
    pub skipped: u64,
    /// Results waiting in the reassembly buffer for an earlier frame.
    pub buffered: usize,
    pub next_out: u64,
    pub runtime: PoolRuntimeSnapshot,
}

/// Receives progress snapshots while a pipeline runs.
pub trait ProgressSink {
    fn on_progress(&mut self, snapshot: PipelineProgressSnapshot);
}

/// Progress sink that discards every snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&mut self, _snapshot: PipelineProgressSnapshot) {}
}

/// Adapts a closure into a [`ProgressSink`].
pub struct FnProgressSink<F>(pub F);

impl<F> ProgressSink for FnProgressSink<F>
where
    F: FnMut(PipelineProgressSnapshot),
{
    fn on_progress(&mut self, snapshot: PipelineProgressSnapshot) {
        (self.0)(snapshot);
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct PipelineRunStats {
    pub elapsed: Duration,
    pub produced: u64,
    pub delivered: u64,
    /// Frames dropped after a transform failure.
    pub skipped: u64,
    /// Frames delivered by the shutdown flush rather than the contiguous path.
    pub flushed: u64,
    /// Sequence numbers missing from the delivered stream.
    pub gaps: u64,
    pub workers: Vec<WorkerRuntimeSnapshot>,
}

/// Sink handed back together with the run summary.
#[derive(Debug)]
pub struct PipelineOutcome<K> {
    pub sink: K,
    pub stats: PipelineRunStats,
}
