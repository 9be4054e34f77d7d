use std::sync::atomic::{AtomicU8, Ordering};

use anyhow::anyhow;

use crate::core::{QueueConsumer, QueueProducer, WorkerPoolHandle};
use crate::io::FrameSink;
use crate::pipeline::deliver_ready;
use crate::pipeline::ordered_sink::OrderedSink;
use crate::pipeline::reassembler::Reassembler;
use crate::telemetry::tags;
use crate::types::{Result, WorkerMessage, WorkerOutput};

/// Lifecycle of a pipeline run. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelinePhase {
    /// Source producing, workers consuming.
    Running = 0,
    /// Source exhausted; stop sentinels queued behind the remaining work.
    Draining = 1,
    /// Workers joined, buffer flushed, sink completed.
    Stopped = 2,
}

impl PipelinePhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// What the terminal transition had to clean up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Outputs still queued when the stop was requested.
    pub residual: usize,
    /// Units delivered by the forced flush.
    pub flushed: usize,
}

/// Drives the RUNNING -> DRAINING -> STOPPED state machine.
///
/// The coordinator is shared between the feeder thread, which starts the
/// drain, and the control thread, which performs the stop.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    phase: AtomicU8,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(PipelinePhase::Running as u8),
        }
    }

    pub fn phase(&self) -> PipelinePhase {
        PipelinePhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// RUNNING -> DRAINING: queues exactly one stop sentinel per worker.
    ///
    /// The input queue is FIFO, so every work item queued before this call is
    /// consumed before any worker sees its sentinel. Returns `false` when the
    /// pipeline already left RUNNING.
    pub fn begin_draining<T>(
        &self,
        inbox: &QueueProducer<WorkerMessage<T>>,
        workers: usize,
    ) -> bool {
        if !self.advance(PipelinePhase::Running, PipelinePhase::Draining) {
            return false;
        }

        tracing::info!(target: tags::TARGET_PIPELINE, workers, "draining worker pool");
        for sent in 0..workers {
            if inbox.put(WorkerMessage::Stop).is_err() {
                tracing::debug!(
                    target: tags::TARGET_PIPELINE,
                    sent,
                    "input queue closed while queueing stop sentinels"
                );
                break;
            }
        }
        true
    }

    /// DRAINING -> STOPPED: waits for the pool, delivers what is left, completes the sink.
    ///
    /// Residual outputs are pulled until every worker has hung up, the
    /// workers are joined, the reassembly buffer is flushed in sequence order
    /// regardless of gaps, and the sink is completed. The phase moves to
    /// STOPPED up front, so a second call (even after an error) returns
    /// `Ok(None)` without touching the sink again.
    ///
    /// # Errors
    /// Fails if called before draining started, if a worker panicked, or if
    /// the sink rejects a unit.
    pub fn finish<T, S>(
        &self,
        pool: &mut WorkerPoolHandle,
        outputs: &QueueConsumer<WorkerOutput<T>>,
        reassembler: &mut Reassembler<T>,
        sink: &mut OrderedSink<S>,
    ) -> Result<Option<ShutdownReport>>
    where
        S: FrameSink<T>,
    {
        if !self.advance(PipelinePhase::Draining, PipelinePhase::Stopped) {
            return match self.phase() {
                PipelinePhase::Running => Err(anyhow!(
                    "pipeline stop requested before the source was drained"
                )
                .into()),
                _ => Ok(None),
            };
        }

        let mut report = ShutdownReport::default();
        while let Some(output) = outputs.get() {
            report.residual += 1;
            deliver_ready(reassembler.accept(output)?, sink)?;
        }
        pool.join()?;

        let flushed = reassembler.flush();
        report.flushed = flushed.len();
        deliver_ready(flushed, sink)?;
        sink.complete()?;

        tracing::info!(
            target: tags::TARGET_PIPELINE,
            residual = report.residual,
            flushed = report.flushed,
            delivered = sink.delivered(),
            "pipeline stopped"
        );
        Ok(Some(report))
    }

    fn advance(&self, from: PipelinePhase, to: PipelinePhase) -> bool {
        self.phase
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
