pub mod coordinator;
pub mod ordered_sink;
pub mod reassembler;
pub mod source;
pub mod types;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub use coordinator::{PipelinePhase, ShutdownCoordinator, ShutdownReport};
pub use ordered_sink::OrderedSink;
pub use reassembler::Reassembler;
pub use source::WorkItemSource;
pub use types::{
    FnProgressSink, NoopProgress, PipelineOptions, PipelineOutcome, PipelineProgressSnapshot,
    PipelineRunStats, ProgressSink,
};

use crate::UpscaleError;
use crate::core::worker_pool::panic_message;
use crate::core::{
    BoundedQueue, QueueConsumer, QueueProducer, QueueRecv, WorkerPool, WorkerPoolHandle,
};
use crate::io::{FrameSink, FrameSource};
use crate::telemetry::tags;
use crate::telemetry::worker::{DefaultWorkerTelemetry, WorkerTelemetry};
use crate::transform::FrameTransform;
use crate::types::{Result, WorkerMessage, WorkerOutput};

/// Ordered parallel frame pipeline.
///
/// A feeder thread pulls units from the source, stamps them with sequence
/// numbers and pushes them into the bounded input queue. `W` workers
/// transform them concurrently and push outcomes into the bounded output
/// queue. The calling thread drains that queue through a [`Reassembler`] and
/// delivers results to the sink in strictly increasing sequence order.
///
/// Both queues hold at most `queue_capacity` items, so at most
/// `2 * queue_capacity + workers` units are in flight at any time.
#[derive(Clone)]
pub struct FramePipeline {
    options: PipelineOptions,
    worker_telemetry: Arc<dyn WorkerTelemetry>,
}

impl Default for FramePipeline {
    fn default() -> Self {
        Self::new(PipelineOptions::default())
    }
}

impl fmt::Debug for FramePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramePipeline")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl FramePipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self::with_worker_telemetry(options, Arc::new(DefaultWorkerTelemetry))
    }

    /// Creates a pipeline whose workers report through `worker_telemetry`.
    pub fn with_worker_telemetry(
        options: PipelineOptions,
        worker_telemetry: Arc<dyn WorkerTelemetry>,
    ) -> Self {
        Self {
            options,
            worker_telemetry,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Runs the pipeline to completion without progress reporting.
    pub fn run<T, S, K, F>(&self, source: S, sink: K, transform: F) -> Result<PipelineOutcome<K>>
    where
        T: Send + 'static,
        S: FrameSource<T> + 'static,
        K: FrameSink<T>,
        F: FrameTransform<T> + 'static,
    {
        self.run_with(source, sink, transform, &mut NoopProgress)
    }

    /// Runs the pipeline to completion, reporting progress to `progress`.
    ///
    /// # Errors
    /// Invalid options are rejected before any thread starts. A source
    /// failure, a sink failure or a panic outside a transform tears the run
    /// down; the sink is not completed in that case. Transform failures are
    /// not errors: the frame is dropped and the run continues.
    pub fn run_with<T, S, K, F, P>(
        &self,
        source: S,
        sink: K,
        transform: F,
        progress: &mut P,
    ) -> Result<PipelineOutcome<K>>
    where
        T: Send + 'static,
        S: FrameSource<T> + 'static,
        K: FrameSink<T>,
        F: FrameTransform<T> + 'static,
        P: ProgressSink + ?Sized,
    {
        self.options.validate()?;
        let workers = self.options.workers;
        let frames_total = source.len_hint();

        let (inbox_tx, inbox_rx) =
            BoundedQueue::<WorkerMessage<T>>::new(self.options.queue_capacity)?.split();
        let (outbox_tx, outbox_rx) =
            BoundedQueue::<WorkerOutput<T>>::new(self.options.queue_capacity)?.split();

        let mut handle = WorkerPool::with_telemetry(workers, Arc::clone(&self.worker_telemetry))?
            .spawn(inbox_rx, outbox_tx, transform)?;
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let produced = Arc::new(AtomicU64::new(0));

        tracing::info!(
            target: tags::TARGET_PIPELINE,
            workers,
            queue_capacity = self.options.queue_capacity,
            frames_total,
            "pipeline started"
        );

        let feeder = {
            let coordinator = Arc::clone(&coordinator);
            let produced = Arc::clone(&produced);
            thread::Builder::new()
                .name("upscale-feeder".to_string())
                .spawn(move || feed(source, inbox_tx, &coordinator, &produced, workers))
        };
        let feeder = match feeder {
            Ok(feeder) => feeder,
            Err(error) => {
                drop(outbox_rx);
                let _ = handle.join();
                return Err(UpscaleError::from(error).with_context("spawning feeder thread"));
            }
        };

        let started_at = Instant::now();
        let mut reporter = ProgressReporter {
            started_at,
            last_emit_at: started_at,
            frames_total,
            produced: produced.as_ref(),
        };
        let emit_every = self.options.progress_interval();
        let mut reassembler = Reassembler::new();
        let mut sink = OrderedSink::new(sink);

        let drained = loop {
            match outbox_rx.get_timeout(emit_every) {
                QueueRecv::Item(output) => {
                    let delivered = reassembler
                        .accept(output)
                        .and_then(|ready| deliver_ready(ready, &mut sink));
                    if let Err(error) = delivered {
                        break Err(error);
                    }
                }
                QueueRecv::Empty => {}
                QueueRecv::Closed => break Ok(()),
            }
            reporter.emit_if_due(&handle, &reassembler, &sink, emit_every, false, progress);
        };
        if let Err(error) = drained {
            return Err(abort(error, outbox_rx, &mut handle, feeder));
        }

        // Every worker has hung up without a drain: either the feeder dropped
        // the input queue after a source failure, or the workers died outside
        // their transform. A worker panic takes precedence.
        if coordinator.phase() == PipelinePhase::Running {
            let joined = handle.join();
            let fed = join_feeder(feeder);
            joined?;
            let error = match fed {
                Err(error) => error,
                Ok(_) => UpscaleError::Source(
                    "input queue closed before the source was exhausted".to_string(),
                ),
            };
            return Err(error);
        }

        let finished = coordinator.finish(&mut handle, &outbox_rx, &mut reassembler, &mut sink);
        let report = match finished {
            Ok(report) => report.unwrap_or_default(),
            Err(error) => return Err(abort(error, outbox_rx, &mut handle, feeder)),
        };
        let produced_total = join_feeder(feeder)?;

        reporter.emit_if_due(&handle, &reassembler, &sink, emit_every, true, progress);

        let runtime = handle.runtime_snapshot();
        let stats = PipelineRunStats {
            elapsed: started_at.elapsed(),
            produced: produced_total,
            delivered: sink.delivered(),
            skipped: reassembler.skipped_total(),
            flushed: report.flushed as u64,
            gaps: sink.gaps(),
            workers: runtime.workers,
        };
        tracing::info!(
            target: tags::TARGET_PIPELINE,
            produced = stats.produced,
            delivered = stats.delivered,
            skipped = stats.skipped,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "pipeline finished"
        );

        Ok(PipelineOutcome {
            sink: sink.into_inner(),
            stats,
        })
    }
}

/// Hands every released unit to the sink, stopping at the first failure.
pub(crate) fn deliver_ready<T, S>(ready: Vec<(u64, T)>, sink: &mut OrderedSink<S>) -> Result<()>
where
    S: FrameSink<T>,
{
    for (sequence, unit) in ready {
        sink.deliver(sequence, unit)?;
    }
    Ok(())
}

fn feed<T, S>(
    source: S,
    inbox: QueueProducer<WorkerMessage<T>>,
    coordinator: &ShutdownCoordinator,
    produced: &AtomicU64,
    workers: usize,
) -> Result<u64>
where
    S: FrameSource<T>,
{
    let mut items = WorkItemSource::new(source);
    loop {
        match items.next_item() {
            Ok(Some(item)) => {
                let sequence = item.sequence;
                if inbox.put(WorkerMessage::Work(item)).is_err() {
                    return Err(UpscaleError::Source(format!(
                        "input queue closed before frame {sequence} was queued"
                    )));
                }
                produced.store(items.produced(), Ordering::Release);
            }
            Ok(None) => break,
            Err(error) => {
                tracing::error!(target: tags::TARGET_PIPELINE, %error, "source failed");
                // Dropping `inbox` lets the workers run dry and hang up.
                return Err(error);
            }
        }
    }

    coordinator.begin_draining(&inbox, workers);
    Ok(items.produced())
}

fn join_feeder(feeder: JoinHandle<Result<u64>>) -> Result<u64> {
    feeder
        .join()
        .map_err(|payload| UpscaleError::WorkerPanicked(panic_message(payload.as_ref())))?
}

/// Fatal teardown: hang up the output queue so every worker and the feeder
/// unwind, join them, and hand back the error that caused it.
fn abort<T>(
    error: UpscaleError,
    outputs: QueueConsumer<WorkerOutput<T>>,
    handle: &mut WorkerPoolHandle,
    feeder: JoinHandle<Result<u64>>,
) -> UpscaleError {
    tracing::error!(target: tags::TARGET_PIPELINE, %error, "pipeline aborted");
    drop(outputs);
    let _ = handle.join();
    let _ = join_feeder(feeder);
    error
}

struct ProgressReporter<'a> {
    started_at: Instant,
    last_emit_at: Instant,
    frames_total: Option<u64>,
    produced: &'a AtomicU64,
}

impl ProgressReporter<'_> {
    fn emit_if_due<T, S, P>(
        &mut self,
        handle: &WorkerPoolHandle,
        reassembler: &Reassembler<T>,
        sink: &OrderedSink<S>,
        emit_every: Duration,
        force: bool,
        progress: &mut P,
    ) where
        P: ProgressSink + ?Sized,
    {
        if !force && self.last_emit_at.elapsed() < emit_every {
            return;
        }
        progress.on_progress(PipelineProgressSnapshot {
            elapsed: self.started_at.elapsed(),
            frames_total: self.frames_total,
            produced: self.produced.load(Ordering::Acquire),
            delivered: sink.delivered(),
            skipped: reassembler.skipped_total(),
            buffered: reassembler.pending_len(),
            next_out: reassembler.next_expected(),
            runtime: handle.runtime_snapshot(),
        });
        self.last_emit_at = Instant::now();
    }
}
