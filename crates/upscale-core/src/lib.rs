pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod telemetry;
pub mod transform;
pub mod types;

pub use config::UpscaleConfig;
pub use crate::core::{
    BoundedQueue, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS, PoolRuntimeSnapshot, QueueConsumer,
    QueueProducer, WorkerPool, WorkerPoolHandle, WorkerRuntimeSnapshot,
};
pub use error::UpscaleError;
pub use io::{
    CollectSink, FrameSink, FrameSource, ImageSequenceSink, ImageSequenceSource, IterSource,
};
pub use pipeline::{
    FnProgressSink, FramePipeline, NoopProgress, OrderedSink, PipelineOptions, PipelineOutcome,
    PipelinePhase, PipelineProgressSnapshot, PipelineRunStats, ProgressSink, Reassembler,
    ShutdownCoordinator, ShutdownReport, WorkItemSource,
};
pub use telemetry::worker::{DefaultWorkerTelemetry, WorkerTelemetry};
pub use transform::{FrameTransform, UpscaleParams, UpscaleTransform};
pub use types::{Frame, Result, WorkItem, WorkerMessage, WorkerOutput};
