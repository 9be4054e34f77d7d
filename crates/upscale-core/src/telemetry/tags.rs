/// Log target for pipeline phase transitions and run summaries.
pub const TARGET_PIPELINE: &str = "upscale.pipeline";
/// Log target for worker runtime events.
pub const TARGET_WORKER: &str = "upscale.worker";
/// Log target for reassembly and sink ordering events.
pub const TARGET_REASSEMBLY: &str = "upscale.reassembly";
/// Log target for image-sequence reader and writer events.
pub const TARGET_IO: &str = "upscale.io";

pub const METRIC_SOURCE_FRAME_COUNT: &str = "upscale.source.frame.count";
pub const METRIC_SINK_DELIVER_COUNT: &str = "upscale.sink.deliver.count";
pub const METRIC_SINK_GAP_COUNT: &str = "upscale.sink.gap.count";

pub const METRIC_WORKER_TASK_COUNT: &str = "upscale.worker.task.count";
pub const METRIC_WORKER_TASK_FAIL_COUNT: &str = "upscale.worker.task.fail.count";
pub const METRIC_WORKER_TASK_LATENCY_US: &str = "upscale.worker.task.latency_us";
pub const METRIC_WORKER_QUEUE_DEPTH: &str = "upscale.worker.queue.depth";
pub const METRIC_WORKER_ACTIVE_COUNT: &str = "upscale.worker.active.count";

pub const METRIC_REASSEMBLY_BUFFERED: &str = "upscale.reassembly.buffered";
pub const METRIC_REASSEMBLY_FLUSH_COUNT: &str = "upscale.reassembly.flush.count";
