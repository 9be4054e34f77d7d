use std::time::Duration;

use crate::telemetry;
use crate::telemetry::tags;

/// Telemetry contract for worker runtimes.
///
/// The worker pool calls these hooks around every frame it processes so
/// metrics and logs stay independent of a specific backend.
pub trait WorkerTelemetry: Send + Sync {
    fn on_queue_depth(&self, worker_id: usize, depth: usize);
    fn on_task_started(&self, worker_id: usize, sequence: u64);
    fn on_task_finished(&self, worker_id: usize, sequence: u64, elapsed: Duration);
    fn on_task_failed(&self, worker_id: usize, sequence: u64, elapsed: Duration);
}

/// Default telemetry implementation that reports worker metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultWorkerTelemetry;

impl WorkerTelemetry for DefaultWorkerTelemetry {
    fn on_queue_depth(&self, _worker_id: usize, depth: usize) {
        telemetry::set_gauge(tags::METRIC_WORKER_QUEUE_DEPTH, depth as u64);
    }

    fn on_task_started(&self, worker_id: usize, sequence: u64) {
        telemetry::add_gauge(tags::METRIC_WORKER_ACTIVE_COUNT, 1);
        tracing::trace!(target: tags::TARGET_WORKER, worker_id, sequence, "frame started");
    }

    fn on_task_finished(&self, worker_id: usize, sequence: u64, elapsed: Duration) {
        let elapsed_us = elapsed.as_micros().min(u64::MAX as u128) as u64;

        telemetry::increment_counter(tags::METRIC_WORKER_TASK_COUNT, 1);
        telemetry::record_histogram(tags::METRIC_WORKER_TASK_LATENCY_US, elapsed_us);
        telemetry::sub_gauge_saturating(tags::METRIC_WORKER_ACTIVE_COUNT, 1);
        tracing::trace!(
            target: tags::TARGET_WORKER,
            worker_id,
            sequence,
            elapsed_us,
            "frame finished"
        );
    }

    fn on_task_failed(&self, worker_id: usize, sequence: u64, elapsed: Duration) {
        let elapsed_us = elapsed.as_micros().min(u64::MAX as u128) as u64;

        telemetry::increment_counter(tags::METRIC_WORKER_TASK_COUNT, 1);
        telemetry::increment_counter(tags::METRIC_WORKER_TASK_FAIL_COUNT, 1);
        telemetry::record_histogram(tags::METRIC_WORKER_TASK_LATENCY_US, elapsed_us);
        telemetry::sub_gauge_saturating(tags::METRIC_WORKER_ACTIVE_COUNT, 1);
        tracing::trace!(
            target: tags::TARGET_WORKER,
            worker_id,
            sequence,
            elapsed_us,
            "frame failed"
        );
    }
}
