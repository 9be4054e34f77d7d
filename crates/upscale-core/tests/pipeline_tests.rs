use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use upscale_core::{
    CollectSink, FnProgressSink, FramePipeline, FrameSink, FrameSource, IterSource,
    PipelineOptions, PipelineProgressSnapshot, Result, UpscaleError, WorkerTelemetry,
};

type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

fn options(workers: usize, queue_capacity: usize) -> PipelineOptions {
    PipelineOptions {
        workers,
        queue_capacity,
        progress_interval_ms: 10,
    }
}

/// Counts how many units the pipeline has pulled and can fail at a given position.
struct CountingSource {
    next: u64,
    total: u64,
    fail_at: Option<u64>,
    pulled: Arc<AtomicU64>,
}

impl CountingSource {
    fn new(total: u64) -> (Self, Arc<AtomicU64>) {
        let pulled = Arc::new(AtomicU64::new(0));
        let source = Self {
            next: 0,
            total,
            fail_at: None,
            pulled: Arc::clone(&pulled),
        };
        (source, pulled)
    }
}

impl FrameSource<u64> for CountingSource {
    fn next_frame(&mut self) -> Result<Option<u64>> {
        if Some(self.next) == self.fail_at {
            return Err(UpscaleError::Source("camera unplugged".to_string()));
        }
        if self.next == self.total {
            return Ok(None);
        }
        let unit = self.next;
        self.next += 1;
        self.pulled.fetch_add(1, Ordering::SeqCst);
        Ok(Some(unit))
    }

    fn len_hint(&self) -> Option<u64> {
        Some(self.total)
    }
}

#[derive(Debug, Default)]
struct SinkLog {
    delivered: Vec<u64>,
    completed: bool,
}

/// Records into shared state so the log survives a failed run.
struct SharedSink {
    log: Arc<Mutex<SinkLog>>,
    fail_at: Option<u64>,
}

impl SharedSink {
    fn new() -> (Self, Arc<Mutex<SinkLog>>) {
        let log = Arc::new(Mutex::new(SinkLog::default()));
        let sink = Self {
            log: Arc::clone(&log),
            fail_at: None,
        };
        (sink, log)
    }
}

impl FrameSink<u64> for SharedSink {
    fn deliver(&mut self, sequence: u64, _unit: u64) -> Result<()> {
        if Some(sequence) == self.fail_at {
            return Err(UpscaleError::Sink("disk full".to_string()));
        }
        self.log
            .lock()
            .expect("sink log poisoned")
            .delivered
            .push(sequence);
        Ok(())
    }

    fn complete(&mut self) -> Result<()> {
        self.log.lock().expect("sink log poisoned").completed = true;
        Ok(())
    }
}

#[test]
fn preserves_source_order_under_parallel_completion() -> TestResult {
    let pipeline = FramePipeline::new(options(8, 16));
    let outcome = pipeline.run(
        IterSource::new(0..500u64),
        CollectSink::new(),
        |value: u64| -> Result<u64> {
            // Later frames finish first within every block of seven.
            thread::sleep(Duration::from_micros(700 - (value % 7) * 100));
            Ok(value * 3)
        },
    )?;

    let sink = outcome.sink;
    assert!(sink.completed);
    assert_eq!(sink.sequences(), (0..500).collect::<Vec<_>>());
    assert!(sink.delivered.iter().all(|(sequence, unit)| *unit == sequence * 3));
    assert_eq!(outcome.stats.produced, 500);
    assert_eq!(outcome.stats.delivered, 500);
    assert_eq!(outcome.stats.skipped, 0);
    assert_eq!(outcome.stats.gaps, 0);
    assert_eq!(outcome.stats.workers.len(), 8);
    Ok(())
}

#[test]
fn slow_early_frame_is_held_back_until_it_completes() -> TestResult {
    let pipeline = FramePipeline::new(options(4, 8));
    let outcome = pipeline.run(
        IterSource::new(0..6u64),
        CollectSink::new(),
        |value: u64| -> Result<u64> {
            if value == 2 {
                thread::sleep(Duration::from_millis(150));
            }
            Ok(value)
        },
    )?;

    assert_eq!(outcome.sink.sequences(), vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(outcome.stats.flushed, 0);
    Ok(())
}

#[test]
fn failed_frames_leave_gaps_without_stalling() -> TestResult {
    let pipeline = FramePipeline::new(options(3, 4));
    let outcome = pipeline.run(
        IterSource::new(0..10u64),
        CollectSink::new(),
        |value: u64| -> Result<u64> {
            if value == 3 || value == 7 {
                return Err(UpscaleError::Transform(format!("frame {value} is corrupt")));
            }
            Ok(value)
        },
    )?;

    assert_eq!(outcome.sink.sequences(), vec![0, 1, 2, 4, 5, 6, 8, 9]);
    assert!(outcome.sink.completed);
    assert_eq!(outcome.stats.skipped, 2);
    assert_eq!(outcome.stats.gaps, 2);
    assert_eq!(outcome.stats.delivered, 8);
    Ok(())
}

#[test]
fn panicking_transform_only_drops_that_frame() -> TestResult {
    let pipeline = FramePipeline::new(options(2, 4));
    let outcome = pipeline.run(
        IterSource::new(0..5u64),
        CollectSink::new(),
        |value: u64| -> Result<u64> {
            if value == 0 {
                panic!("bad header");
            }
            Ok(value)
        },
    )?;

    assert_eq!(outcome.sink.sequences(), vec![1, 2, 3, 4]);
    assert_eq!(outcome.stats.skipped, 1);
    Ok(())
}

#[test]
fn empty_source_completes_sink() -> TestResult {
    let pipeline = FramePipeline::default();
    let outcome = pipeline.run(
        IterSource::new(std::iter::empty::<u64>()),
        CollectSink::new(),
        |value: u64| -> Result<u64> { Ok(value) },
    )?;

    assert!(outcome.sink.completed);
    assert!(outcome.sink.delivered.is_empty());
    assert_eq!(outcome.stats.produced, 0);
    Ok(())
}

#[test]
fn source_stalls_while_workers_are_blocked() -> TestResult {
    const WORKERS: usize = 2;
    const CAPACITY: usize = 3;

    let gate = Arc::new((Mutex::new(false), Condvar::new()));
    let (source, pulled) = CountingSource::new(100);

    let worker_gate = Arc::clone(&gate);
    let transform = move |value: u64| -> Result<u64> {
        let (open, signal) = &*worker_gate;
        let mut open = open.lock().expect("gate poisoned");
        while !*open {
            open = signal.wait(open).expect("gate poisoned");
        }
        Ok(value)
    };

    let run = thread::spawn(move || {
        FramePipeline::new(options(WORKERS, CAPACITY)).run(source, CollectSink::new(), transform)
    });

    thread::sleep(Duration::from_millis(200));
    let pulled_while_blocked = pulled.load(Ordering::SeqCst);
    // One unit per blocked worker, a full input queue, and one held by the feeder.
    assert!(pulled_while_blocked <= (CAPACITY + WORKERS + 1) as u64);
    assert!(pulled_while_blocked >= CAPACITY as u64);

    {
        let (open, signal) = &*gate;
        *open.lock().expect("gate poisoned") = true;
        signal.notify_all();
    }

    let outcome = run.join().map_err(|_| "pipeline thread panicked")??;
    assert_eq!(outcome.sink.sequences(), (0..100).collect::<Vec<_>>());
    assert_eq!(pulled.load(Ordering::SeqCst), 100);
    Ok(())
}

#[test]
fn source_failure_aborts_without_completing_sink() {
    let (mut source, _pulled) = CountingSource::new(50);
    source.fail_at = Some(5);
    let (sink, log) = SharedSink::new();

    let result = FramePipeline::new(options(2, 2)).run(source, sink, |value: u64| -> Result<u64> {
        Ok(value)
    });

    match result {
        Err(UpscaleError::Context { context, source }) => {
            assert_eq!(context, "reading frame 5");
            assert!(matches!(*source, UpscaleError::Source(_)));
        }
        other => panic!("unexpected result: {:?}", other.map(|outcome| outcome.stats)),
    }

    let log = log.lock().expect("sink log poisoned");
    assert!(!log.completed);
    assert!(log.delivered.iter().all(|sequence| *sequence < 5));
}

#[test]
fn sink_failure_tears_down_a_busy_pipeline() {
    let (source, pulled) = CountingSource::new(10_000);
    let (mut sink, log) = SharedSink::new();
    sink.fail_at = Some(3);

    let result = FramePipeline::new(options(4, 4)).run(source, sink, |value: u64| -> Result<u64> {
        Ok(value)
    });

    match result {
        Err(UpscaleError::Context { context, .. }) => assert_eq!(context, "delivering frame 3"),
        other => panic!("unexpected result: {:?}", other.map(|outcome| outcome.stats)),
    }

    let log = log.lock().expect("sink log poisoned");
    assert_eq!(log.delivered, vec![0, 1, 2]);
    assert!(!log.completed);
    assert!(pulled.load(Ordering::SeqCst) < 10_000);
}

/// Worker telemetry backend that takes down whichever worker calls it.
struct FailingTelemetry;

impl WorkerTelemetry for FailingTelemetry {
    fn on_queue_depth(&self, _worker_id: usize, _depth: usize) {
        panic!("metrics backend unavailable");
    }

    fn on_task_started(&self, _worker_id: usize, _sequence: u64) {}

    fn on_task_finished(&self, _worker_id: usize, _sequence: u64, _elapsed: Duration) {}

    fn on_task_failed(&self, _worker_id: usize, _sequence: u64, _elapsed: Duration) {}
}

#[test]
fn worker_death_outside_transform_is_reported_as_panic() {
    let (source, pulled) = CountingSource::new(1_000);
    let (sink, log) = SharedSink::new();
    let pipeline = FramePipeline::with_worker_telemetry(options(2, 2), Arc::new(FailingTelemetry));

    let result = pipeline.run(source, sink, |value: u64| -> Result<u64> { Ok(value) });

    match result {
        Err(UpscaleError::WorkerPanicked(message)) => {
            assert!(message.contains("metrics backend unavailable"))
        }
        other => panic!("unexpected result: {:?}", other.map(|outcome| outcome.stats)),
    }
    assert!(!log.lock().expect("sink log poisoned").completed);
    assert!(pulled.load(Ordering::SeqCst) < 1_000);
}

#[test]
fn invalid_options_are_rejected_before_polling_the_source() {
    for bad in [options(0, 4), options(4, 0)] {
        let (source, pulled) = CountingSource::new(10);
        let result = FramePipeline::new(bad).run(
            source,
            CollectSink::new(),
            |value: u64| -> Result<u64> { Ok(value) },
        );
        assert!(matches!(result, Err(UpscaleError::InvalidConfig(_))));
        assert_eq!(pulled.load(Ordering::SeqCst), 0);
    }
}

#[test]
fn reports_progress_and_a_final_snapshot() -> TestResult {
    let snapshots = Arc::new(Mutex::new(Vec::<PipelineProgressSnapshot>::new()));
    let recorded = Arc::clone(&snapshots);
    let mut progress = FnProgressSink(move |snapshot: PipelineProgressSnapshot| {
        recorded.lock().expect("snapshots poisoned").push(snapshot);
    });

    let outcome = FramePipeline::new(options(2, 4)).run_with(
        IterSource::new(0..40u64),
        CollectSink::new(),
        |value: u64| -> Result<u64> {
            thread::sleep(Duration::from_millis(2));
            Ok(value)
        },
        &mut progress,
    )?;
    assert_eq!(outcome.stats.delivered, 40);

    let snapshots = snapshots.lock().expect("snapshots poisoned");
    let last = snapshots.last().ok_or("no progress snapshot emitted")?;
    assert_eq!(last.frames_total, Some(40));
    assert_eq!(last.produced, 40);
    assert_eq!(last.delivered, 40);
    assert_eq!(last.buffered, 0);
    assert_eq!(last.next_out, 40);
    assert_eq!(last.runtime.processed(), 40);
    assert!(
        snapshots
            .windows(2)
            .all(|pair| pair[0].delivered <= pair[1].delivered)
    );
    Ok(())
}
