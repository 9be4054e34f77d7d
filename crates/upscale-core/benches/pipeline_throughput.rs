use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use image::{Rgb, RgbImage};
use upscale_core::{
    CollectSink, Frame, FramePipeline, FrameTransform, IterSource, PipelineOptions, Result,
    Reassembler, UpscaleParams, UpscaleTransform,
};

fn bench_reassembler(c: &mut Criterion) {
    const UNITS: u64 = 4096;
    // Reverse order within blocks of 64 keeps a realistic amount buffered.
    let arrival: Vec<u64> = (0..UNITS)
        .map(|sequence| (sequence / 64) * 64 + (63 - sequence % 64))
        .collect();

    let mut group = c.benchmark_group("reassembler");
    group.throughput(Throughput::Elements(UNITS));
    group.bench_function("reverse_blocks_4096", |b| {
        b.iter(|| {
            let mut reassembler = Reassembler::new();
            let mut released = 0usize;
            for &sequence in &arrival {
                if let Ok(ready) = reassembler.submit(sequence, sequence) {
                    released += ready.len();
                }
            }
            black_box(released)
        })
    });
    group.finish();
}

fn bench_pipeline_overhead(c: &mut Criterion) {
    const UNITS: u64 = 2000;
    let mut group = c.benchmark_group("pipeline_overhead");
    group.throughput(Throughput::Elements(UNITS));

    for workers in [1usize, 2, 4, 8] {
        let pipeline = FramePipeline::new(PipelineOptions {
            workers,
            queue_capacity: 100,
            progress_interval_ms: 1000,
        });
        group.bench_with_input(BenchmarkId::from_parameter(workers), &pipeline, |b, pipeline| {
            b.iter(|| {
                pipeline
                    .run(
                        IterSource::new(0..UNITS),
                        CollectSink::new(),
                        |value: u64| -> Result<u64> { Ok(black_box(value).wrapping_mul(31)) },
                    )
                    .map(|outcome| outcome.stats.delivered)
            })
        });
    }
    group.finish();
}

fn bench_upscale_transform(c: &mut Criterion) {
    let transform =
        UpscaleTransform::new(UpscaleParams::default()).expect("default upscale params rejected");
    let frame = Frame::new(RgbImage::from_fn(64, 36, |x, y| {
        Rgb([(x * 4) as u8, (y * 7) as u8, ((x + y) * 3) as u8])
    }));

    let mut group = c.benchmark_group("upscale_transform");
    group.throughput(Throughput::Elements(1));
    group.bench_function("frame_64x36", |b| {
        b.iter(|| transform.apply(black_box(frame.clone())))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_reassembler,
    bench_pipeline_overhead,
    bench_upscale_transform
);
criterion_main!(benches);
