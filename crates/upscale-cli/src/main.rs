use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;
use upscale_core::{
    FnProgressSink, FramePipeline, ImageSequenceSink, ImageSequenceSource,
    PipelineProgressSnapshot, PipelineRunStats, UpscaleConfig, UpscaleTransform,
};

#[derive(Parser)]
#[command(
    name = "upscale",
    version,
    about = "Frame sequence upscaler",
    long_about = "Upscale a directory of frames in parallel, writing results in the original order."
)]
struct Cli {
    /// Directory holding the input frames.
    input: PathBuf,

    /// Directory the upscaled frames are written to.
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Bilateral filter diameter; zero or negative derives it from --sigma-space [default: 6].
    #[arg(short = 'l', long = "level", allow_negative_numbers = true)]
    level: Option<i32>,

    /// Upscale factor applied to both dimensions [default: 2.0].
    #[arg(short, long)]
    scale: Option<f64>,

    /// Bilateral filter sigma in colour space [default: 75].
    #[arg(long)]
    sigma_color: Option<f64>,

    /// Bilateral filter sigma in coordinate space [default: 75].
    #[arg(long)]
    sigma_space: Option<f64>,

    /// Number of transform workers [default: 4].
    #[arg(long)]
    workers: Option<usize>,

    /// Capacity of the input and output queues, in frames [default: 100].
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// JSON config file; flags given on the command line take precedence.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Progress refresh interval in milliseconds [default: 250].
    #[arg(long)]
    stats_interval_ms: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn resolve_config(&self) -> Result<UpscaleConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => UpscaleConfig::load(path)?,
            None => UpscaleConfig::default(),
        };

        if let Some(level) = self.level {
            config.upscale.filter_diameter = level;
        }
        if let Some(scale) = self.scale {
            config.upscale.scale = scale;
        }
        if let Some(sigma_color) = self.sigma_color {
            config.upscale.sigma_color = sigma_color;
        }
        if let Some(sigma_space) = self.sigma_space {
            config.upscale.sigma_space = sigma_space;
        }
        if let Some(workers) = self.workers {
            config.pipeline.workers = workers;
        }
        if let Some(queue_capacity) = self.queue_capacity {
            config.pipeline.queue_capacity = queue_capacity;
        }
        if let Some(interval) = self.stats_interval_ms {
            config.pipeline.progress_interval_ms = interval;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.resolve_config()?;
    let source = ImageSequenceSource::open(&cli.input)?;
    if source.is_empty() {
        tracing::warn!("no supported frames found in {}", cli.input.display());
    }
    let frames_total = source.len() as u64;
    let sink = ImageSequenceSink::create(&cli.output)?;
    let transform = UpscaleTransform::new(config.upscale)?;
    let pipeline = FramePipeline::new(config.pipeline.clone());

    eprintln!(
        "upscaling {frames_total} frames from {} with {} workers (queue capacity {})...",
        cli.input.display(),
        config.pipeline.workers,
        config.pipeline.queue_capacity,
    );

    let mut last_delivered = 0u64;
    let mut last_elapsed = Duration::ZERO;
    let mut peak_fps = 0.0f64;
    let started_at = Instant::now();

    let mut progress = FnProgressSink(|snapshot: PipelineProgressSnapshot| {
        let elapsed = snapshot.elapsed;
        let total = snapshot.frames_total.unwrap_or(snapshot.produced);
        let done = snapshot.delivered + snapshot.skipped;
        let elapsed_secs = elapsed.as_secs_f64().max(1e-6);

        let avg_fps = snapshot.delivered as f64 / elapsed_secs;
        let delta_secs = elapsed.saturating_sub(last_elapsed).as_secs_f64();
        let instant_fps = if delta_secs > 0.0 {
            snapshot.delivered.saturating_sub(last_delivered) as f64 / delta_secs
        } else {
            avg_fps
        };
        peak_fps = peak_fps.max(instant_fps);

        let remaining = total.saturating_sub(done);
        let eta = if avg_fps > 0.0 {
            Duration::from_secs_f64(remaining as f64 / avg_fps)
        } else {
            Duration::ZERO
        };
        let percent = if total > 0 {
            (done.min(total) as f64 / total as f64) * 100.0
        } else {
            100.0
        };
        let active_workers = snapshot
            .runtime
            .workers
            .iter()
            .filter(|worker| worker.tasks_processed > 0 || worker.busy > Duration::ZERO)
            .count();

        eprint!(
            "\r\x1b[2K[{percent:6.2}%] frames {}/{} | skipped {} | buffered {} | avg {} inst {} | ETA {} | workers {}/{}",
            snapshot.delivered,
            total,
            snapshot.skipped,
            snapshot.buffered,
            format_fps(avg_fps),
            format_fps(instant_fps),
            format_duration(eta),
            active_workers,
            snapshot.runtime.workers.len(),
        );
        let _ = io::stderr().flush();

        last_delivered = snapshot.delivered;
        last_elapsed = elapsed;
    });

    let outcome = pipeline.run_with(source, sink, transform, &mut progress)?;
    eprintln!();

    let output_bytes = measure_directory_bytes(outcome.sink.output_dir())?;
    print_summary(
        &cli.input,
        outcome.sink.output_dir(),
        &config,
        peak_fps,
        output_bytes,
        started_at.elapsed(),
        &outcome.stats,
    );
    Ok(())
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(io::stderr)
        .try_init()
        .ok();
}

fn print_summary(
    input: &Path,
    output: &Path,
    config: &UpscaleConfig,
    peak_fps: f64,
    output_bytes: u64,
    wall_time: Duration,
    stats: &PipelineRunStats,
) {
    let elapsed_secs = stats.elapsed.as_secs_f64().max(1e-6);
    let avg_fps = stats.delivered as f64 / elapsed_secs;

    println!("upscale complete");
    println!("  source: {}", input.display());
    println!("  output: {}", output.display());
    println!(
        "  transform: scale {} | filter diameter {} | sigma color {} | sigma space {}",
        config.upscale.scale,
        config.upscale.filter_diameter,
        config.upscale.sigma_color,
        config.upscale.sigma_space,
    );
    println!("  elapsed: {}", format_duration(wall_time));
    println!(
        "  frames: {} read | {} written | {} skipped | {} flushed out of order",
        stats.produced, stats.delivered, stats.skipped, stats.flushed,
    );
    if stats.gaps > 0 {
        println!("  gaps in output sequence: {}", stats.gaps);
    }
    println!("  output bytes: {}", format_bytes(output_bytes));
    println!("  throughput avg: {}", format_fps(avg_fps));
    println!("  throughput peak: {}", format_fps(peak_fps));

    let worker_count = stats.workers.len();
    let total_tasks: usize = stats
        .workers
        .iter()
        .map(|worker| worker.tasks_processed)
        .sum();
    let max_tasks = stats
        .workers
        .iter()
        .map(|worker| worker.tasks_processed)
        .max()
        .unwrap_or(0);
    let min_tasks = stats
        .workers
        .iter()
        .map(|worker| worker.tasks_processed)
        .min()
        .unwrap_or(0);
    println!(
        "  workers: {worker_count} of {} available cores | task balance min/max {min_tasks}/{max_tasks} | total processed {total_tasks}",
        num_cpus::get(),
    );
    println!("  worker runtime:");
    for worker in &stats.workers {
        println!(
            "    w{:02} processed {:>6} | failed {:>4} | busy {:>8} | idle {:>8} | util {:>6.2}%",
            worker.worker_id,
            worker.tasks_processed,
            worker.tasks_failed,
            format_duration(worker.busy),
            format_duration(worker.idle),
            worker.utilization * 100.0,
        );
    }
}

fn measure_directory_bytes(root: &Path) -> Result<u64, Box<dyn std::error::Error>> {
    let mut total = 0u64;
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            total = total.saturating_add(entry.metadata()?.len());
        }
    }
    Ok(total)
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0usize;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[unit])
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

fn format_fps(frames_per_second: f64) -> String {
    if !frames_per_second.is_finite() || frames_per_second <= 0.0 {
        return "0 fps".to_string();
    }
    if frames_per_second >= 100.0 {
        format!("{frames_per_second:.0} fps")
    } else {
        format!("{frames_per_second:.2} fps")
    }
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else if minutes > 0 {
        format!("{minutes:02}:{seconds:02}")
    } else {
        format!("{seconds}.{:03}s", duration.subsec_millis())
    }
}
