use std::fs;
use std::path::{Path, PathBuf};

use crate::UpscaleError;
use crate::io::{FrameSink, FrameSource};
use crate::telemetry::tags;
use crate::types::{Frame, Result};

/// File extensions recognised as frames, compared case-insensitively.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"];

/// Reads a directory of still images as an ordered frame stream.
///
/// Frames are ordered by file name, so zero-padded names such as
/// `frame_000001.png` sort in playback order.
#[derive(Debug)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    cursor: usize,
}

impl ImageSequenceSource {
    /// Lists the supported image files directly inside `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|error| {
            UpscaleError::from(error).with_context(format!("reading {}", dir.display()))
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if has_supported_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        tracing::info!(
            target: tags::TARGET_IO,
            dir = %dir.display(),
            frames = paths.len(),
            "image sequence opened"
        );
        Ok(Self::from_paths(paths))
    }

    /// Uses an explicit, already ordered list of frame files.
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self { paths, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl FrameSource<Frame> for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;

        let image = image::open(path)
            .map_err(|error| {
                UpscaleError::Source(format!("failed to decode {}: {error}", path.display()))
            })?
            .into_rgb8();
        Ok(Some(Frame::with_source(image, path.clone())))
    }

    fn len_hint(&self) -> Option<u64> {
        Some(self.paths.len() as u64)
    }
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| supported.eq_ignore_ascii_case(ext))
        })
}

/// Writes delivered frames as a numbered PNG sequence.
///
/// Output names count written frames, not sequence numbers, so the sequence
/// stays contiguous on disk even when dropped frames left gaps.
#[derive(Debug)]
pub struct ImageSequenceSink {
    output_dir: PathBuf,
    written: u64,
    completed: bool,
}

impl ImageSequenceSink {
    /// Creates `output_dir` (and parents) if needed.
    pub fn create(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).map_err(|error| {
            UpscaleError::from(error).with_context(format!("creating {}", output_dir.display()))
        })?;
        Ok(Self {
            output_dir,
            written: 0,
            completed: false,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Path the next delivered frame will be written to.
    pub fn next_path(&self) -> PathBuf {
        self.output_dir.join(format!("frame_{:06}.png", self.written))
    }
}

impl FrameSink<Frame> for ImageSequenceSink {
    fn deliver(&mut self, sequence: u64, frame: Frame) -> Result<()> {
        if self.completed {
            return Err(UpscaleError::Sink(
                "frame delivered after the sequence was completed".to_string(),
            ));
        }

        let path = self.next_path();
        frame.image.save(&path).map_err(|error| {
            UpscaleError::Sink(format!("failed to write {}: {error}", path.display()))
        })?;
        tracing::trace!(target: tags::TARGET_IO, sequence, path = %path.display(), "frame written");
        self.written += 1;
        Ok(())
    }

    fn complete(&mut self) -> Result<()> {
        if !self.completed {
            self.completed = true;
            tracing::info!(
                target: tags::TARGET_IO,
                dir = %self.output_dir.display(),
                frames = self.written,
                "image sequence written"
            );
        }
        Ok(())
    }
}
