use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::error::UpscaleError;

pub type Result<T> = std::result::Result<T, UpscaleError>;

/// A decoded video frame travelling through the pipeline.
///
/// Frames are the concrete unit of work for the upscaler. The pipeline core
/// itself is generic and never looks inside a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub image: RgbImage,
    pub source_path: Option<PathBuf>,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            source_path: None,
        }
    }

    /// Creates a frame that remembers which file it was decoded from.
    pub fn with_source(image: RgbImage, source_path: impl Into<PathBuf>) -> Self {
        Self {
            image,
            source_path: Some(source_path.into()),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

/// A unit paired with the sequence number assigned at ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem<T> {
    pub sequence: u64,
    pub unit: T,
}

impl<T> WorkItem<T> {
    pub fn new(sequence: u64, unit: T) -> Self {
        Self { sequence, unit }
    }

    pub fn into_parts(self) -> (u64, T) {
        (self.sequence, self.unit)
    }
}

/// Message carried by the input queue.
#[derive(Debug)]
pub enum WorkerMessage<T> {
    Work(WorkItem<T>),
    /// Stop sentinel; exactly one is sent per worker.
    Stop,
}

/// Message carried by the output queue.
///
/// A skipped sequence number carries no payload: it only tells the
/// reassembler that the number will never arrive.
#[derive(Debug)]
pub enum WorkerOutput<T> {
    Completed(WorkItem<T>),
    Skipped { sequence: u64, reason: String },
}

impl<T> WorkerOutput<T> {
    pub fn sequence(&self) -> u64 {
        match self {
            Self::Completed(item) => item.sequence,
            Self::Skipped { sequence, .. } => *sequence,
        }
    }
}
