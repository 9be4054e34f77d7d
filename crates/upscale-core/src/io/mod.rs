//! Boundary traits for the stages on either side of the pipeline core, plus
//! the image-sequence reader and writer used by the `upscale` binary.

pub mod sequence;

pub use sequence::{ImageSequenceSink, ImageSequenceSource, SUPPORTED_EXTENSIONS};

use crate::types::Result;

/// Upstream producer of units in original stream order.
pub trait FrameSource<T>: Send {
    /// Returns the next unit, or `None` once the stream is exhausted.
    ///
    /// # Errors
    /// Any error is fatal to the whole run.
    fn next_frame(&mut self) -> Result<Option<T>>;

    /// Number of units the source expects to yield, when known up front.
    fn len_hint(&self) -> Option<u64> {
        None
    }
}

/// Downstream consumer that must see strictly increasing sequence numbers.
pub trait FrameSink<T> {
    /// Accepts one unit. Gaps in `sequence` are allowed, reordering is not.
    fn deliver(&mut self, sequence: u64, unit: T) -> Result<()>;

    /// Signals that no more units will be delivered.
    fn complete(&mut self) -> Result<()>;
}

/// Adapts any iterator into a [`FrameSource`].
#[derive(Debug)]
pub struct IterSource<I> {
    iter: I,
    len_hint: Option<u64>,
}

impl<I: Iterator> IterSource<I> {
    pub fn new(iter: I) -> Self {
        let (lower, upper) = iter.size_hint();
        let len_hint = (Some(lower) == upper).then_some(lower as u64);
        Self { iter, len_hint }
    }
}

impl<T, I> FrameSource<T> for IterSource<I>
where
    I: Iterator<Item = T> + Send,
{
    fn next_frame(&mut self) -> Result<Option<T>> {
        Ok(self.iter.next())
    }

    fn len_hint(&self) -> Option<u64> {
        self.len_hint
    }
}

/// Collects delivered units in memory, mostly useful for tests and benches.
#[derive(Debug)]
pub struct CollectSink<T> {
    pub delivered: Vec<(u64, T)>,
    pub completed: bool,
}

impl<T> Default for CollectSink<T> {
    fn default() -> Self {
        Self {
            delivered: Vec::new(),
            completed: false,
        }
    }
}

impl<T> CollectSink<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sequences(&self) -> Vec<u64> {
        self.delivered.iter().map(|(sequence, _)| *sequence).collect()
    }
}

impl<T> FrameSink<T> for CollectSink<T> {
    fn deliver(&mut self, sequence: u64, unit: T) -> Result<()> {
        self.delivered.push((sequence, unit));
        Ok(())
    }

    fn complete(&mut self) -> Result<()> {
        self.completed = true;
        Ok(())
    }
}
