//! Per-frame transforms applied by the worker pool.

pub mod bilateral;
pub mod upscale;

pub use bilateral::{BilateralFilter, bilateral_filter};
pub use upscale::{UpscaleParams, UpscaleTransform};

use crate::types::Result;

/// An order-independent transform applied to one unit at a time.
///
/// Implementations are shared by every worker, so they must be safe to call
/// concurrently on independent units. An `Err` drops that unit from the
/// output; it never aborts the pipeline.
pub trait FrameTransform<T>: Send + Sync {
    fn apply(&self, unit: T) -> Result<T>;
}

impl<T, F> FrameTransform<T> for F
where
    F: Fn(T) -> Result<T> + Send + Sync,
{
    fn apply(&self, unit: T) -> Result<T> {
        self(unit)
    }
}
