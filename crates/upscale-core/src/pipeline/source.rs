use crate::io::FrameSource;
use crate::telemetry;
use crate::telemetry::tags;
use crate::types::{Result, WorkItem};

/// Stamps units from an upstream [`FrameSource`] with sequence numbers.
///
/// Numbers start at 0 and grow by exactly one per unit; they are never
/// reused. End of stream is sticky: once the upstream reports it, the
/// upstream is not polled again.
#[derive(Debug)]
pub struct WorkItemSource<S> {
    upstream: S,
    next_sequence: u64,
    exhausted: bool,
}

impl<S> WorkItemSource<S> {
    pub fn new(upstream: S) -> Self {
        Self {
            upstream,
            next_sequence: 0,
            exhausted: false,
        }
    }

    /// Number of sequence numbers assigned so far.
    pub fn produced(&self) -> u64 {
        self.next_sequence
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn into_inner(self) -> S {
        self.upstream
    }

    /// Pulls the next unit and assigns it the next sequence number.
    ///
    /// # Errors
    /// Upstream failures are returned with the failing position attached;
    /// they are fatal to the run.
    pub fn next_item<T>(&mut self) -> Result<Option<WorkItem<T>>>
    where
        S: FrameSource<T>,
    {
        if self.exhausted {
            return Ok(None);
        }

        let sequence = self.next_sequence;
        match self.upstream.next_frame() {
            Ok(Some(unit)) => {
                self.next_sequence += 1;
                telemetry::increment_counter(tags::METRIC_SOURCE_FRAME_COUNT, 1);
                Ok(Some(WorkItem::new(sequence, unit)))
            }
            Ok(None) => {
                self.exhausted = true;
                tracing::debug!(
                    target: tags::TARGET_PIPELINE,
                    produced = sequence,
                    "source exhausted"
                );
                Ok(None)
            }
            Err(error) => Err(error.with_context(format!("reading frame {sequence}"))),
        }
    }
}
