use crate::UpscaleError;
use crate::io::FrameSink;
use crate::telemetry;
use crate::telemetry::tags;
use crate::types::Result;

/// Guards a [`FrameSink`] against reordering and counts gaps.
///
/// Every delivered sequence number must be strictly greater than the
/// previous one. Gaps are allowed; each missing number is logged and counted.
#[derive(Debug)]
pub struct OrderedSink<S> {
    inner: S,
    last_delivered: Option<u64>,
    delivered: u64,
    gaps: u64,
    completed: bool,
}

impl<S> OrderedSink<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            last_delivered: None,
            delivered: 0,
            gaps: 0,
            completed: false,
        }
    }

    pub fn last_delivered(&self) -> Option<u64> {
        self.last_delivered
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Total sequence numbers missing between delivered units.
    pub fn gaps(&self) -> u64 {
        self.gaps
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<T, S: FrameSink<T>> FrameSink<T> for OrderedSink<S> {
    fn deliver(&mut self, sequence: u64, unit: T) -> Result<()> {
        let expected = match self.last_delivered {
            Some(last) if sequence <= last => {
                return Err(UpscaleError::OrderViolation {
                    last,
                    attempted: sequence,
                });
            }
            Some(last) => last + 1,
            None => 0,
        };

        if sequence > expected {
            let missing = sequence - expected;
            self.gaps += missing;
            telemetry::increment_counter(tags::METRIC_SINK_GAP_COUNT, missing);
            tracing::debug!(
                target: tags::TARGET_REASSEMBLY,
                expected,
                sequence,
                missing,
                "gap in delivered sequence"
            );
        }

        self.inner
            .deliver(sequence, unit)
            .map_err(|error| error.with_context(format!("delivering frame {sequence}")))?;
        self.last_delivered = Some(sequence);
        self.delivered += 1;
        telemetry::increment_counter(tags::METRIC_SINK_DELIVER_COUNT, 1);
        Ok(())
    }

    fn complete(&mut self) -> Result<()> {
        if self.completed {
            return Ok(());
        }
        self.inner.complete()?;
        self.completed = true;
        Ok(())
    }
}
