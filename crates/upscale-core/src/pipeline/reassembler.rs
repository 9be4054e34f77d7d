use std::collections::{BTreeMap, BTreeSet};

use crate::UpscaleError;
use crate::telemetry;
use crate::telemetry::tags;
use crate::types::{Result, WorkerOutput};

/// Restores sequence order for results that complete out of order.
///
/// Results are held in a `BTreeMap` until the next expected sequence number
/// (`next_out`) arrives, at which point the whole contiguous run starting at
/// `next_out` is released. Numbers reported as skipped never enter the map;
/// the release pass steps over them so a failed frame leaves a one-frame gap
/// instead of stalling delivery.
#[derive(Debug)]
pub struct Reassembler<T> {
    next_out: u64,
    pending: BTreeMap<u64, T>,
    skipped: BTreeSet<u64>,
    skipped_total: u64,
}

impl<T> Default for Reassembler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Reassembler<T> {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a reassembler whose first expected sequence number is `next_out`.
    pub fn starting_at(next_out: u64) -> Self {
        Self {
            next_out,
            pending: BTreeMap::new(),
            skipped: BTreeSet::new(),
            skipped_total: 0,
        }
    }

    /// Inserts a completed unit and returns every unit that became releasable,
    /// in sequence order.
    ///
    /// # Errors
    /// Returns an error if `sequence` was already released or is already known,
    /// or if it is `u64::MAX`.
    pub fn submit(&mut self, sequence: u64, unit: T) -> Result<Vec<(u64, T)>> {
        self.check_new(sequence)?;
        self.pending.insert(sequence, unit);
        Ok(self.release())
    }

    /// Records that `sequence` will never arrive and returns any units that
    /// became releasable as a result.
    pub fn skip(&mut self, sequence: u64) -> Result<Vec<(u64, T)>> {
        self.check_new(sequence)?;
        self.skipped.insert(sequence);
        self.skipped_total += 1;
        Ok(self.release())
    }

    /// Routes a worker output to [`submit`](Self::submit) or [`skip`](Self::skip).
    pub fn accept(&mut self, output: WorkerOutput<T>) -> Result<Vec<(u64, T)>> {
        match output {
            WorkerOutput::Completed(item) => {
                let (sequence, unit) = item.into_parts();
                self.submit(sequence, unit)
            }
            WorkerOutput::Skipped { sequence, .. } => self.skip(sequence),
        }
    }

    /// Drains every buffered unit sorted by sequence number, ignoring gaps.
    ///
    /// Afterwards `next_out` points one past the highest sequence number the
    /// reassembler has seen, so nothing flushed can be released again.
    pub fn flush(&mut self) -> Vec<(u64, T)> {
        let highest_pending = self.pending.keys().next_back().copied();
        let highest_skipped = self.skipped.iter().next_back().copied();
        if let Some(highest) = highest_pending.max(highest_skipped) {
            self.next_out = self.next_out.max(highest.saturating_add(1));
        }
        self.skipped.clear();

        let flushed: Vec<(u64, T)> = std::mem::take(&mut self.pending).into_iter().collect();
        if !flushed.is_empty() {
            tracing::debug!(
                target: tags::TARGET_REASSEMBLY,
                flushed = flushed.len(),
                next_out = self.next_out,
                "forced flush of non-contiguous results"
            );
        }
        telemetry::increment_counter(tags::METRIC_REASSEMBLY_FLUSH_COUNT, flushed.len() as u64);
        telemetry::set_gauge(tags::METRIC_REASSEMBLY_BUFFERED, 0);
        flushed
    }

    /// Returns the next sequence number the sink expects.
    pub fn next_expected(&self) -> u64 {
        self.next_out
    }

    /// Number of units waiting for an earlier sequence number.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Total sequence numbers reported as skipped so far.
    pub fn skipped_total(&self) -> u64 {
        self.skipped_total
    }

    fn check_new(&self, sequence: u64) -> Result<()> {
        // `next_out` must be able to step past every accepted number.
        if sequence < self.next_out || sequence == u64::MAX {
            return Err(UpscaleError::InvalidSequence {
                expected: self.next_out,
                actual: sequence,
            });
        }
        if self.pending.contains_key(&sequence) || self.skipped.contains(&sequence) {
            return Err(UpscaleError::DuplicateSequence(sequence));
        }
        Ok(())
    }

    fn release(&mut self) -> Vec<(u64, T)> {
        let mut ready = Vec::new();
        loop {
            if let Some(unit) = self.pending.remove(&self.next_out) {
                ready.push((self.next_out, unit));
            } else if !self.skipped.remove(&self.next_out) {
                break;
            }
            self.next_out = self.next_out.saturating_add(1);
        }
        telemetry::set_gauge(tags::METRIC_REASSEMBLY_BUFFERED, self.pending.len() as u64);
        ready
    }
}
