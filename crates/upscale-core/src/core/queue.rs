use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};

use crate::UpscaleError;
use crate::types::Result;

/// Default capacity of the input and output queues, in items.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Fixed-capacity FIFO channel between pipeline stages.
///
/// `put` blocks while the queue is full and `get` blocks while it is empty.
/// Once split, each side hangs up independently: when every consumer is
/// dropped `put` fails, and when every producer is dropped `get` drains the
/// remaining items and then reports the queue as closed.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    producer: QueueProducer<T>,
    consumer: QueueConsumer<T>,
}

impl<T> BoundedQueue<T> {
    /// Creates a queue holding at most `capacity` items.
    ///
    /// # Errors
    /// A zero capacity is rejected: it would turn every `put` into a
    /// rendezvous and defeat the lookahead the workers rely on.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(UpscaleError::InvalidConfig(
                "queue capacity must be at least 1".to_string(),
            ));
        }

        let (sender, receiver) = bounded(capacity);
        Ok(Self {
            producer: QueueProducer { sender, capacity },
            consumer: QueueConsumer { receiver },
        })
    }

    pub fn capacity(&self) -> usize {
        self.producer.capacity
    }

    pub fn split(self) -> (QueueProducer<T>, QueueConsumer<T>) {
        (self.producer, self.consumer)
    }
}

/// Returned by [`QueueProducer::put`] when no consumer is left; hands the item back.
#[derive(Debug, PartialEq, Eq)]
pub struct QueueClosed<T>(pub T);

/// Sending half of a [`BoundedQueue`].
#[derive(Debug)]
pub struct QueueProducer<T> {
    sender: Sender<T>,
    capacity: usize,
}

impl<T> Clone for QueueProducer<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T> QueueProducer<T> {
    /// Enqueues an item, blocking while the queue is at capacity.
    pub fn put(&self, item: T) -> std::result::Result<(), QueueClosed<T>> {
        self.sender.send(item).map_err(|error| QueueClosed(error.0))
    }

    pub fn len(&self) -> usize {
        self.sender.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Outcome of a bounded wait on a queue.
#[derive(Debug, PartialEq, Eq)]
pub enum QueueRecv<T> {
    Item(T),
    /// Nothing arrived within the wait.
    Empty,
    Closed,
}

/// Receiving half of a [`BoundedQueue`].
#[derive(Debug)]
pub struct QueueConsumer<T> {
    receiver: Receiver<T>,
}

impl<T> Clone for QueueConsumer<T> {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.clone(),
        }
    }
}

impl<T> QueueConsumer<T> {
    /// Dequeues the next item, blocking while the queue is empty.
    ///
    /// Returns `None` once every producer is gone and the queue is drained.
    pub fn get(&self) -> Option<T> {
        self.receiver.recv().ok()
    }

    /// Dequeues the next item, waiting at most `timeout`.
    pub fn get_timeout(&self, timeout: Duration) -> QueueRecv<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(item) => QueueRecv::Item(item),
            Err(RecvTimeoutError::Timeout) => QueueRecv::Empty,
            Err(RecvTimeoutError::Disconnected) => QueueRecv::Closed,
        }
    }

    /// Dequeues an item only if one is immediately available.
    pub fn try_get(&self) -> QueueRecv<T> {
        match self.receiver.try_recv() {
            Ok(item) => QueueRecv::Item(item),
            Err(TryRecvError::Empty) => QueueRecv::Empty,
            Err(TryRecvError::Disconnected) => QueueRecv::Closed,
        }
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
