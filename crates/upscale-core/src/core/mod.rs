pub mod queue;
pub mod worker_pool;

pub use queue::{
    BoundedQueue, DEFAULT_QUEUE_CAPACITY, QueueClosed, QueueConsumer, QueueProducer, QueueRecv,
};
pub use worker_pool::{
    DEFAULT_WORKERS, PoolRuntimeSnapshot, WorkerPool, WorkerPoolHandle, WorkerRuntimeSnapshot,
};
