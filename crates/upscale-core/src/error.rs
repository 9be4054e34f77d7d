use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpscaleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("transform failed: {0}")]
    Transform(String),
    #[error("source error: {0}")]
    Source(String),
    #[error("sink error: {0}")]
    Sink(String),
    #[error("invalid sequence number (expected at least {expected}, actual {actual})")]
    InvalidSequence { expected: u64, actual: u64 },
    #[error("duplicate sequence number {0} in reassembly buffer")]
    DuplicateSequence(u64),
    #[error("sink order violation (last delivered {last}, attempted {attempted})")]
    OrderViolation { last: u64, attempted: u64 },
    #[error("worker thread panicked: {0}")]
    WorkerPanicked(String),
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<UpscaleError>,
    },
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl UpscaleError {
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}
