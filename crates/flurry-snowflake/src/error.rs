use crate::layout::TimeUnit;
use jiff::Timestamp;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by generator configuration and ID generation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid worker id {worker_id}; expected 0..={max_worker_id}")]
    InvalidWorkerId { worker_id: u64, max_worker_id: u64 },
    #[error("invalid datacenter id {datacenter_id}; expected 0..={max_datacenter_id}")]
    InvalidDatacenterId {
        datacenter_id: u64,
        max_datacenter_id: u64,
    },
    #[error("worker id bits and datacenter id bits must be greater than 0")]
    InvalidBitWidth,
    #[error("bit widths sum to {total}; at most {max} are available in {unit} mode")]
    BitWidthOverflow { total: u32, max: u32, unit: TimeUnit },
    #[error("unsupported time unit: {0}")]
    UnsupportedTimeUnit(String),
    #[error("generator has already issued ids; its layout can no longer change")]
    AlreadyInUse,
    #[error("serial length {requested} is shorter than the natural width {natural}")]
    SerialLengthTooShort { requested: usize, natural: usize },
    #[error("epoch is ahead of current clock time: epoch={epoch}, now={now}")]
    EpochAhead { epoch: Timestamp, now: Timestamp },
    #[error("clock moved backwards; refusing to generate id for {offset} {unit}")]
    ClockMovedBackwards { offset: i64, unit: TimeUnit },
    #[error("time offset no longer fits in the timestamp field")]
    TimestampOverflow,
    #[error("generator state lock is poisoned")]
    StatePoisoned,
}

impl Error {
    /// Whether the caller may retry the same call later.
    ///
    /// Only a rejected clock regression clears up on its own; every other
    /// error is a usage or configuration mistake.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ClockMovedBackwards { .. })
    }
}
