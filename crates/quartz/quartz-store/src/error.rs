use quartz_layout::LayoutError;
use quartz_layout::region_layout::{
    MAX_CANDLES_PER_WRITE, MAX_REGION_SIZE, MAX_SYMBOLS, MIN_REGION_SIZE,
};
use quartz_shm::ShmError;
use std::io;

/// Failure of a writer operation.
///
/// None of these leave the region structurally inconsistent; the caller may
/// retry with other parameters or close and create again.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error("region name is empty or not representable in the shared-object namespace")]
    InvalidName,

    #[error(
        "region size {size} is outside [{min}, {max}] bytes",
        min = MIN_REGION_SIZE,
        max = MAX_REGION_SIZE
    )]
    InvalidSize { size: usize },

    #[error("failed to create shared memory region '{name}'")]
    CreateFailed {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to map shared memory region '{name}'")]
    MappingFailed {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("data section exhausted: {requested} bytes requested, {available} available")]
    WriteFailed { requested: usize, available: usize },

    #[error("symbol index is full ({} symbols)", MAX_SYMBOLS)]
    SymbolLimitExceeded,

    #[error(
        "{count} candles exceeds the per-write limit of {limit}",
        limit = MAX_CANDLES_PER_WRITE
    )]
    CandleLimitExceeded { count: usize },

    #[error("writer is not initialized")]
    NotInitialized,

    #[error("region layout violated")]
    Layout(#[from] LayoutError),
}

impl WriterError {
    pub(crate) fn from_shm(err: ShmError) -> Self {
        match err {
            ShmError::InvalidName(_) => WriterError::InvalidName,
            ShmError::Map { name, source } => WriterError::MappingFailed { name, source },
            ShmError::Create { name, source }
            | ShmError::Open { name, source }
            | ShmError::Unlink { name, source } => WriterError::CreateFailed { name, source },
        }
    }
}

/// Failure of a reader operation.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error(transparent)]
    Shm(#[from] ShmError),

    #[error("region is not readable")]
    Layout(#[from] LayoutError),

    /// The sequence stayed odd (or kept moving) for the whole spin budget.
    /// A writer that died mid-transaction leaves the region in this state.
    #[error("writer stalled: sequence {sequence} did not settle")]
    WriterStalled { sequence: u64 },
}
