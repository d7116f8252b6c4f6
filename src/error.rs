//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Converts underlying I/O, serialization, and memory-print errors, and provides
//! semantic variants for argument validation.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Memory print error: {0}")]
    MemoryPrint(#[from] crate::core::memory::MemoryPrintError),

    #[error("Descriptor error: {0}")]
    Descriptor(#[from] serde_json::Error),

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },
}
