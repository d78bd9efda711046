//! Errors that prevent an engine from being built or a query from running

use gpu_probe_types::BackendKind;
use thiserror::Error;

/// Result type for engine setup
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that abort engine construction or a whole query.
///
/// Field-level failures never surface here; they are captured in the
/// field's result.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0} backend is not available: {1}")]
    Unavailable(BackendKind, String),

    #[error("Failed to initialize {0} backend: {1}")]
    InitializationFailed(BackendKind, String),

    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error("Failed to get handle for GPU {index}: {message}")]
    DeviceHandle { index: u32, message: String },
}
