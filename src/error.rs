use thiserror::Error;

/// Error taxonomy for the erasure core.
///
/// Destructive paths fail closed (the caller gets a refusal); observational
/// paths fail open (the condition is recorded and the caller moves on).
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("refused: {0}")]
    SafetyRefusal(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("wipe log not found: {0}")]
    LogNotFound(String),

    #[error("platform probe failed: {0}")]
    ProbeFailure(String),

    #[error("wipe failed: {0}")]
    WipeFailed(String),

    #[error("unsupported platform")]
    UnsupportedPlatform,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Machine-readable error class surfaced to callers of the coordinator.
///
/// Mirrors the four HTTP-style buckets the presentation layer maps onto
/// status codes; the core itself never depends on an HTTP type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Safety,
    Validation,
    Conflict,
    Internal,
}

impl EngineError {
    /// Classify this error the way the request coordinator reports it to operators.
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::SafetyRefusal(_) => ErrorClass::Safety,
            EngineError::Validation(_) => ErrorClass::Validation,
            EngineError::Conflict(_) => ErrorClass::Conflict,
            EngineError::DeviceNotFound(_) => ErrorClass::Validation,
            EngineError::LogNotFound(_) => ErrorClass::Validation,
            EngineError::Io(_)
            | EngineError::Serialization(_)
            | EngineError::ProbeFailure(_)
            | EngineError::WipeFailed(_)
            | EngineError::UnsupportedPlatform => ErrorClass::Internal,
        }
    }
}
