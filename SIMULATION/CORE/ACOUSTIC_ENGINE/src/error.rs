//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: error.rs | SIMULATION/CORE/ACOUSTIC_ENGINE/src/error.rs
//! PURPOSE: Error surface of the acoustic engine
//! MODIFIED: 2026-07-18
//! ═══════════════════════════════════════════════════════════════════════════════

use std::fmt;

/// Error type for all public engine operations
#[derive(Debug)]
pub enum SimError {
    /// Precondition violated at construction (parameter ranges, bounds)
    InvalidParameters(String),
    /// Persisted grid does not match the expected dimensions
    DimensionMismatch(String),
    /// Underlying file-system failure
    IoFailure(String),
    /// Bounded persistence queue rejected a frame
    QueueFull,
    /// Run was cancelled cooperatively
    Cancelled,
    /// Persisted data failed magic/version/structure checks
    Corrupted(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::InvalidParameters(s) => write!(f, "invalid parameters: {}", s),
            SimError::DimensionMismatch(s) => write!(f, "dimension mismatch: {}", s),
            SimError::IoFailure(s) => write!(f, "I/O failure: {}", s),
            SimError::QueueFull => write!(f, "persistence queue full"),
            SimError::Cancelled => write!(f, "cancelled"),
            SimError::Corrupted(s) => write!(f, "corrupted data: {}", s),
        }
    }
}

impl std::error::Error for SimError {}

impl From<std::io::Error> for SimError {
    fn from(e: std::io::Error) -> Self {
        SimError::IoFailure(e.to_string())
    }
}

pub type SimResult<T> = Result<T, SimError>;
