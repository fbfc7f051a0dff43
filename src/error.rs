//! Error types for Pinax.

use thiserror::Error;

/// Result type alias using Pinax's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// The DMA step that failed while establishing a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingStage {
    /// Attaching the buffer to the device failed.
    Attach,
    /// Producing the device mapping for an attached buffer failed.
    Map,
}

impl std::fmt::Display for MappingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MappingStage::Attach => write!(f, "attach"),
            MappingStage::Map => write!(f, "map"),
        }
    }
}

/// Main error type for registry operations.
///
/// Batch operations (`pin`, `submit_pin`) are all-or-nothing: any of these
/// errors means the call rolled back its own partial progress and the
/// registry is in its pre-call state.
#[derive(Error, Debug)]
pub enum Error {
    /// Allocating bookkeeping for a new mapping record failed.
    #[error("mapping record allocation failed: {0}")]
    AllocationFailed(String),

    /// The DMA backend refused to attach or map a buffer.
    #[error("DMA {stage} failed: {reason}")]
    MappingFailed {
        /// Which DMA step rejected the buffer.
        stage: MappingStage,
        /// The backend's own description of the failure.
        reason: String,
    },

    /// A submission referenced a buffer that holds no user pin.
    ///
    /// Submissions never create mappings; the buffer must be pinned through
    /// the user path first.
    #[error("unknown buffer handle: submissions may only reference pinned buffers")]
    UnknownHandle,
}

impl Error {
    /// Shorthand for a [`Error::MappingFailed`] at the attach step.
    pub fn attach_failed(reason: impl Into<String>) -> Self {
        Error::MappingFailed {
            stage: MappingStage::Attach,
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`Error::MappingFailed`] at the map step.
    pub fn map_failed(reason: impl Into<String>) -> Self {
        Error::MappingFailed {
            stage: MappingStage::Map,
            reason: reason.into(),
        }
    }
}
