//! Error types for pipeline dispatch and configuration.
//!
//! Failures raised by user-supplied stage functions or consumers are not
//! represented here: they unwind out of the driver loop untouched.

use thiserror::Error;

/// Result type for stagecraft operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// No idle worker was available when one was required.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// An acquired worker refused the submitted task.
    #[error("task rejected: {0}")]
    TaskRejected(String),

    /// The API was used in a way the current configuration does not allow.
    #[error("invalid usage: {0}")]
    InvalidUsage(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, PipelineError::ResourceExhausted(_))
    }

    pub fn is_task_rejected(&self) -> bool {
        matches!(self, PipelineError::TaskRejected(_))
    }

    pub fn is_invalid_usage(&self) -> bool {
        matches!(self, PipelineError::InvalidUsage(_))
    }
}
