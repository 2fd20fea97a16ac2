//! Worker error types.

use thiserror::Error;
use vproc_models::{JobId, JobStatus, ValidationError};

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Job {job_id} is not completed (status {status})")]
    JobNotCompleted { job_id: JobId, status: JobStatus },

    #[error("Job queue is full")]
    QueueFull,

    #[error("Dispatcher is shutting down")]
    ShuttingDown,

    #[error("Pipeline failed: {0}")]
    Pipeline(String),

    #[error("Media error: {0}")]
    Media(#[from] vproc_media::MediaError),

    #[error("Store error: {0}")]
    Store(#[from] vproc_store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation(ValidationError::new(field, message))
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn pipeline(message: impl Into<String>) -> Self {
        Self::Pipeline(message.into())
    }

    /// Rejected request parameters.
    pub fn is_validation(&self) -> bool {
        matches!(self, WorkerError::Validation(_))
    }

    /// Missing job or media record.
    pub fn is_not_found(&self) -> bool {
        match self {
            WorkerError::NotFound { .. } => true,
            WorkerError::Store(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Submission refused for lack of capacity.
    pub fn is_back_pressure(&self) -> bool {
        matches!(self, WorkerError::QueueFull | WorkerError::ShuttingDown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifiers() {
        assert!(WorkerError::validation("start_time", "bad").is_validation());
        assert!(WorkerError::not_found("media", "m1").is_not_found());
        assert!(WorkerError::Store(vproc_store::StoreError::not_found("job", "j")).is_not_found());
        assert!(WorkerError::QueueFull.is_back_pressure());
        assert!(!WorkerError::pipeline("x").is_not_found());
    }
}
