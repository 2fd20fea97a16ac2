//! Shared data models for the video processing job pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, their status and the transition state machine
//! - Media records and derived artifacts (trims, overlays, quality variants)
//! - Operation requests and their validation
//! - The job status read model and job update events

pub mod events;
pub mod job;
pub mod job_status;
pub mod media;
pub mod quality;
pub mod request;

// Re-export common types
pub use events::JobUpdate;
pub use job::{Job, JobId, JobKind, JobStatus, JobTransition, TransitionError};
pub use job_status::JobStatusView;
pub use media::{Media, MediaId, OverlayKind, OverlayRecord, QualityVariant, TrimmedClip};
pub use quality::Quality;
pub use request::{
    IngestRequest, JobRequest, OverlayRequest, QualityRequest, TrimRequest, ValidationError,
    ValidationResult, WatermarkRequest,
};
