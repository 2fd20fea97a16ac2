//! Repository seams for job and media records.
//!
//! Implementations must make every job update a single atomic replacement:
//! a concurrent reader sees the record either before or after a transition,
//! never a mix of the two.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vproc_models::{
    Job, JobId, JobStatus, JobTransition, Media, MediaId, OverlayRecord, QualityVariant,
    TrimmedClip,
};

use crate::error::StoreResult;

/// Result of applying a transition to a stored job.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    /// Record as stored after the call
    pub job: Job,
    /// False when the transition was an idempotent no-op
    pub changed: bool,
}

/// Storage for job records.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Store a new job. Fails if the id is taken.
    async fn insert(&self, job: Job) -> StoreResult<()>;

    async fn get(&self, id: &JobId) -> StoreResult<Option<Job>>;

    /// Apply `transition` and replace the record in one step.
    async fn update(&self, id: &JobId, transition: &JobTransition) -> StoreResult<UpdateOutcome>;

    /// Jobs with the given status, oldest first.
    async fn list_by_status(&self, status: JobStatus) -> StoreResult<Vec<Job>>;

    /// Failed jobs that finished at or after `since`, most recent first.
    async fn list_failed_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<Job>>;

    /// Jobs referencing a media record, oldest first.
    async fn list_for_media(&self, media_id: &MediaId) -> StoreResult<Vec<Job>>;

    async fn count(&self) -> StoreResult<usize>;

    async fn count_by_status(&self, status: JobStatus) -> StoreResult<usize>;
}

/// Storage for media records and their derived artifacts.
///
/// Derived records can only be added under an existing media record.
#[async_trait]
pub trait MediaRepository: Send + Sync {
    async fn insert_media(&self, media: Media) -> StoreResult<()>;

    async fn get_media(&self, id: &MediaId) -> StoreResult<Option<Media>>;

    /// All media, newest first.
    async fn list_media(&self) -> StoreResult<Vec<Media>>;

    async fn count_media(&self) -> StoreResult<usize>;

    async fn add_trim(&self, clip: TrimmedClip) -> StoreResult<()>;

    async fn list_trims(&self, media_id: &MediaId) -> StoreResult<Vec<TrimmedClip>>;

    async fn add_overlay(&self, overlay: OverlayRecord) -> StoreResult<()>;

    async fn list_overlays(&self, media_id: &MediaId) -> StoreResult<Vec<OverlayRecord>>;

    /// Store a batch of variants together, or none of them.
    async fn add_quality_variants(&self, variants: Vec<QualityVariant>) -> StoreResult<()>;

    async fn list_quality_variants(&self, media_id: &MediaId) -> StoreResult<Vec<QualityVariant>>;

    /// Bytes held by media files and quality variants.
    async fn storage_used(&self) -> StoreResult<u64>;
}
