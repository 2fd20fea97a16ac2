//! Aggregate counters over the record stores.

use serde::Serialize;

use vproc_models::JobStatus;
use vproc_store::{JobRepository, MediaRepository};

use crate::error::WorkerResult;

/// Snapshot of system-wide totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub total_media: usize,
    pub total_jobs: usize,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
    /// Bytes held by media files and their quality variants
    pub storage_used: u64,
}

impl SystemStats {
    pub async fn collect(
        jobs: &dyn JobRepository,
        media: &dyn MediaRepository,
    ) -> WorkerResult<Self> {
        Ok(Self {
            total_media: media.count_media().await?,
            total_jobs: jobs.count().await?,
            completed_jobs: jobs.count_by_status(JobStatus::Completed).await?,
            failed_jobs: jobs.count_by_status(JobStatus::Failed).await?,
            storage_used: media.storage_used().await?,
        })
    }
}
