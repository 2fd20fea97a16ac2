//! In-memory repositories.
//!
//! Each repository guards its records with a single `tokio::sync::RwLock`;
//! job updates compute the replacement record and swap it in under the
//! write lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use vproc_models::{
    Job, JobId, JobStatus, JobTransition, Media, MediaId, OverlayRecord, QualityVariant,
    TrimmedClip,
};

use crate::error::{StoreError, StoreResult};
use crate::repos::{JobRepository, MediaRepository, UpdateOutcome};

/// Job records held in memory.
#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn collect<F>(&self, mut keep: F) -> Vec<Job>
    where
        F: FnMut(&Job) -> bool,
    {
        let jobs = self.jobs.read().await;
        let mut matched: Vec<Job> = jobs.values().filter(|j| keep(j)).cloned().collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        matched
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn insert(&self, job: Job) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::already_exists("job", &job.id));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<Job>> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn update(&self, id: &JobId, transition: &JobTransition) -> StoreResult<UpdateOutcome> {
        let mut jobs = self.jobs.write().await;
        let current = jobs.get(id).ok_or_else(|| StoreError::not_found("job", id))?;

        match current.apply(transition)? {
            Some(next) => {
                debug!(job_id = %id, from = %current.status, to = %next.status, "Job record replaced");
                jobs.insert(id.clone(), next.clone());
                Ok(UpdateOutcome {
                    job: next,
                    changed: true,
                })
            }
            None => Ok(UpdateOutcome {
                job: current.clone(),
                changed: false,
            }),
        }
    }

    async fn list_by_status(&self, status: JobStatus) -> StoreResult<Vec<Job>> {
        Ok(self.collect(|j| j.status == status).await)
    }

    async fn list_failed_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<Job>> {
        let mut failed = self
            .collect(|j| {
                j.status == JobStatus::Failed && j.completed_at.is_some_and(|at| at >= since)
            })
            .await;
        failed.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(failed)
    }

    async fn list_for_media(&self, media_id: &MediaId) -> StoreResult<Vec<Job>> {
        Ok(self
            .collect(|j| j.media_id.as_ref() == Some(media_id))
            .await)
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.jobs.read().await.len())
    }

    async fn count_by_status(&self, status: JobStatus) -> StoreResult<usize> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| j.status == status)
            .count())
    }
}

#[derive(Debug, Default)]
struct MediaTables {
    media: HashMap<MediaId, Media>,
    trims: HashMap<MediaId, Vec<TrimmedClip>>,
    overlays: HashMap<MediaId, Vec<OverlayRecord>>,
    variants: HashMap<MediaId, Vec<QualityVariant>>,
}

impl MediaTables {
    fn require(&self, id: &MediaId) -> StoreResult<()> {
        if self.media.contains_key(id) {
            Ok(())
        } else {
            Err(StoreError::not_found("media", id))
        }
    }
}

/// Media records and derived artifacts held in memory.
#[derive(Debug, Default)]
pub struct InMemoryMediaRepository {
    tables: RwLock<MediaTables>,
}

impl InMemoryMediaRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MediaRepository for InMemoryMediaRepository {
    async fn insert_media(&self, media: Media) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.media.contains_key(&media.id) {
            return Err(StoreError::already_exists("media", &media.id));
        }
        tables.media.insert(media.id.clone(), media);
        Ok(())
    }

    async fn get_media(&self, id: &MediaId) -> StoreResult<Option<Media>> {
        Ok(self.tables.read().await.media.get(id).cloned())
    }

    async fn list_media(&self) -> StoreResult<Vec<Media>> {
        let tables = self.tables.read().await;
        let mut all: Vec<Media> = tables.media.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn count_media(&self) -> StoreResult<usize> {
        Ok(self.tables.read().await.media.len())
    }

    async fn add_trim(&self, clip: TrimmedClip) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.require(&clip.media_id)?;
        tables
            .trims
            .entry(clip.media_id.clone())
            .or_default()
            .push(clip);
        Ok(())
    }

    async fn list_trims(&self, media_id: &MediaId) -> StoreResult<Vec<TrimmedClip>> {
        let tables = self.tables.read().await;
        Ok(tables.trims.get(media_id).cloned().unwrap_or_default())
    }

    async fn add_overlay(&self, overlay: OverlayRecord) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.require(&overlay.media_id)?;
        tables
            .overlays
            .entry(overlay.media_id.clone())
            .or_default()
            .push(overlay);
        Ok(())
    }

    async fn list_overlays(&self, media_id: &MediaId) -> StoreResult<Vec<OverlayRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.overlays.get(media_id).cloned().unwrap_or_default())
    }

    async fn add_quality_variants(&self, variants: Vec<QualityVariant>) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        for variant in &variants {
            tables.require(&variant.media_id)?;
        }
        for variant in variants {
            tables
                .variants
                .entry(variant.media_id.clone())
                .or_default()
                .push(variant);
        }
        Ok(())
    }

    async fn list_quality_variants(&self, media_id: &MediaId) -> StoreResult<Vec<QualityVariant>> {
        let tables = self.tables.read().await;
        Ok(tables.variants.get(media_id).cloned().unwrap_or_default())
    }

    async fn storage_used(&self) -> StoreResult<u64> {
        let tables = self.tables.read().await;
        let media: u64 = tables.media.values().map(|m| m.size).sum();
        let variants: u64 = tables.variants.values().flatten().map(|v| v.size).sum();
        Ok(media + variants)
    }
}
