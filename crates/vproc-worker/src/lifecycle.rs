//! Job lifecycle management.
//!
//! All status changes go through [`JobLifecycle`], which applies them as a
//! single atomic replacement in the [`JobRepository`] and publishes a
//! [`JobUpdate`](vproc_models::JobUpdate) for every change that took effect.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use vproc_models::{Job, JobId, JobKind, JobStatus, JobStatusView, JobTransition, MediaId};
use vproc_store::JobRepository;

use crate::error::{WorkerError, WorkerResult};
use crate::progress::ProgressChannel;

/// Creates jobs and drives them through their status transitions.
#[derive(Clone)]
pub struct JobLifecycle {
    jobs: Arc<dyn JobRepository>,
    progress: ProgressChannel,
}

impl JobLifecycle {
    pub fn new(jobs: Arc<dyn JobRepository>, progress: ProgressChannel) -> Self {
        Self { jobs, progress }
    }

    pub fn progress(&self) -> &ProgressChannel {
        &self.progress
    }

    pub fn repository(&self) -> &Arc<dyn JobRepository> {
        &self.jobs
    }

    /// Create a new PENDING job.
    pub async fn create(&self, kind: JobKind, media_id: Option<MediaId>) -> WorkerResult<Job> {
        let job = Job::new(kind, media_id);
        self.jobs.insert(job.clone()).await?;
        info!(job_id = %job.id, operation = kind.as_str(), "Job created");
        self.progress.publish(&job);
        Ok(job)
    }

    /// Mark a job PROCESSING. No-op if it already is.
    pub async fn transition_to_processing(&self, id: &JobId) -> WorkerResult<Job> {
        self.transition(id, JobTransition::Start).await
    }

    /// Mark a job COMPLETED with its result artifact.
    pub async fn complete(&self, id: &JobId, result_path: impl Into<PathBuf>) -> WorkerResult<Job> {
        self.transition(
            id,
            JobTransition::Complete {
                result_path: result_path.into(),
                media_id: None,
            },
        )
        .await
    }

    /// Complete a job that produced a new media record.
    pub async fn complete_with_media(
        &self,
        id: &JobId,
        result_path: impl Into<PathBuf>,
        media_id: MediaId,
    ) -> WorkerResult<Job> {
        self.transition(
            id,
            JobTransition::Complete {
                result_path: result_path.into(),
                media_id: Some(media_id),
            },
        )
        .await
    }

    /// Mark a job FAILED with a message.
    pub async fn fail(&self, id: &JobId, message: impl Into<String>) -> WorkerResult<Job> {
        self.transition(
            id,
            JobTransition::Fail {
                message: message.into(),
            },
        )
        .await
    }

    pub async fn get(&self, id: &JobId) -> WorkerResult<Job> {
        self.jobs
            .get(id)
            .await?
            .ok_or_else(|| WorkerError::not_found("job", id))
    }

    /// Status read model for polling callers.
    pub async fn status(&self, id: &JobId) -> WorkerResult<JobStatusView> {
        let job = self.get(id).await?;
        Ok(JobStatusView::from(&job))
    }

    /// Artifact produced by a completed job.
    pub async fn result_path(&self, id: &JobId) -> WorkerResult<PathBuf> {
        let job = self.get(id).await?;
        match (job.status, job.result_path) {
            (JobStatus::Completed, Some(path)) => Ok(path),
            (status, _) => Err(WorkerError::JobNotCompleted {
                job_id: job.id,
                status,
            }),
        }
    }

    pub async fn list_by_status(&self, status: JobStatus) -> WorkerResult<Vec<Job>> {
        Ok(self.jobs.list_by_status(status).await?)
    }

    /// Jobs that failed at or after `since`, most recent first.
    pub async fn list_recent_failed(&self, since: DateTime<Utc>) -> WorkerResult<Vec<Job>> {
        Ok(self.jobs.list_failed_since(since).await?)
    }

    pub async fn list_for_media(&self, media_id: &MediaId) -> WorkerResult<Vec<Job>> {
        Ok(self.jobs.list_for_media(media_id).await?)
    }

    async fn transition(&self, id: &JobId, transition: JobTransition) -> WorkerResult<Job> {
        let outcome = match self.jobs.update(id, &transition).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(job_id = %id, transition = transition.name(), error = %e, "Job transition rejected");
                return Err(e.into());
            }
        };

        if outcome.changed {
            debug!(job_id = %id, status = %outcome.job.status, "Job status changed");
            self.progress.publish(&outcome.job);
        }
        Ok(outcome.job)
    }
}
