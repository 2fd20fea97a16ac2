//! Job records and their state machine.
//!
//! A job is never mutated in place by callers. Every state change goes
//! through [`Job::apply`], which produces a complete replacement record so
//! that storage can swap it in with a single write.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::MediaId;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobKind {
    /// Copy an uploaded file into storage, probe it and create a media record
    ProbeAndIngest,
    /// Cut a time range out of a media file
    Trim,
    /// Draw text or an image on top of a media file
    Overlay,
    /// Blend a semi-transparent image at a named anchor
    Watermark,
    /// Transcode into one or more fixed resolutions
    QualityConvert,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::ProbeAndIngest => "PROBE_AND_INGEST",
            JobKind::Trim => "TRIM",
            JobKind::Overlay => "OVERLAY",
            JobKind::Watermark => "WATERMARK",
            JobKind::QualityConvert => "QUALITY_CONVERT",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Created, waiting for a worker slot
    #[default]
    Pending,
    /// A worker owns the job and is running its pipeline
    Processing,
    /// Pipeline finished and the artifact is recorded
    Completed,
    /// Pipeline stopped on an error
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Coarse progress percentage derived from the status alone.
    pub fn progress(&self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Processing => 50,
            JobStatus::Completed => 100,
            JobStatus::Failed => 0,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested change of job state.
#[derive(Debug, Clone, PartialEq)]
pub enum JobTransition {
    /// PENDING -> PROCESSING. A no-op for any later status.
    Start,
    /// PROCESSING -> COMPLETED with the produced artifact.
    Complete {
        result_path: PathBuf,
        /// Media created by the job itself (ingest), if any
        media_id: Option<MediaId>,
    },
    /// PROCESSING -> FAILED with a captured message.
    Fail { message: String },
}

impl JobTransition {
    pub fn name(&self) -> &'static str {
        match self {
            JobTransition::Start => "start",
            JobTransition::Complete { .. } => "complete",
            JobTransition::Fail { .. } => "fail",
        }
    }
}

/// Rejected state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("job {job_id} is already {status}, cannot {transition}")]
    AlreadyTerminal {
        job_id: JobId,
        status: JobStatus,
        transition: &'static str,
    },

    #[error("job {job_id} has not started processing, cannot {transition}")]
    NotStarted {
        job_id: JobId,
        transition: &'static str,
    },
}

/// A tracked unit of asynchronous work.
///
/// Invariants, upheld by [`Job::apply`]:
/// - `result_path` is set iff `status == Completed`
/// - `error_message` is set iff `status == Failed`
/// - `completed_at` is set iff the status is terminal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Operation performed by this job
    pub kind: JobKind,

    /// Current status
    #[serde(default)]
    pub status: JobStatus,

    /// Source media, or the media created by an ingest job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_id: Option<MediaId>,

    /// Produced artifact (set iff completed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<PathBuf>,

    /// Failure message (set iff failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Completion timestamp (set iff terminal)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(kind: JobKind, media_id: Option<MediaId>) -> Self {
        Self {
            id: JobId::new(),
            kind,
            status: JobStatus::Pending,
            media_id,
            result_path: None,
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Compute the record that results from `transition`.
    ///
    /// Returns `Ok(None)` when the transition is an idempotent no-op
    /// (starting a job that is already processing or finished).
    pub fn apply(&self, transition: &JobTransition) -> Result<Option<Job>, TransitionError> {
        match (self.status, transition) {
            (JobStatus::Pending, JobTransition::Start) => Ok(Some(Job {
                status: JobStatus::Processing,
                ..self.clone()
            })),
            (_, JobTransition::Start) => Ok(None),

            (status, t) if status.is_terminal() => Err(TransitionError::AlreadyTerminal {
                job_id: self.id.clone(),
                status,
                transition: t.name(),
            }),
            (JobStatus::Pending, t) => Err(TransitionError::NotStarted {
                job_id: self.id.clone(),
                transition: t.name(),
            }),

            (_, JobTransition::Complete { result_path, media_id }) => Ok(Some(Job {
                status: JobStatus::Completed,
                media_id: media_id.clone().or_else(|| self.media_id.clone()),
                result_path: Some(result_path.clone()),
                error_message: None,
                completed_at: Some(Utc::now()),
                ..self.clone()
            })),
            (_, JobTransition::Fail { message }) => Ok(Some(Job {
                status: JobStatus::Failed,
                result_path: None,
                error_message: Some(message.clone()),
                completed_at: Some(Utc::now()),
                ..self.clone()
            })),
        }
    }

    /// Check the record-level invariants.
    pub fn is_consistent(&self) -> bool {
        let completed = self.status == JobStatus::Completed;
        let failed = self.status == JobStatus::Failed;
        self.result_path.is_some() == completed
            && self.error_message.is_some() == failed
            && self.completed_at.is_some() == self.status.is_terminal()
    }

    /// Progress derived from the status.
    pub fn progress(&self) -> u8 {
        self.status.progress()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn complete(path: &str) -> JobTransition {
        JobTransition::Complete {
            result_path: PathBuf::from(path),
            media_id: None,
        }
    }

    #[test]
    fn test_job_creation() {
        let job = Job::new(JobKind::Trim, Some(MediaId::from("m-1")));
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress(), 0);
        assert!(job.completed_at.is_none());
        assert!(job.is_consistent());
    }

    #[test]
    fn test_job_state_transitions() {
        let job = Job::new(JobKind::Trim, None);

        let started = job.apply(&JobTransition::Start).unwrap().unwrap();
        assert_eq!(started.status, JobStatus::Processing);
        assert_eq!(started.progress(), 50);
        assert!(started.completed_at.is_none());

        let completed = started.apply(&complete("out.mp4")).unwrap().unwrap();
        assert_eq!(completed.status, JobStatus::Completed);
        assert_eq!(completed.result_path, Some(PathBuf::from("out.mp4")));
        assert!(completed.completed_at.is_some());
        assert_eq!(completed.progress(), 100);
        assert!(completed.is_consistent());
    }

    #[test]
    fn test_start_is_idempotent() {
        let job = Job::new(JobKind::Overlay, None);
        let started = job.apply(&JobTransition::Start).unwrap().unwrap();
        assert!(started.apply(&JobTransition::Start).unwrap().is_none());

        let failed = started
            .apply(&JobTransition::Fail { message: "boom".into() })
            .unwrap()
            .unwrap();
        assert!(failed.apply(&JobTransition::Start).unwrap().is_none());
    }

    #[test]
    fn test_no_transition_out_of_terminal() {
        let job = Job::new(JobKind::Watermark, None)
            .apply(&JobTransition::Start)
            .unwrap()
            .unwrap()
            .apply(&JobTransition::Fail { message: "bad".into() })
            .unwrap()
            .unwrap();

        let err = job.apply(&complete("late.mp4")).unwrap_err();
        assert!(matches!(err, TransitionError::AlreadyTerminal { status: JobStatus::Failed, .. }));
    }

    #[test]
    fn test_complete_requires_processing() {
        let job = Job::new(JobKind::Trim, None);
        let err = job.apply(&complete("x.mp4")).unwrap_err();
        assert!(matches!(err, TransitionError::NotStarted { .. }));
    }

    #[test]
    fn test_ingest_completion_sets_media() {
        let job = Job::new(JobKind::ProbeAndIngest, None)
            .apply(&JobTransition::Start)
            .unwrap()
            .unwrap();
        let done = job
            .apply(&JobTransition::Complete {
                result_path: PathBuf::from("uploads/a.mp4"),
                media_id: Some(MediaId::from("m-9")),
            })
            .unwrap()
            .unwrap();
        assert_eq!(done.media_id, Some(MediaId::from("m-9")));
    }

    #[test]
    fn test_random_transition_sequences_keep_invariants() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..500 {
            let mut job = Job::new(JobKind::QualityConvert, None);
            for _ in 0..rng.random_range(1..8) {
                let transition = match rng.random_range(0..3) {
                    0 => JobTransition::Start,
                    1 => complete("r.mp4"),
                    _ => JobTransition::Fail { message: "err".into() },
                };
                let before = job.status;
                match job.apply(&transition) {
                    Ok(Some(next)) => {
                        assert!(!before.is_terminal());
                        job = next;
                    }
                    Ok(None) => assert_ne!(before, JobStatus::Pending),
                    Err(_) => {}
                }
                assert!(job.is_consistent(), "inconsistent record: {:?}", job);
            }
        }
    }

    #[test]
    fn test_status_serializes_screaming_case() {
        let json = serde_json::to_string(&JobStatus::Processing).unwrap();
        assert_eq!(json, "\"PROCESSING\"");
        let kind: JobKind = serde_json::from_str("\"QUALITY_CONVERT\"").unwrap();
        assert_eq!(kind, JobKind::QualityConvert);
    }
}
