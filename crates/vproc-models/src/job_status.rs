//! Job status read model returned to callers.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{Job, JobId, JobStatus};

/// Snapshot of a job for status polling.
///
/// Progress is derived from the status only (0, 50 or 100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    /// Failure message, if the job failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Produced artifact, if the job completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Job> for JobStatusView {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            progress: job.progress(),
            message: job.error_message.clone(),
            result_ref: job.result_path.clone(),
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JobKind, JobTransition};

    #[test]
    fn test_view_of_failed_job() {
        let job = Job::new(JobKind::Trim, None)
            .apply(&JobTransition::Start)
            .unwrap()
            .unwrap()
            .apply(&JobTransition::Fail {
                message: "ffmpeg failed".into(),
            })
            .unwrap()
            .unwrap();

        let view = JobStatusView::from(&job);
        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(view.progress, 0);
        assert_eq!(view.message.as_deref(), Some("ffmpeg failed"));
        assert!(view.result_ref.is_none());
        assert!(view.completed_at.is_some());
    }

    #[test]
    fn test_view_serializes_camel_case() {
        let job = Job::new(JobKind::Overlay, None);
        let json = serde_json::to_value(JobStatusView::from(&job)).unwrap();
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["progress"], 0);
        assert!(json.get("jobId").is_some());
        assert!(json.get("resultRef").is_none());
    }
}
