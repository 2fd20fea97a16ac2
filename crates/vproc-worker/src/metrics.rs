//! Job pipeline metrics.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use vproc_models::JobKind;

/// Metric name constants for consistency.
pub mod names {
    /// Jobs accepted by the dispatcher, by kind.
    pub const JOBS_SUBMITTED_TOTAL: &str = "vproc_jobs_submitted_total";

    /// Jobs that reached a terminal status, by kind and status.
    pub const JOBS_FINISHED_TOTAL: &str = "vproc_jobs_finished_total";

    /// Submissions refused because the queue was full.
    pub const JOBS_REJECTED_TOTAL: &str = "vproc_jobs_rejected_total";

    /// Pipeline wall-clock time in seconds, by kind.
    pub const JOB_DURATION_SECONDS: &str = "vproc_job_duration_seconds";
}

/// Install the Prometheus exporter with its own HTTP listener.
pub fn install_exporter(port: u16) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()
}

pub fn record_submitted(kind: JobKind) {
    counter!(names::JOBS_SUBMITTED_TOTAL, "kind" => kind.as_str()).increment(1);
}

pub fn record_rejected(kind: JobKind) {
    counter!(names::JOBS_REJECTED_TOTAL, "kind" => kind.as_str()).increment(1);
}

/// Record a finished pipeline.
pub fn record_finished(kind: JobKind, succeeded: bool, duration_secs: f64) {
    let status = if succeeded { "completed" } else { "failed" };
    counter!(
        names::JOBS_FINISHED_TOTAL,
        "kind" => kind.as_str(),
        "status" => status
    )
    .increment(1);

    histogram!(names::JOB_DURATION_SECONDS, "kind" => kind.as_str()).record(duration_secs);
}
