//! Video processing job worker.
//!
//! This crate provides:
//! - Job lifecycle management and job update events
//! - Per-operation pipelines (ingest, trim, overlay, watermark, quality)
//! - A dispatcher running pipelines on a bounded worker pool
//! - Structured job logging, metrics and system stats

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod stats;

pub use config::WorkerConfig;
pub use dispatcher::{DispatcherSettings, JobDispatcher};
pub use error::{WorkerError, WorkerResult};
pub use lifecycle::JobLifecycle;
pub use logging::JobLogger;
pub use pipeline::{PipelineContext, PipelineOutput};
pub use progress::ProgressChannel;
pub use stats::SystemStats;
