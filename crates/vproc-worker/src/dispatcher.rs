//! Job dispatcher with a bounded worker pool.
//!
//! Submissions are validated, recorded as PENDING jobs and placed on a
//! bounded queue. A single dispatch loop hands queued jobs to at most
//! `max_concurrent_jobs` concurrently running pipelines. Every error or
//! panic inside a pipeline becomes a `fail` transition on that job.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn, Instrument};

use vproc_models::{
    Job, JobId, JobRequest, JobStatus, JobStatusView, Media, MediaId, OverlayKind, OverlayRecord,
    QualityVariant, TrimmedClip,
};
use vproc_store::MediaRepository;

use crate::error::{WorkerError, WorkerResult};
use crate::lifecycle::JobLifecycle;
use crate::logging::JobLogger;
use crate::metrics;
use crate::pipeline::{PipelineContext, PipelineOutput};
use crate::stats::SystemStats;

/// Worker pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherSettings {
    /// Pipelines that may run at once
    pub max_concurrent_jobs: usize,
    /// Accepted jobs that may wait for a free slot
    pub queue_capacity: usize,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 10,
            queue_capacity: 100,
        }
    }
}

struct QueuedJob {
    job_id: JobId,
    request: JobRequest,
}

/// Accepts job requests and runs them on a bounded worker pool.
pub struct JobDispatcher {
    tx: mpsc::Sender<QueuedJob>,
    lifecycle: JobLifecycle,
    pipeline: Arc<PipelineContext>,
    semaphore: Arc<Semaphore>,
    max_concurrent_jobs: usize,
    dispatch_loop: JoinHandle<()>,
}

impl JobDispatcher {
    /// Start the dispatch loop. Must be called within a tokio runtime.
    pub fn start(
        settings: DispatcherSettings,
        lifecycle: JobLifecycle,
        pipeline: PipelineContext,
    ) -> Self {
        let max_concurrent_jobs = settings.max_concurrent_jobs.max(1);
        let (tx, rx) = mpsc::channel(settings.queue_capacity.max(1));
        let semaphore = Arc::new(Semaphore::new(max_concurrent_jobs));
        let pipeline = Arc::new(pipeline);

        info!(
            max_concurrent_jobs,
            queue_capacity = settings.queue_capacity,
            "Starting job dispatcher"
        );

        let dispatch_loop = tokio::spawn(dispatch_loop(
            rx,
            Arc::clone(&semaphore),
            lifecycle.clone(),
            Arc::clone(&pipeline),
        ));

        Self {
            tx,
            lifecycle,
            pipeline,
            semaphore,
            max_concurrent_jobs,
            dispatch_loop,
        }
    }

    /// Validate and enqueue a request, waiting for queue space if needed.
    ///
    /// Returns the id of the new PENDING job. Validation and missing-media
    /// errors are returned before any job record exists.
    pub async fn submit(&self, request: JobRequest) -> WorkerResult<JobId> {
        self.check(&request).await?;
        let permit = self
            .tx
            .reserve()
            .await
            .map_err(|_| WorkerError::ShuttingDown)?;
        let job = self
            .lifecycle
            .create(request.kind(), request.media_id().cloned())
            .await?;
        metrics::record_submitted(request.kind());
        permit.send(QueuedJob {
            job_id: job.id.clone(),
            request,
        });
        Ok(job.id)
    }

    /// Like [`submit`](Self::submit) but fails with `QueueFull` instead of
    /// waiting. A refused request leaves no job record behind.
    pub async fn try_submit(&self, request: JobRequest) -> WorkerResult<JobId> {
        self.check(&request).await?;
        let permit = match self.tx.try_reserve() {
            Ok(permit) => permit,
            Err(mpsc::error::TrySendError::Full(())) => {
                warn!(operation = request.kind().as_str(), "Job queue full, rejecting");
                metrics::record_rejected(request.kind());
                return Err(WorkerError::QueueFull);
            }
            Err(mpsc::error::TrySendError::Closed(())) => return Err(WorkerError::ShuttingDown),
        };
        let job = self
            .lifecycle
            .create(request.kind(), request.media_id().cloned())
            .await?;
        metrics::record_submitted(request.kind());
        permit.send(QueuedJob {
            job_id: job.id.clone(),
            request,
        });
        Ok(job.id)
    }

    /// Checks that need I/O: referenced media and input files.
    async fn check(&self, request: &JobRequest) -> WorkerResult<()> {
        request.validate()?;

        if let Some(media_id) = request.media_id() {
            if self.pipeline.media.get_media(media_id).await?.is_none() {
                return Err(WorkerError::not_found("media", media_id));
            }
        }

        match request {
            JobRequest::ProbeAndIngest(r) => {
                if !is_file(&r.source_path).await {
                    return Err(WorkerError::validation(
                        "source_path",
                        "Source file does not exist",
                    ));
                }
            }
            JobRequest::Watermark(r) => {
                if !is_file(&r.watermark_path).await {
                    return Err(WorkerError::validation(
                        "watermark_path",
                        format!("Watermark file not found: {}", r.watermark_path.display()),
                    ));
                }
            }
            JobRequest::Overlay(r) => {
                if r.kind()? == OverlayKind::Image && !is_file(Path::new(&r.content)).await {
                    return Err(WorkerError::validation(
                        "content",
                        format!("Overlay image not found: {}", r.content),
                    ));
                }
            }
            JobRequest::Trim(_) | JobRequest::QualityConvert(_) => {}
        }
        Ok(())
    }

    pub fn lifecycle(&self) -> &JobLifecycle {
        &self.lifecycle
    }

    pub async fn get_job(&self, id: &JobId) -> WorkerResult<Job> {
        self.lifecycle.get(id).await
    }

    pub async fn status(&self, id: &JobId) -> WorkerResult<JobStatusView> {
        self.lifecycle.status(id).await
    }

    pub async fn result_path(&self, id: &JobId) -> WorkerResult<std::path::PathBuf> {
        self.lifecycle.result_path(id).await
    }

    pub async fn list_jobs_by_status(&self, status: JobStatus) -> WorkerResult<Vec<Job>> {
        self.lifecycle.list_by_status(status).await
    }

    pub async fn get_media(&self, id: &MediaId) -> WorkerResult<Media> {
        self.pipeline
            .media
            .get_media(id)
            .await?
            .ok_or_else(|| WorkerError::not_found("media", id))
    }

    pub async fn list_media(&self) -> WorkerResult<Vec<Media>> {
        Ok(self.pipeline.media.list_media().await?)
    }

    pub async fn list_trims(&self, id: &MediaId) -> WorkerResult<Vec<TrimmedClip>> {
        Ok(self.pipeline.media.list_trims(id).await?)
    }

    pub async fn list_overlays(&self, id: &MediaId) -> WorkerResult<Vec<OverlayRecord>> {
        Ok(self.pipeline.media.list_overlays(id).await?)
    }

    pub async fn list_quality_variants(&self, id: &MediaId) -> WorkerResult<Vec<QualityVariant>> {
        Ok(self.pipeline.media.list_quality_variants(id).await?)
    }

    pub async fn stats(&self) -> WorkerResult<SystemStats> {
        SystemStats::collect(
            self.lifecycle.repository().as_ref(),
            self.pipeline.media.as_ref(),
        )
        .await
    }

    /// Whether a font for `language` is usable without downloading.
    pub async fn is_font_available(&self, language: &str) -> bool {
        self.pipeline.fonts.is_font_available(language).await
    }

    /// Stop accepting work and wait for queued and running jobs.
    ///
    /// Returns false if `timeout` elapsed first; unfinished jobs keep
    /// running in the background.
    pub async fn shutdown(self, timeout: Duration) -> bool {
        let Self {
            tx,
            semaphore,
            max_concurrent_jobs,
            dispatch_loop,
            ..
        } = self;
        drop(tx);
        info!("Draining job dispatcher");

        let drained = tokio::time::timeout(timeout, async move {
            if let Err(e) = dispatch_loop.await {
                error!("Dispatch loop ended abnormally: {}", e);
            }
            let permits = u32::try_from(max_concurrent_jobs).unwrap_or(u32::MAX);
            let _ = semaphore.acquire_many(permits).await;
        })
        .await
        .is_ok();

        if drained {
            info!("Job dispatcher stopped");
        } else {
            warn!(timeout_secs = timeout.as_secs(), "Shutdown timed out with jobs still running");
        }
        drained
    }
}

async fn is_file(path: &Path) -> bool {
    matches!(tokio::fs::metadata(path).await, Ok(meta) if meta.is_file())
}

async fn dispatch_loop(
    mut rx: mpsc::Receiver<QueuedJob>,
    semaphore: Arc<Semaphore>,
    lifecycle: JobLifecycle,
    pipeline: Arc<PipelineContext>,
) {
    loop {
        // Take a slot before dequeuing so waiting jobs stay counted against
        // the queue capacity.
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let Some(queued) = rx.recv().await else {
            break;
        };

        let lifecycle = lifecycle.clone();
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            let _permit = permit;
            execute_job(lifecycle, pipeline, queued).await;
        });
    }
}

async fn execute_job(lifecycle: JobLifecycle, pipeline: Arc<PipelineContext>, queued: QueuedJob) {
    let QueuedJob { job_id, request } = queued;
    let kind = request.kind();
    let logger = JobLogger::new(&job_id, kind);
    let span = logger.create_span();

    async move {
        let started = Instant::now();
        if let Err(e) = lifecycle.transition_to_processing(&job_id).await {
            logger.log_error(&format!("Cannot start job: {}", e));
            // The store may have applied the start before reporting the error.
            if let Err(e) = lifecycle.fail(&job_id, e.to_string()).await {
                logger.log_error(&format!("Cannot record failure: {}", e));
            }
            metrics::record_finished(kind, false, started.elapsed().as_secs_f64());
            return;
        }
        logger.log_start("Pipeline running");

        // Run on its own task so a panic surfaces as a JoinError.
        let task_logger = logger.clone();
        let outcome = tokio::spawn(
            async move { pipeline.run(&request, &task_logger).await }.in_current_span(),
        )
        .await
        .unwrap_or_else(|e| Err(WorkerError::pipeline(format!("Job task panicked: {}", e))));

        let succeeded = match outcome {
            Ok(output) => finish(&lifecycle, &job_id, output, &logger).await,
            Err(e) => {
                let message = e.to_string();
                logger.log_error(&message);
                if let Err(e) = lifecycle.fail(&job_id, message).await {
                    logger.log_error(&format!("Cannot record failure: {}", e));
                }
                false
            }
        };
        metrics::record_finished(kind, succeeded, started.elapsed().as_secs_f64());
    }
    .instrument(span)
    .await
}

async fn finish(
    lifecycle: &JobLifecycle,
    job_id: &JobId,
    output: PipelineOutput,
    logger: &JobLogger,
) -> bool {
    let result_path = output.result_path.clone();
    let completed = match output.media_id {
        Some(media_id) => {
            lifecycle
                .complete_with_media(job_id, output.result_path, media_id)
                .await
        }
        None => lifecycle.complete(job_id, output.result_path).await,
    };
    match completed {
        Ok(_) => {
            logger.log_completion(&format!("Result at {}", result_path.display()));
            true
        }
        Err(e) => {
            logger.log_error(&format!("Cannot record completion: {}", e));
            if let Err(e) = lifecycle.fail(job_id, e.to_string()).await {
                logger.log_error(&format!("Cannot record failure: {}", e));
            }
            false
        }
    }
}
