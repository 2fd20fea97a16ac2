//! Per-operation job pipelines.
//!
//! Each pipeline synthesizes its tool commands, runs them in order and,
//! only once every command has succeeded, stores the derived records.
//! Files a failed pipeline already wrote are removed before the error is
//! returned.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use vproc_media::fs_utils::{copy_atomic, ensure_parent, file_size, remove_quietly};
use vproc_media::{
    parse_probe_output, watermark_position, CommandSynthesizer, FontResolver, ToolCommand,
    ToolRunner,
};
use vproc_models::{
    IngestRequest, JobRequest, Media, MediaId, OverlayKind, OverlayRecord, OverlayRequest,
    QualityRequest, QualityVariant, TrimRequest, TrimmedClip, WatermarkRequest,
};
use vproc_store::{MediaRepository, StoreResult};

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

/// What a successful pipeline produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Artifact recorded as the job result
    pub result_path: PathBuf,
    /// Media record created by the pipeline (ingest only)
    pub media_id: Option<MediaId>,
}

impl PipelineOutput {
    fn artifact(result_path: PathBuf) -> Self {
        Self {
            result_path,
            media_id: None,
        }
    }
}

/// Shared dependencies of every pipeline.
#[derive(Clone)]
pub struct PipelineContext {
    pub synth: CommandSynthesizer,
    pub runner: Arc<dyn ToolRunner>,
    pub fonts: Arc<FontResolver>,
    pub media: Arc<dyn MediaRepository>,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl PipelineContext {
    /// Run the pipeline for `request`.
    pub async fn run(
        &self,
        request: &JobRequest,
        logger: &JobLogger,
    ) -> WorkerResult<PipelineOutput> {
        match request {
            JobRequest::ProbeAndIngest(r) => self.ingest(r, logger).await,
            JobRequest::Trim(r) => self.trim(r, logger).await,
            JobRequest::Overlay(r) => self.overlay(r, logger).await,
            JobRequest::Watermark(r) => self.watermark(r, logger).await,
            JobRequest::QualityConvert(r) => self.quality(r, logger).await,
        }
    }

    async fn ingest(
        &self,
        request: &IngestRequest,
        logger: &JobLogger,
    ) -> WorkerResult<PipelineOutput> {
        let filename = format!("{}_{}", Uuid::new_v4(), request.original_filename.trim());
        let stored = self.upload_dir.join(&filename);

        logger.log_progress(&format!("Storing upload as {}", filename));
        copy_atomic(&request.source_path, &stored).await?;

        match self.register_media(request, &filename, &stored, logger).await {
            Ok(media_id) => Ok(PipelineOutput {
                result_path: stored,
                media_id: Some(media_id),
            }),
            Err(e) => {
                remove_quietly(&stored).await;
                Err(e)
            }
        }
    }

    async fn register_media(
        &self,
        request: &IngestRequest,
        filename: &str,
        stored: &Path,
        logger: &JobLogger,
    ) -> WorkerResult<MediaId> {
        let output = self.runner.run(&self.synth.probe(stored)).await?;
        let metadata = parse_probe_output(output.stdout.as_bytes())?;
        let size = file_size(stored).await?;

        let media = Media {
            id: MediaId::new(),
            filename: filename.to_string(),
            original_filename: request.original_filename.trim().to_string(),
            path: stored.to_path_buf(),
            duration: metadata.duration,
            width: metadata.width,
            height: metadata.height,
            size,
            created_at: Utc::now(),
        };
        let id = media.id.clone();
        logger.log_progress(&format!(
            "Probed {}x{}, {:.2}s, {} bytes",
            media.width, media.height, media.duration, media.size
        ));
        self.media.insert_media(media).await?;
        Ok(id)
    }

    async fn trim(
        &self,
        request: &TrimRequest,
        logger: &JobLogger,
    ) -> WorkerResult<PipelineOutput> {
        let media = self.load_media(&request.media_id).await?;
        let output = self.output_path(format!("trimmed_{}.mp4", Uuid::new_v4()));

        let command = self
            .synth
            .trim(&media.path, &output, request.start_time, request.end_time);
        self.run_producing(&command, &output, logger).await?;

        let clip = TrimmedClip::new(
            media.id.clone(),
            output.clone(),
            request.start_time,
            request.end_time,
        );
        store_or_remove(self.media.add_trim(clip), &[output.clone()]).await?;
        Ok(PipelineOutput::artifact(output))
    }

    async fn overlay(
        &self,
        request: &OverlayRequest,
        logger: &JobLogger,
    ) -> WorkerResult<PipelineOutput> {
        let media = self.load_media(&request.media_id).await?;
        let kind = request.kind()?;
        let output = self.output_path(format!("overlay_{}.mp4", Uuid::new_v4()));

        let command = match kind {
            OverlayKind::Image => self.synth.image_overlay(
                &media.path,
                Path::new(&request.content),
                &output,
                request.position_x,
                request.position_y,
            ),
            OverlayKind::Text | OverlayKind::Watermark => {
                let font = self.fonts.resolve(&request.language).await;
                match &font {
                    Some(path) => {
                        debug!(language = %request.language, font = %path.display(), "Using font")
                    }
                    None => logger.log_warning(&format!(
                        "No font for language '{}', using tool default",
                        request.language
                    )),
                }
                self.synth
                    .text_overlay(&media.path, &output, request, font.as_deref())
            }
        };
        self.run_producing(&command, &output, logger).await?;

        let record = OverlayRecord::from_request(request, kind, output.clone());
        store_or_remove(self.media.add_overlay(record), &[output.clone()]).await?;
        Ok(PipelineOutput::artifact(output))
    }

    async fn watermark(
        &self,
        request: &WatermarkRequest,
        logger: &JobLogger,
    ) -> WorkerResult<PipelineOutput> {
        let media = self.load_media(&request.media_id).await?;
        let output = self.output_path(format!("watermark_{}.mp4", Uuid::new_v4()));

        let position = watermark_position(&request.position, media.width, media.height);
        debug!(anchor = %request.position, position = %position, "Watermark placement");

        let command = self.synth.watermark(
            &media.path,
            &request.watermark_path,
            &output,
            request.opacity,
            &position,
        );
        self.run_producing(&command, &output, logger).await?;

        let record = OverlayRecord::from_watermark(request, output.clone());
        store_or_remove(self.media.add_overlay(record), &[output.clone()]).await?;
        Ok(PipelineOutput::artifact(output))
    }

    async fn quality(
        &self,
        request: &QualityRequest,
        logger: &JobLogger,
    ) -> WorkerResult<PipelineOutput> {
        let media = self.load_media(&request.media_id).await?;
        let qualities = request.parsed_qualities()?;

        let targets: Vec<_> = qualities
            .iter()
            .map(|quality| {
                let suffix = Uuid::new_v4().simple().to_string();
                let name = format!("{}_{}_{}.mp4", media.id, quality, &suffix[..8]);
                (*quality, self.output_path(name))
            })
            .collect();
        let commands = self.synth.quality_set(&media.path, &targets);

        let mut produced: Vec<PathBuf> = Vec::with_capacity(targets.len());
        for (command, (quality, output)) in commands.iter().zip(&targets) {
            logger.log_progress(&format!("Converting to {}", quality));
            produced.push(output.clone());
            if let Err(e) = self.run_producing(command, output, logger).await {
                remove_all(&produced).await;
                return Err(e);
            }
        }

        let mut variants = Vec::with_capacity(targets.len());
        for (quality, output) in &targets {
            match file_size(output).await {
                Ok(size) => variants.push(QualityVariant::new(
                    media.id.clone(),
                    *quality,
                    output.clone(),
                    size,
                )),
                Err(e) => {
                    remove_all(&produced).await;
                    return Err(e.into());
                }
            }
        }
        store_or_remove(self.media.add_quality_variants(variants), &produced).await?;

        let result_path = produced
            .last()
            .cloned()
            .ok_or_else(|| WorkerError::pipeline("No quality variants produced"))?;
        Ok(PipelineOutput::artifact(result_path))
    }

    async fn load_media(&self, id: &MediaId) -> WorkerResult<Media> {
        self.media
            .get_media(id)
            .await?
            .ok_or_else(|| WorkerError::not_found("media", id))
    }

    fn output_path(&self, name: String) -> PathBuf {
        self.output_dir.join(name)
    }

    /// Run a command expected to write `output`, removing it on failure.
    async fn run_producing(
        &self,
        command: &ToolCommand,
        output: &Path,
        logger: &JobLogger,
    ) -> WorkerResult<()> {
        ensure_parent(output).await?;
        logger.log_progress(&format!("Running {}", command.program()));
        match self.runner.run(command).await {
            Ok(_) => {
                info!(output = %output.display(), "Tool run succeeded");
                Ok(())
            }
            Err(e) => {
                remove_quietly(output).await;
                Err(e.into())
            }
        }
    }
}

/// Await a record write, removing `produced` if it fails.
async fn store_or_remove<F>(store: F, produced: &[PathBuf]) -> WorkerResult<()>
where
    F: Future<Output = StoreResult<()>>,
{
    if let Err(e) = store.await {
        remove_all(produced).await;
        return Err(e.into());
    }
    Ok(())
}

async fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        remove_quietly(path).await;
    }
}
