//! Shared fixtures for dispatcher integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;
use tokio::sync::Semaphore;

use vproc_media::{
    CommandSynthesizer, FallbackChain, FontResolver, FontResolverConfig, FontTable, MediaError,
    MediaResult, ToolCommand, ToolOutput, ToolPaths, ToolRunner,
};
use vproc_models::{Job, JobId, JobStatus, Media, MediaId};
use vproc_store::{InMemoryJobRepository, InMemoryMediaRepository, JobRepository, MediaRepository};
use vproc_worker::{
    DispatcherSettings, JobDispatcher, JobLifecycle, PipelineContext, ProgressChannel,
};

pub const PROBE_JSON: &str = r#"{
    "streams": [
        {"codec_type": "audio"},
        {"codec_type": "video", "width": 1920, "height": 1080, "duration": "12.5"}
    ],
    "format": {"duration": "12.480000"}
}"#;

/// Tool runner double: answers probes with canned JSON and writes a small
/// file at every other command's output path.
#[derive(Default)]
pub struct ScriptedRunner {
    calls: Mutex<Vec<ToolCommand>>,
    failure: Option<(i32, String)>,
    fail_on_call: Option<usize>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every run exits with `code` and `output`.
    pub fn failing(code: i32, output: &str) -> Self {
        Self {
            failure: Some((code, output.to_string())),
            ..Self::default()
        }
    }

    /// Only the `call`-th run (1-based) exits with `code` and `output`.
    pub fn failing_on_call(call: usize, code: i32, output: &str) -> Self {
        Self {
            failure: Some((code, output.to_string())),
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    /// Runs block until the returned semaphore gets a permit.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let runner = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::default()
        };
        (runner, gate)
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolRunner for ScriptedRunner {
    async fn run(&self, command: &ToolCommand) -> MediaResult<ToolOutput> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(command.clone());
            calls.len()
        };

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }
        let fails_now = self.fail_on_call.map_or(true, |n| n == call);
        if let Some((code, output)) = self.failure.as_ref().filter(|_| fails_now) {
            return Err(MediaError::tool_failed(command.program(), Some(*code), output));
        }
        if command.program() == ToolPaths::default().ffprobe {
            return Ok(ToolOutput {
                exit_code: 0,
                combined: PROBE_JSON.to_string(),
                stdout: PROBE_JSON.to_string(),
            });
        }
        if let Some(output) = command.output_path() {
            tokio::fs::write(output, b"rendered").await?;
        }
        Ok(ToolOutput::default())
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub dispatcher: JobDispatcher,
    pub media: Arc<InMemoryMediaRepository>,
    pub progress: ProgressChannel,
}

pub struct HarnessBuilder {
    runner: Arc<dyn ToolRunner>,
    jobs: Arc<dyn JobRepository>,
    tools: ToolPaths,
    table: FontTable,
    settings: DispatcherSettings,
}

impl HarnessBuilder {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            runner,
            jobs: Arc::new(InMemoryJobRepository::new()),
            tools: ToolPaths::default(),
            table: FontTable::new(),
            settings: DispatcherSettings {
                max_concurrent_jobs: 2,
                queue_capacity: 8,
            },
        }
    }

    pub fn jobs(mut self, jobs: Arc<dyn JobRepository>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }

    pub fn fonts(mut self, table: FontTable) -> Self {
        self.table = table;
        self
    }

    pub fn settings(mut self, max_concurrent_jobs: usize, queue_capacity: usize) -> Self {
        self.settings = DispatcherSettings {
            max_concurrent_jobs,
            queue_capacity,
        };
        self
    }

    pub fn build(self) -> Harness {
        let dir = TempDir::new().unwrap();
        let fonts = FontResolver::new(
            FontResolverConfig {
                fonts_dir: dir.path().join("fonts"),
                download_attempts: 1,
                retry_base: Duration::from_millis(10),
                connect_timeout: Duration::from_secs(2),
                request_timeout: Duration::from_secs(5),
            },
            self.table,
            FallbackChain::empty(),
        )
        .unwrap();

        let progress = ProgressChannel::default();
        let media = Arc::new(InMemoryMediaRepository::new());
        let lifecycle = JobLifecycle::new(self.jobs, progress.clone());
        let pipeline = PipelineContext {
            synth: CommandSynthesizer::new(self.tools),
            runner: self.runner,
            fonts: Arc::new(fonts),
            media: media.clone(),
            upload_dir: dir.path().join("uploads"),
            output_dir: dir.path().join("outputs"),
        };
        let dispatcher = JobDispatcher::start(self.settings, lifecycle, pipeline);

        Harness {
            dir,
            dispatcher,
            media,
            progress,
        }
    }
}

impl Harness {
    pub fn fonts_dir(&self) -> PathBuf {
        self.dir.path().join("fonts")
    }

    /// Write a file under the scratch directory.
    pub fn write_file(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Store a 1920x1080 media record backed by a real file.
    pub async fn seed_media(&self, name: &str) -> Media {
        let path = self.write_file(&format!("uploads/{}", name), b"source video");
        let media = Media {
            id: MediaId::new(),
            filename: name.to_string(),
            original_filename: name.to_string(),
            path,
            duration: 30.0,
            width: 1920,
            height: 1080,
            size: 12,
            created_at: Utc::now(),
        };
        self.media.insert_media(media.clone()).await.unwrap();
        media
    }

    pub async fn wait_for_status(&self, id: &JobId, status: JobStatus) -> Job {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let job = self.dispatcher.get_job(id).await.unwrap();
            if job.status == status {
                return job;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job {} stuck in {} waiting for {}",
                id,
                job.status,
                status
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn wait_for_terminal(&self, id: &JobId) -> Job {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let job = self.dispatcher.get_job(id).await.unwrap();
            if job.status.is_terminal() {
                return job;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job {} never finished",
                id
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Value following `flag` in an argument list.
pub fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}
