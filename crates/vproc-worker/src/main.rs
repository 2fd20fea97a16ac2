//! Video processing worker binary.
//!
//! Reads newline-delimited JSON job requests from stdin and prints one
//! JSON line per submission.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vproc_media::{CommandSynthesizer, FallbackChain, FontResolver, FontTable, ProcessRunner};
use vproc_models::JobRequest;
use vproc_store::{InMemoryJobRepository, InMemoryMediaRepository};
use vproc_worker::{
    metrics, DispatcherSettings, JobDispatcher, JobLifecycle, PipelineContext, ProgressChannel,
    SystemStats, WorkerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("vproc=info".parse()?);

    // Logs go to stderr; stdout carries submission results.
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting vproc-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        match metrics::install_exporter(port) {
            Ok(()) => info!(port, "Prometheus exporter listening"),
            Err(e) => warn!("Failed to install metrics exporter: {}", e),
        }
    }

    let tools = config.tool_paths();
    if let Err(e) = tools.verify() {
        warn!("{}; jobs using it will fail", e);
    }

    for dir in [&config.upload_dir, &config.output_dir, &config.fonts_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }

    let fonts = FontResolver::new(
        config.font_config(),
        FontTable::indic(),
        FallbackChain::platform_default(),
    )
    .context("creating font resolver")?;
    fonts.warm_cache().await;

    let mut runner = ProcessRunner::new();
    if let Some(limit) = config.tool_timeout {
        runner = runner.with_timeout(limit);
    }

    let progress = ProgressChannel::default();
    let jobs = Arc::new(InMemoryJobRepository::new());
    let media = Arc::new(InMemoryMediaRepository::new());
    let lifecycle = JobLifecycle::new(jobs.clone(), progress.clone());
    let pipeline = PipelineContext {
        synth: CommandSynthesizer::new(tools),
        runner: Arc::new(runner),
        fonts: Arc::new(fonts),
        media: media.clone(),
        upload_dir: config.upload_dir.clone(),
        output_dir: config.output_dir.clone(),
    };
    let dispatcher = JobDispatcher::start(
        DispatcherSettings {
            max_concurrent_jobs: config.max_concurrent_jobs,
            queue_capacity: config.queue_capacity,
        },
        lifecycle,
        pipeline,
    );

    let mut updates = progress.subscribe();
    let update_log = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => info!(
                    job_id = %update.job_id,
                    status = %update.status,
                    progress = update.progress,
                    "Job update"
                ),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Job update log lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => submit_line(&dispatcher, &line).await,
                    Ok(None) => {
                        info!("Input closed");
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read input: {}", e);
                        break;
                    }
                }
            }
        }
    }

    if !dispatcher.shutdown(config.shutdown_timeout).await {
        warn!("Exiting with unfinished jobs");
    }
    match SystemStats::collect(jobs.as_ref(), media.as_ref()).await {
        Ok(stats) => info!(
            total_jobs = stats.total_jobs,
            completed_jobs = stats.completed_jobs,
            failed_jobs = stats.failed_jobs,
            total_media = stats.total_media,
            storage_used = stats.storage_used,
            "Final stats"
        ),
        Err(e) => warn!("Failed to collect stats: {}", e),
    }
    update_log.abort();

    info!("Worker shutdown complete");
    Ok(())
}

async fn submit_line(dispatcher: &JobDispatcher, line: &str) {
    let response = match serde_json::from_str::<JobRequest>(line) {
        Ok(request) => match dispatcher.submit(request).await {
            Ok(job_id) => serde_json::json!({ "jobId": job_id }),
            Err(e) => {
                warn!("Job rejected: {}", e);
                serde_json::json!({ "error": e.to_string() })
            }
        },
        Err(e) => {
            warn!("Invalid request: {}", e);
            serde_json::json!({ "error": format!("Invalid request: {}", e) })
        }
    };
    println!("{}", response);
}
