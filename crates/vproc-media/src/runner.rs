//! External process runner.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::command::ToolCommand;
use crate::error::{MediaError, MediaResult};

/// Locale forced on every tool run so non-ASCII overlay text is decoded
/// consistently.
pub const TOOL_LOCALE: &str = "en_US.UTF-8";

/// Output of a successful tool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code (always 0 for a returned output)
    pub exit_code: i32,
    /// Standard output and standard error merged in arrival order
    pub combined: String,
    /// Standard output alone
    pub stdout: String,
}

/// Executes a built command and classifies its exit status.
///
/// A non-zero exit is returned as [`MediaError::ToolFailed`]. Runners never
/// retry.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, command: &ToolCommand) -> MediaResult<ToolOutput>;
}

/// [`ToolRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    /// Wall-clock limit per run
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill runs that exceed `limit`.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, command: &ToolCommand) -> MediaResult<ToolOutput> {
        let tool = command.program().to_string();
        info!(tool = %tool, command = %command, "Executing tool command");
        let started = Instant::now();

        let mut child = Command::new(command.program())
            .args(command.get_args())
            .env("LANG", TOOL_LOCALE)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MediaError::ToolNotFound { tool: tool.clone() },
                _ => MediaError::Io(e),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("stderr not captured"))?;

        // The child moves into the future; dropping it on timeout kills the process.
        let run = async move {
            let captured = capture_output(stdout, stderr).await?;
            let status = child.wait().await?;
            Ok::<_, MediaError>((captured, status))
        };

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(tool = %tool, limit_secs = limit.as_secs(), "Tool timed out, killing process");
                    return Err(MediaError::Timeout { tool, limit });
                }
            },
            None => run.await,
        };
        let (output, status) = outcome?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match status.code() {
            Some(0) => {
                debug!(tool = %tool, elapsed_ms, "Tool finished");
                Ok(ToolOutput {
                    exit_code: 0,
                    combined: output.combined,
                    stdout: output.stdout,
                })
            }
            code => {
                warn!(
                    tool = %tool,
                    exit_code = ?code,
                    elapsed_ms,
                    "Tool exited with failure"
                );
                Err(MediaError::tool_failed(tool, code, &output.combined))
            }
        }
    }
}

struct Captured {
    combined: String,
    stdout: String,
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

impl Captured {
    fn push_line(&mut self, stream: Stream, raw: &[u8]) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches('\n').trim_end_matches('\r');
        match stream {
            Stream::Stdout => {
                debug!(stream = "stdout", "{}", line);
                self.stdout.push_str(line);
                self.stdout.push('\n');
            }
            Stream::Stderr => debug!(stream = "stderr", "{}", line),
        }
        self.combined.push_str(line);
        self.combined.push('\n');
    }
}

/// Read both pipes to EOF, interleaving lines in the order they arrive.
/// Bytes that are not valid UTF-8 are replaced, never treated as an error.
async fn capture_output<O, E>(stdout: O, stderr: E) -> MediaResult<Captured>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out = BufReader::new(stdout);
    let mut err = BufReader::new(stderr);
    let (mut out_buf, mut err_buf) = (Vec::new(), Vec::new());
    let mut captured = Captured {
        combined: String::new(),
        stdout: String::new(),
    };
    let (mut out_open, mut err_open) = (true, true);

    while out_open || err_open {
        // A cancelled read keeps its partial line in the buffer.
        let (stream, read) = tokio::select! {
            read = out.read_until(b'\n', &mut out_buf), if out_open => (Stream::Stdout, read?),
            read = err.read_until(b'\n', &mut err_buf), if err_open => (Stream::Stderr, read?),
        };
        let buf = match stream {
            Stream::Stdout => &mut out_buf,
            Stream::Stderr => &mut err_buf,
        };
        if !buf.is_empty() {
            captured.push_line(stream, buf);
            buf.clear();
        }
        if read == 0 {
            match stream {
                Stream::Stdout => out_open = false,
                Stream::Stderr => err_open = false,
            }
        }
    }

    Ok(captured)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_success_captures_output() {
        let out = ProcessRunner::new()
            .run(&sh("echo one; echo two 1>&2; echo three"))
            .await
            .unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout, "one\nthree\n");
        assert!(out.combined.contains("one\n"));
        assert!(out.combined.contains("two\n"));
        assert!(out.combined.contains("three\n"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_tool_failure() {
        let err = ProcessRunner::new()
            .run(&sh("echo 'bad input' 1>&2; exit 1"))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(1));
        let msg = err.to_string();
        assert!(msg.contains("failed"));
        assert!(msg.contains("bad input"));
    }

    #[tokio::test]
    async fn test_locale_is_forced() {
        let out = ProcessRunner::new().run(&sh("echo $LANG")).await.unwrap();
        assert_eq!(out.stdout.trim(), TOOL_LOCALE);
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let err = ProcessRunner::new()
            .run(&ToolCommand::new("definitely-not-a-real-tool-3c1f"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let err = ProcessRunner::new()
            .with_timeout(Duration::from_millis(200))
            .run(&sh("sleep 5"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_invalid_utf8_output_is_not_fatal() {
        let out = ProcessRunner::new()
            .run(&sh("printf 'frame=1 title=\\377\\376\\n' 1>&2; printf 'done\\377'; exit 0"))
            .await
            .unwrap();
        assert_eq!(out.exit_code, 0);
        assert!(out.combined.contains("frame=1 title="));
        assert!(out.combined.contains('\u{FFFD}'));
        assert!(out.stdout.starts_with("done"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_output_lets_tool_finish() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");
        let script = format!(
            "printf '\\377\\n' 1>&2; sleep 1; touch '{}'; exit 0",
            marker.display()
        );
        ProcessRunner::new().run(&sh(&script)).await.unwrap();
        assert!(marker.exists());
    }
}
