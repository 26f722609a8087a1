//! Container execution and process management.

use super::BuildRun;
use super::config::{CONTAINER_RUN_TIMEOUT, KILL_GRACE, STDERR_TAIL_LINES};
use crate::cli::RuntimeConfig;
use crate::error::{CliError, PackagingError, Result};
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;

/// Result of container execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRunResult {
    /// Exit code of the container process (-1 when killed by a signal)
    pub exit_code: i32,
    /// Trailing stderr lines
    pub stderr_lines: Vec<String>,
}

impl ContainerRunResult {
    /// Whether the build command succeeded.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Builds runtime arguments for a build run.
///
/// The container is removed on exit; the only state it leaves behind is what
/// it wrote into the bind-mounted scratch directories.
pub fn build_run_args(run: &BuildRun) -> Vec<String> {
    let mut args = vec!["run".to_string(), "--rm".to_string()];

    for mount in &run.mounts {
        args.push("-v".to_string());
        args.push(mount.volume_arg(run.runtime));
    }

    args.push(run.image_tag.clone());
    args.push("sh".to_string());
    args.push("-c".to_string());
    args.push(run.run_command.clone());
    args
}

/// Runs a container and streams its output.
///
/// A non-zero exit is reported in the result, not as an error; only spawn
/// failures and timeouts are errors here.
pub async fn run_container(
    program: &Path,
    args: Vec<String>,
    runtime_config: &RuntimeConfig,
) -> Result<ContainerRunResult> {
    runtime_config.verbose_println(&format!("{} {}", program.display(), args.join(" ")));

    let mut child = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            PackagingError::Cli(CliError::ExecutionFailed {
                command: format!("{} {}", program.display(), args.join(" ")),
                reason: e.to_string(),
            })
        })?;

    drive_child(&mut child, None, CONTAINER_RUN_TIMEOUT, "run", runtime_config).await
}

/// Feeds stdin, streams stdout/stderr through the reporter and waits for exit,
/// all bounded by `limit`. On timeout the child is killed and reaped.
pub(super) async fn drive_child(
    child: &mut Child,
    stdin_payload: Option<&[u8]>,
    limit: Duration,
    stage: &str,
    runtime_config: &RuntimeConfig,
) -> Result<ContainerRunResult> {
    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let driven = timeout(limit, async {
        let (_, _, stderr_tail) = tokio::join!(
            async {
                if let (Some(mut stdin), Some(payload)) = (stdin, stdin_payload) {
                    // The runtime may exit before reading everything; its exit status
                    // is what gets reported.
                    if let Err(e) = stdin.write_all(payload).await {
                        log::debug!("Writing {} stdin failed: {}", stage, e);
                    }
                }
            },
            async {
                if let Some(stdout) = stdout {
                    let mut reader = BufReader::new(stdout);
                    let mut buf = Vec::new();
                    while let Some(line) = next_lossy_line(&mut reader, &mut buf).await {
                        runtime_config.indent(&line);
                    }
                }
            },
            async {
                let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
                if let Some(stderr) = stderr {
                    let mut reader = BufReader::new(stderr);
                    let mut buf = Vec::new();
                    while let Some(line) = next_lossy_line(&mut reader, &mut buf).await {
                        runtime_config.indent(&line);
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                }
                tail
            }
        );
        child.wait().await.map(|status| (status, stderr_tail))
    })
    .await;

    match driven {
        Ok(Ok((status, stderr_tail))) => Ok(ContainerRunResult {
            exit_code: status.code().unwrap_or(-1),
            stderr_lines: stderr_tail.into(),
        }),
        Ok(Err(e)) => Err(PackagingError::Cli(CliError::ExecutionFailed {
            command: format!("container {}", stage),
            reason: e.to_string(),
        })),
        Err(_elapsed) => {
            runtime_config.warn(&format!(
                "Container {} timed out after {} minutes, terminating...",
                stage,
                limit.as_secs() / 60
            ));

            if let Err(e) = child.kill().await {
                runtime_config.warn(&format!("Failed to kill container {} process: {}", stage, e));
            }
            let _ = timeout(KILL_GRACE, child.wait()).await;

            Err(PackagingError::ContainerFailure {
                stage: stage.to_string(),
                exit_code: -1,
                stderr: vec![format!("timed out after {} seconds", limit.as_secs())],
            })
        }
    }
}

/// Reads one newline-terminated line, replacing invalid UTF-8.
///
/// Returns `None` at EOF or on a read error. Build tools print arbitrary
/// bytes, so the pipe is always drained to EOF regardless of encoding.
async fn next_lossy_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> Option<String> {
    buf.clear();
    match reader.read_until(b'\n', buf).await {
        Ok(0) => None,
        Ok(_) => {
            while matches!(buf.last(), Some(b'\n' | b'\r')) {
                buf.pop();
            }
            Some(String::from_utf8_lossy(buf).into_owned())
        }
        Err(e) => {
            log::debug!("Reading container output failed: {}", e);
            None
        }
    }
}
