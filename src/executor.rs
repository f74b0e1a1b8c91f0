//! Runs a deploy command and collects what it prints

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::error::{DeployError, Result};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// What a finished (or timed out) process left behind
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    /// `None` when the process was killed by a signal or by the timeout
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Spawns commands without a shell and waits for them with a time limit.
///
/// [`CommandExecutor::run`] resolves exactly once per call: either the
/// process was started and an outcome exists, or it never started and the
/// caller gets [`DeployError::SpawnFailed`].
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run(
        &self,
        command: &str,
        args: &[String],
        working_dir: &Path,
    ) -> Result<CommandOutcome> {
        info!(
            "Running (cwd = '{}'): {} {}",
            working_dir.display(),
            command,
            args.join(" ")
        );

        let mut cmd = Command::new(command);
        cmd.args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout can reach whatever the command spawns
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|source| {
                error!("{} failed to start: {}", command, source);
                DeployError::SpawnFailed {
                    command: command.to_string(),
                    source,
                }
            })?;

        let process_group = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        // Exit status is only collected after both pipes hit EOF, so every
        // chunk is buffered before the outcome exists.
        let finished = tokio::time::timeout(self.timeout, async {
            tokio::join!(
                drain(stdout, "stdout", &mut stdout_buf),
                drain(stderr, "stderr", &mut stderr_buf)
            );
            child.wait().await
        })
        .await;

        let (exit_code, timed_out) = match finished {
            Ok(Ok(status)) => (status.code(), false),
            Ok(Err(e)) => {
                // The child was spawned but can no longer be waited on
                error!("Waiting on {} failed: {}", command, e);
                return Err(DeployError::IoError(e));
            }
            Err(_) => {
                warn!(
                    "{} exceeded {}s, killing it",
                    command,
                    self.timeout.as_secs_f64()
                );
                kill_process_group(process_group);
                if let Err(e) = child.kill().await {
                    error!("Failed to kill {}: {}", command, e);
                }
                (None, true)
            }
        };

        let outcome = CommandOutcome {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout_buf).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_buf).into_owned(),
            timed_out,
        };

        match outcome.exit_code {
            Some(code) => info!("{} exited with code {}", command, code),
            None => info!("{} exited without a code", command),
        }
        Ok(outcome)
    }
}

/// SIGKILLs every process in the group led by `pgid`.
#[cfg(unix)]
fn kill_process_group(pgid: Option<u32>) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pgid) = pgid.and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        warn!("Failed to kill process group {}: {}", pgid, e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: Option<u32>) {}

/// Appends everything readable from `stream` to `buf`, chunk by chunk.
async fn drain<R>(stream: Option<R>, name: &'static str, buf: &mut Vec<u8>)
where
    R: AsyncRead + Unpin,
{
    let Some(mut stream) = stream else {
        return;
    };
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                debug!(stream = name, "{}", String::from_utf8_lossy(&chunk[..n]));
                buf.extend_from_slice(&chunk[..n]);
            }
            Err(e) => {
                warn!("Reading {} failed: {}", name, e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    fn here() -> PathBuf {
        PathBuf::from(".")
    }

    #[tokio::test]
    async fn zero_exit_is_success() {
        let executor = CommandExecutor::new(Duration::from_secs(10));
        let outcome = executor
            .run("sh", &sh("printf 'built'"), &here())
            .await
            .unwrap();

        assert!(outcome.success());
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.stdout, "built");
        assert_eq!(outcome.stderr, "");
    }

    #[tokio::test]
    async fn non_zero_exit_keeps_both_streams() {
        let executor = CommandExecutor::new(Duration::from_secs(10));
        let outcome = executor
            .run(
                "sh",
                &sh("printf 'step 1\\n'; printf 'build failed' >&2; exit 3"),
                &here(),
            )
            .await
            .unwrap();

        assert!(!outcome.success());
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.stdout, "step 1\n");
        assert_eq!(outcome.stderr, "build failed");
    }

    #[tokio::test]
    async fn interleaved_output_is_kept_in_order_per_stream() {
        let executor = CommandExecutor::new(Duration::from_secs(10));
        let script = "for i in 1 2 3; do printf \"o$i \"; printf \"e$i \" >&2; done";
        let outcome = executor.run("sh", &sh(script), &here()).await.unwrap();

        assert_eq!(outcome.stdout, "o1 o2 o3 ");
        assert_eq!(outcome.stderr, "e1 e2 e3 ");
    }

    #[tokio::test]
    async fn large_output_is_fully_captured() {
        let executor = CommandExecutor::new(Duration::from_secs(10));
        let outcome = executor
            .run("sh", &sh("head -c 200000 /dev/zero | tr '\\0' 'x'"), &here())
            .await
            .unwrap();

        assert!(outcome.success());
        assert_eq!(outcome.stdout.len(), 200_000);
    }

    #[tokio::test]
    async fn arguments_are_not_shell_interpolated() {
        let executor = CommandExecutor::new(Duration::from_secs(10));
        let args = vec!["$HOME; echo injected".to_string()];
        let outcome = executor.run("echo", &args, &here()).await.unwrap();

        assert_eq!(outcome.stdout, "$HOME; echo injected\n");
    }

    #[tokio::test]
    async fn runs_in_the_given_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "present").unwrap();
        let executor = CommandExecutor::new(Duration::from_secs(10));
        let outcome = executor
            .run("cat", &["marker.txt".to_string()], dir.path())
            .await
            .unwrap();

        assert_eq!(outcome.stdout, "present");
    }

    #[tokio::test]
    async fn missing_executable_is_a_spawn_error() {
        let executor = CommandExecutor::new(Duration::from_secs(10));
        let result = executor
            .run("definitely-not-a-real-binary-7f3a", &[], &here())
            .await;

        match result {
            Err(DeployError::SpawnFailed { command, .. }) => {
                assert_eq!(command, "definitely-not-a-real-binary-7f3a")
            }
            other => panic!("expected spawn failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn timeout_kills_the_child_and_reports_failure() {
        let executor = CommandExecutor::new(Duration::from_millis(200));
        let started = std::time::Instant::now();
        let outcome = executor
            .run("sh", &sh("printf 'started'; exec sleep 30"), &here())
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(outcome.timed_out);
        assert!(!outcome.success());
        assert_eq!(outcome.exit_code, None);
        assert_eq!(outcome.stdout, "started");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_also_kills_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        let executor = CommandExecutor::new(Duration::from_millis(200));
        let outcome = executor
            .run("sh", &sh("sh -c 'sleep 1; touch done'; true"), dir.path())
            .await
            .unwrap();
        assert!(outcome.timed_out);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(
            !dir.path().join("done").exists(),
            "nested command outlived the timeout"
        );
    }
}
