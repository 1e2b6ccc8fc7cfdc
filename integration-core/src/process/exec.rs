//! Running an external binary with a static argument vector — never a shell
//! string — and capturing its output.

use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::coordination::CancellationToken;
use crate::error::{Error, Result};

/// The outcome of a successful invocation: raw stdout bytes. Callers decode
/// as text or structured data themselves.
pub type Output = Vec<u8>;

/// Describes one subprocess invocation. Built with the `with_*` methods
/// rather than public fields, so adding an option never breaks callers.
#[derive(Debug)]
pub struct ExecCommand {
    program: String,
    args: Vec<String>,
    working_dir: Option<String>,
    stdin: Option<Vec<u8>>,
}

impl ExecCommand {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: None,
            stdin: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Runs the command, suspending (not blocking a worker thread) until it
    /// exits or `cancellation` fires. On cancellation, the child is killed
    /// and reaped before returning, so no zombie process is left behind.
    pub async fn run(self, cancellation: &CancellationToken) -> Result<Output> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.working_dir {
            command.current_dir(Path::new(dir));
        }
        command.stdout(std::process::Stdio::piped());
        command.stderr(std::process::Stdio::piped());
        command.stdin(if self.stdin.is_some() {
            std::process::Stdio::piped()
        } else {
            std::process::Stdio::null()
        });

        debug!(program = %self.program, args = ?self.args, "spawning subprocess");
        let mut child = command.spawn().map_err(|err| {
            Error::with_source(
                crate::error::ErrorKind::ExternalFailure,
                format!("failed to spawn {}", self.program),
                err,
            )
            .context("subprocess spawn")
        })?;

        if let Some(input) = self.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(&input).await.map_err(Error::from)?;
            }
        }

        let mut stdout_pipe = child.stdout.take().expect("stdout was piped");
        let mut stderr_pipe = child.stderr.take().expect("stderr was piped");
        let stdout_reader = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stdout_pipe.read_to_end(&mut buf).await;
            buf
        });
        let stderr_reader = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr_pipe.read_to_end(&mut buf).await;
            buf
        });

        let status = tokio::select! {
            result = child.wait() => result.map_err(Error::from)?,
            _ = cancellation.cancelled() => {
                warn!(program = %self.program, "subprocess cancelled, killing child");
                child.kill().await.map_err(Error::from)?;
                let _ = child.wait().await;
                return Err(Error::internal("subprocess cancelled").context("subprocess run"));
            }
        };

        let stdout = stdout_reader.await.unwrap_or_default();
        let stderr = stderr_reader.await.unwrap_or_default();

        if status.success() {
            Ok(stdout)
        } else {
            let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
            warn!(program = %self.program, args = ?self.args, %stderr, "subprocess exited non-zero");
            Err(Error::external_failure(format!(
                "`{} {}` exited non-zero: {stderr}",
                self.program,
                self.args.join(" "),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_on_success() {
        let cancellation = CancellationToken::new();
        let output = ExecCommand::new("printf", ["hello"])
            .run(&cancellation)
            .await
            .expect("printf should succeed");
        assert_eq!(output, b"hello");
    }

    #[tokio::test]
    async fn non_zero_exit_carries_trimmed_stderr() {
        let cancellation = CancellationToken::new();
        let result = ExecCommand::new("sh", ["-c", "echo oops 1>&2; exit 1"])
            .run(&cancellation)
            .await;
        let err = result.expect_err("sh -c exit 1 should fail");
        assert!(err.to_string().contains("oops"));
    }

    #[tokio::test]
    async fn stdin_is_forwarded() {
        let cancellation = CancellationToken::new();
        let output = ExecCommand::new("cat", Vec::<String>::new())
            .with_stdin(b"piped in".to_vec())
            .run(&cancellation)
            .await
            .expect("cat should echo stdin");
        assert_eq!(output, b"piped in");
    }
}
