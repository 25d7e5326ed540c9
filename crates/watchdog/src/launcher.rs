//! Process launcher seam.
//!
//! Launching is the only process-management capability the watchdog needs:
//! the child is detached and lives (or dies) on its own. Its stdout/stderr
//! are forwarded line-by-line into the logging sink, never parsed.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Launch port consumed by the supervisor.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Spawn a detached instance of the supervised service. Returns once the
    /// child has been spawned; the caller does not own the child's lifetime.
    async fn launch(&self) -> anyhow::Result<()>;
}

/// Launches the prediction service from a configured command line.
pub struct CommandLauncher {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl CommandLauncher {
    /// Build from a whitespace-separated command line, e.g.
    /// `python3 prediction_service/start_api_service.py`.
    pub fn from_command_line(line: &str) -> anyhow::Result<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("prediction service command is empty"))?;

        Ok(Self {
            program,
            args: parts.collect(),
            envs: Vec::new(),
        })
    }

    /// Add an environment variable for the launched process.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

#[async_trait]
impl ProcessLauncher for CommandLauncher {
    async fn launch(&self) -> anyhow::Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false)
            .spawn()?;

        let pid = child.id().unwrap_or_default();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, "stderr"));
        }

        // Reap the child when it eventually exits; we never kill it ourselves.
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    tracing::warn!(pid, %status, "Prediction service process exited")
                }
                Err(e) => tracing::error!(pid, error = %e, "Failed to await prediction service"),
            }
        });

        tracing::info!(program = %self.program, pid, "Prediction service launched");
        Ok(())
    }
}

/// Pump one output stream of the child into tracing.
async fn forward_output<R: AsyncRead + Unpin + Send + 'static>(stream: R, channel: &'static str) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::info!(target: "prediction_service", channel, "{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_command_line_splits_program_and_args() {
        let launcher =
            CommandLauncher::from_command_line("python3 prediction_service/start_api_service.py")
                .unwrap();
        assert_eq!(launcher.program, "python3");
        assert_eq!(launcher.args, vec!["prediction_service/start_api_service.py"]);
    }

    #[test]
    fn test_from_command_line_rejects_empty() {
        assert!(CommandLauncher::from_command_line("").is_err());
        assert!(CommandLauncher::from_command_line("   ").is_err());
    }
}
