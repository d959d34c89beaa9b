//! Privileged command execution through the system elevation prompt

use std::process::ExitStatus;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

/// Result of a finished privileged command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Exit code, `None` if the process was killed by a signal
    pub code: Option<i32>,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for CommandOutcome {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// Errors raised while launching a privileged command
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("failed to launch '{helper}': {source}")]
    Spawn {
        helper: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs shell commands with elevated privileges
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str) -> Result<CommandOutcome, CommandError>;
}

/// Runs `<helper> sh -c <command>`, e.g. through pkexec
#[derive(Debug, Clone)]
pub struct ElevatedShell {
    helper: String,
}

impl ElevatedShell {
    pub fn new(helper: impl Into<String>) -> Self {
        Self {
            helper: helper.into(),
        }
    }
}

#[async_trait]
impl CommandRunner for ElevatedShell {
    async fn run(&self, command: &str) -> Result<CommandOutcome, CommandError> {
        info!(helper = %self.helper, command, "running privileged command");
        let status = Command::new(&self.helper)
            .args(["sh", "-c", command])
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| CommandError::Spawn {
                helper: self.helper.clone(),
                source,
            })?;

        let outcome = CommandOutcome::from(status);
        debug!(?outcome, "privileged command finished");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_helper_exit_code_is_reported() {
        // `env sh -c ...` stands in for the elevation helper
        let runner = ElevatedShell::new("env");
        let ok = runner.run("exit 0").await.unwrap();
        assert!(ok.success());

        let failed = runner.run("exit 3").await.unwrap();
        assert_eq!(failed.code, Some(3));
        assert!(!failed.success());
    }

    #[test]
    fn test_missing_helper_is_an_error() {
        let runner = ElevatedShell::new("/nonexistent/elevate-helper");
        let result = tokio_test::block_on(runner.run("true"));
        assert!(matches!(result, Err(CommandError::Spawn { .. })));
    }
}
