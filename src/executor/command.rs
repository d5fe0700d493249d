//! Command-backed item operation.
//!
//! Runs a shell command once per item. The payload is handed to the command as
//! JSON in the `BULKRUN_ITEM` environment variable. Exit code 0 is success,
//! exit codes listed as terminal end the item, anything else is transient.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;

use super::operation::{ItemOperation, OperationError};

/// Environment variable carrying the JSON-encoded payload
pub const ITEM_ENV: &str = "BULKRUN_ITEM";

/// Configuration for a command operation
#[derive(Debug, Clone)]
pub struct CommandOperation {
    /// Shell command, run with `sh -c`
    command: String,

    /// Exit codes that mean "do not retry"
    terminal_exit_codes: Vec<i32>,

    /// Working directory (defaults to the current directory)
    working_dir: Option<PathBuf>,
}

impl CommandOperation {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            terminal_exit_codes: Vec::new(),
            working_dir: None,
        }
    }

    /// Treat these exit codes as terminal failures
    pub fn with_terminal_exit_codes(mut self, codes: Vec<i32>) -> Self {
        self.terminal_exit_codes = codes;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn classify(&self, exit_code: Option<i32>, stdout: &str, stderr: &str) -> OperationError {
        let message = failure_message(exit_code, stdout, stderr);
        match exit_code {
            Some(code) if self.terminal_exit_codes.contains(&code) => OperationError::Terminal(message),
            _ => OperationError::Transient(message),
        }
    }
}

/// First few lines of stderr (or stdout), else the exit code
fn failure_message(exit_code: Option<i32>, stdout: &str, stderr: &str) -> String {
    let detail = if !stderr.trim().is_empty() {
        stderr.lines().take(5).collect::<Vec<_>>().join("\n")
    } else if !stdout.trim().is_empty() {
        stdout.lines().take(5).collect::<Vec<_>>().join("\n")
    } else {
        String::new()
    };

    match (exit_code, detail.is_empty()) {
        (Some(code), true) => format!("command exited with code {}", code),
        (Some(code), false) => format!("command exited with code {}: {}", code, detail),
        (None, true) => "command terminated by signal".to_string(),
        (None, false) => format!("command terminated by signal: {}", detail),
    }
}

#[async_trait]
impl<P> ItemOperation<P> for CommandOperation
where
    P: Serialize + Send + Sync + 'static,
{
    async fn execute(&self, payload: Arc<P>) -> Result<(), OperationError> {
        let item_json = serde_json::to_string(payload.as_ref())
            .map_err(|e| OperationError::terminal(format!("payload cannot be encoded as JSON: {}", e)))?;

        let mut cmd = Command::new("sh");
        cmd.args(["-c", &self.command])
            .env(ITEM_ENV, item_json)
            .stdin(Stdio::null());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| OperationError::transient(format!("failed to spawn command: {}", e)))?;

        if output.status.success() {
            return Ok(());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(self.classify(output.status.code(), &stdout, &stderr))
    }
}
