//! Bash tool: execute shell commands for the model.
//!
//! Each call spawns a fresh `sh -c`. Output goes to `output`, a non-zero exit
//! or stderr from a failed command goes to `error`. Commands that outlive the
//! timeout are killed.

use async_trait::async_trait;
use autoloop_core::error::ToolError;
use autoloop_core::tool::{Tool, ToolOutput};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Run shell commands with a per-call timeout.
pub struct BashTool {
    timeout: Duration,
    working_dir: Option<PathBuf>,
}

impl BashTool {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            working_dir: None,
        }
    }

    /// Run every command from `dir` instead of the process's cwd.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl Default for BashTool {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str { "bash" }

    fn description(&self) -> &str {
        "Run a command in a bash shell. Use this to inspect files, run programs, and \
         install packages. Output is truncated if it is very long."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to run"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let command = arguments["command"]
            .as_str()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;

        debug!(command = %command, "Executing bash command");

        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]).kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ToolError::ExecutionFailed {
                    tool_name: "bash".into(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(ToolError::Timeout {
                    tool_name: "bash".into(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();

        if output.status.success() {
            let mut result = ToolOutput::success(stdout);
            // Warnings on a successful run are kept beside the output.
            if !stderr.is_empty() {
                result = result.with_system(format!("stderr: {stderr}"));
            }
            return Ok(result);
        }

        let code = output.status.code().unwrap_or(-1);
        warn!(command = %command, exit_code = code, "Command failed");
        let error = if stderr.is_empty() {
            format!("exit code {code}")
        } else {
            format!("exit code {code}: {stderr}")
        };
        Ok(ToolOutput {
            output: (!stdout.is_empty()).then_some(stdout),
            error: Some(error),
            ..ToolOutput::default()
        })
    }
}
