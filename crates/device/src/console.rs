//! External console-provisioning tool.

use std::process::Stdio;

use async_trait::async_trait;
use junos_core::{Error, ProgressLog, Result, parse_version_banner};
use semver::Version;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::capability::ConsoleTool;
use crate::config::ToolingConfig;

/// Runs the console tool as a child process.
///
/// Every line the tool prints on stdout or stderr is forwarded to the
/// progress log as a notification.
#[derive(Debug, Clone)]
pub struct CommandConsoleTool {
    program: String,
}

impl CommandConsoleTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &ToolingConfig) -> Self {
        Self::new(config.console_tool.clone())
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

fn version_from_output(stdout: &[u8], stderr: &[u8]) -> Option<Version> {
    parse_version_banner(&String::from_utf8_lossy(stdout))
        .or_else(|| parse_version_banner(&String::from_utf8_lossy(stderr)))
}

fn forward(notify: &dyn ProgressLog, line: &str) {
    let line = line.trim();
    if !line.is_empty() {
        notify.record(line);
    }
}

#[async_trait]
impl ConsoleTool for CommandConsoleTool {
    async fn version(&self) -> Result<Version> {
        let output = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::console_tool(format!("failed to run {}: {e}", self.program)))?;

        version_from_output(&output.stdout, &output.stderr).ok_or_else(|| {
            Error::console_tool(format!(
                "{} --version did not report a version",
                self.program
            ))
        })
    }

    async fn run(&self, args: &[String], notify: &dyn ProgressLog) -> Result<()> {
        info!(program = %self.program, "Running console tool");
        debug!(arg_count = args.len(), "Console tool arguments prepared");

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::console_tool(format!("failed to start {}: {e}", self.program)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::console_tool("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::console_tool("stderr not captured"))?;

        let mut stdout = BufReader::new(stdout).lines();
        let mut stderr = BufReader::new(stderr).lines();
        let (mut stdout_open, mut stderr_open) = (true, true);
        let mut last_error: Option<String> = None;

        while stdout_open || stderr_open {
            tokio::select! {
                line = stdout.next_line(), if stdout_open => match line {
                    Ok(Some(line)) => forward(notify, &line),
                    _ => stdout_open = false,
                },
                line = stderr.next_line(), if stderr_open => match line {
                    Ok(Some(line)) => {
                        forward(notify, &line);
                        if !line.trim().is_empty() {
                            last_error = Some(line.trim().to_string());
                        }
                    }
                    _ => stderr_open = false,
                },
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| Error::console_tool(format!("failed to wait for {}: {e}", self.program)))?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::console_tool(match last_error {
                Some(line) => format!("{} exited with {status}: {line}", self.program),
                None => format!("{} exited with {status}", self.program),
            }))
        }
    }
}
