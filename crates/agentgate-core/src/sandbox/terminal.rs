//! Shell command execution with policy checks

use crate::error::{Error, Result, SandboxError};
use crate::types::CommandPolicy;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured outcome of one shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    /// stdout followed by stderr
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Text handed back to the model. A failing command is reported as text,
    /// not as an error, so the model can react to it.
    pub fn to_tool_text(&self) -> String {
        if self.success() {
            return self.output.clone();
        }
        let status = match self.exit_code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };
        format!("Error: {}\nOutput: {}", status, self.output)
    }
}

/// Terminal handler enforcing the configured policy
pub struct TerminalHandler;

impl TerminalHandler {
    /// Reject the command if the policy disables execution or a blocked
    /// pattern occurs anywhere in it
    pub fn check_policy(policy: &CommandPolicy, command: &str) -> Result<()> {
        if !policy.enabled {
            return Err(Error::Sandbox(SandboxError::CommandsDisabled));
        }

        if let Some(pattern) = policy
            .blocked_patterns
            .iter()
            .find(|pattern| command.contains(pattern.as_str()))
        {
            warn!("Blocked command: {}", command);
            return Err(Error::Sandbox(SandboxError::CommandBlocked {
                command: command.to_string(),
                pattern: pattern.clone(),
            }));
        }

        Ok(())
    }

    /// Run `sh -c <command>` in `cwd` and capture combined output
    pub async fn execute(
        policy: &CommandPolicy,
        command: &str,
        cwd: Option<&Path>,
    ) -> Result<CommandOutput> {
        Self::check_policy(policy, command)?;

        debug!("Executing command: {} (cwd: {:?})", command, cwd);

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command).kill_on_drop(true);

        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await?;

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        debug!("Command finished with {:?}", output.status.code());

        Ok(CommandOutput {
            exit_code: output.status.code(),
            output: combined,
        })
    }
}
