//! External process bridge - spawn-and-capture and detached launch
//!
//! Used for package-manager installs, one-shot bundler builds, and editor
//! launch. Success is exit code 0.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Last portion of stderr, for compact failure notifications.
    pub fn stderr_tail(&self, max_len: usize) -> String {
        let trimmed = self.stderr.trim();
        if trimmed.len() <= max_len {
            trimmed.to_string()
        } else {
            let mut start = trimmed.len() - max_len;
            while !trimmed.is_char_boundary(start) {
                start += 1;
            }
            trimmed[start..].to_string()
        }
    }
}

/// Run a command to completion, capturing stdout/stderr.
pub async fn run(program: &str, args: &[String], cwd: &Path) -> Result<CommandOutput, String> {
    debug!(program, ?args, cwd = %cwd.display(), "Running command");
    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| format!("{}: {}", program, e))?;

    Ok(CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Launch a process without waiting for it (editor launch). The child is not
/// supervised and outlives the request that started it.
pub fn launch_detached(program: &str, args: &[String], cwd: &Path) -> Result<(), String> {
    debug!(program, ?args, cwd = %cwd.display(), "Launching detached process");
    Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
        .map_err(|e| format!("{}: {}", program, e))
}
