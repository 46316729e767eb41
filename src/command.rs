//! Runs the external tools (git, protoc) with captured output and a hard time limit.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` exited with {status}")]
    Failed {
        program: String,
        status: ExitStatus,
        /// stdout followed by stderr.
        output: String,
    },
    #[error("`{program}` did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
}

impl CommandError {
    /// Captured tool output, when the tool got far enough to produce any.
    pub fn output(&self) -> Option<&str> {
        match self {
            CommandError::Failed { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// Spawns `command`, waits for it at most `timeout` and returns its combined output.
///
/// The child is killed if the timeout elapses. A non-zero exit is an error carrying the output.
pub async fn run_captured(mut command: Command, timeout: Duration) -> Result<String, CommandError> {
    let program = command.as_std().get_program().to_string_lossy().into_owned();
    debug!(program = %program, args = ?command.as_std().get_args().collect::<Vec<_>>(), "Spawning external command");

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|source| CommandError::Launch {
        program: program.clone(),
        source,
    })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => return Err(CommandError::Launch { program, source }),
        Err(_) => return Err(CommandError::TimedOut { program, timeout }),
    };

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if output.status.success() {
        Ok(combined)
    } else {
        Err(CommandError::Failed {
            program,
            status: output.status,
            output: combined,
        })
    }
}
