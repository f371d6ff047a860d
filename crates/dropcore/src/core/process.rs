//! Process execution utilities with timeout support
//!
//! Provides helpers for running short-lived external processes (yt-dlp
//! searches) with a timeout so a hung process cannot block a request.

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use crate::core::error::AppError;

/// Run an async Command with a timeout.
///
/// The child is killed when the timeout fires. Returns the process Output on
/// success, or an AppError on timeout/IO failure.
pub async fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<Output, AppError> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(AppError::Io(e)),
        Err(_) => Err(AppError::Process(format!(
            "Process timed out after {}s",
            timeout.as_secs()
        ))),
    }
}

/// First non-empty stderr line, used to summarize a failed run.
pub fn first_stderr_line(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("unknown error")
        .to_string()
}
