//! Process launching seam for the relay.
//!
//! The relay never touches `tokio::process` directly: it asks a [`Launcher`]
//! for a [`SpawnedDownload`] and drives it through the [`DownloadChild`]
//! trait. Production uses [`ScriptLauncher`]; tests plug in scripted fakes.

use async_trait::async_trait;
use std::fmt;
use std::io;
use std::process::Stdio;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};

use crate::core::config::AppConfig;
use crate::core::error::{AppError, AppResult};
use crate::core::validation::DownloadUrl;

/// A readable child pipe.
pub type OutputPipe = Box<dyn AsyncRead + Send + Unpin>;

/// How the child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitReport {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
}

impl ExitReport {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ExitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => f.write_str("terminated by signal"),
        }
    }
}

/// Handle on a running downloader process.
#[async_trait]
pub trait DownloadChild: Send {
    /// OS process id, when there is one.
    fn id(&self) -> Option<u32>;

    /// Wait for the process to exit.
    async fn wait(&mut self) -> io::Result<ExitReport>;

    /// Forcibly terminate the process.
    async fn kill(&mut self) -> io::Result<()>;
}

/// Pipes and handle of a freshly started downloader.
pub struct SpawnedDownload {
    pub stdout: OutputPipe,
    pub stderr: Option<OutputPipe>,
    pub child: Box<dyn DownloadChild>,
}

/// Starts one downloader process per request.
pub trait Launcher: Send + Sync {
    /// Human-readable name used in logs
    fn name(&self) -> &str;

    /// Spawn the downloader for `url`.
    fn launch(&self, url: &DownloadUrl) -> AppResult<SpawnedDownload>;
}

/// Runs `program [leading_args..] <url>`, e.g. `python3 download_mp3.py <url>`.
#[derive(Debug, Clone)]
pub struct ScriptLauncher {
    program: String,
    leading_args: Vec<String>,
}

impl ScriptLauncher {
    pub fn new(program: impl Into<String>, leading_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            leading_args,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.downloader_bin.clone(), config.downloader_args.clone())
    }

    /// The command line for `url`, for logging.
    pub fn command_line(&self, url: &DownloadUrl) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.leading_args.iter().cloned());
        parts.push(url.to_string());
        parts.join(" ")
    }
}

impl Launcher for ScriptLauncher {
    fn name(&self) -> &str {
        &self.program
    }

    fn launch(&self, url: &DownloadUrl) -> AppResult<SpawnedDownload> {
        log::debug!("Downloader command: {}", self.command_line(url));

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .arg(url.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| AppError::Process(format!("Failed to spawn {}: {}", self.program, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Process("Downloader stdout was not captured".to_string()))?;
        let stderr = child.stderr.take().map(|pipe| Box::new(pipe) as OutputPipe);

        Ok(SpawnedDownload {
            stdout: Box::new(stdout),
            stderr,
            child: Box::new(TokioChild(child)),
        })
    }
}

struct TokioChild(Child);

#[async_trait]
impl DownloadChild for TokioChild {
    fn id(&self) -> Option<u32> {
        self.0.id()
    }

    async fn wait(&mut self) -> io::Result<ExitReport> {
        let status = self.0.wait().await?;
        Ok(ExitReport { code: status.code() })
    }

    async fn kill(&mut self) -> io::Result<()> {
        self.0.kill().await
    }
}
