//! Mock downloader with a scripted stdout

#![allow(dead_code)]

use async_trait::async_trait;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use dropcore::core::validation::DownloadUrl;
use dropcore::relay::{DownloadChild, ExitReport, Launcher, SpawnedDownload};
use dropcore::{AppError, AppResult};

/// One step of the fake process's life.
#[derive(Debug, Clone)]
pub enum Step {
    /// Write `<text>\n` to stdout
    Line(&'static str),
    /// Write raw bytes to stdout
    Raw(&'static [u8]),
    /// Pause before the next step
    Sleep(Duration),
}

/// Launcher that plays back a script instead of starting a process.
#[derive(Clone)]
pub struct MockLauncher {
    script: Vec<Step>,
    /// Exit code after the script; `None` keeps the process alive until killed
    exit_code: Option<i32>,
    spawn_error: Option<String>,
    killed: Arc<AtomicBool>,
    launches: Arc<AtomicUsize>,
    last_url: Arc<std::sync::Mutex<Option<String>>>,
}

impl MockLauncher {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script,
            exit_code: Some(0),
            spawn_error: None,
            killed: Arc::new(AtomicBool::new(false)),
            launches: Arc::new(AtomicUsize::new(0)),
            last_url: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    /// Script lines, then exit with `code`.
    pub fn exiting(lines: &[&'static str], code: i32) -> Self {
        Self::new(lines.iter().copied().map(Step::Line).collect()).with_exit(Some(code))
    }

    /// Script lines, then hang until killed.
    pub fn hanging(lines: &[&'static str]) -> Self {
        Self::new(lines.iter().copied().map(Step::Line).collect()).with_exit(None)
    }

    /// Fails every launch with a process error.
    pub fn failing(message: &str) -> Self {
        let mut launcher = Self::new(Vec::new());
        launcher.spawn_error = Some(message.to_string());
        launcher
    }

    pub fn with_exit(mut self, exit_code: Option<i32>) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn was_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn last_url(&self) -> Option<String> {
        self.last_url.lock().unwrap().clone()
    }
}

impl Launcher for MockLauncher {
    fn name(&self) -> &str {
        "mock"
    }

    fn launch(&self, url: &DownloadUrl) -> AppResult<SpawnedDownload> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        *self.last_url.lock().unwrap() = Some(url.to_string());
        if let Some(message) = &self.spawn_error {
            return Err(AppError::Process(message.clone()));
        }

        let (reader, mut writer) = tokio::io::duplex(64 * 1024);
        let kill = CancellationToken::new();
        let (exit_tx, exit_rx) = oneshot::channel();

        let script = self.script.clone();
        let exit_code = self.exit_code;
        let kill_signal = kill.clone();
        tokio::spawn(async move {
            for step in script {
                let done = tokio::select! {
                    _ = kill_signal.cancelled() => true,
                    res = play(&mut writer, step) => res.is_err(),
                };
                if done {
                    return;
                }
            }
            match exit_code {
                Some(code) => {
                    drop(writer);
                    let _ = exit_tx.send(code);
                }
                None => {
                    kill_signal.cancelled().await;
                    drop(writer);
                }
            }
        });

        Ok(SpawnedDownload {
            stdout: Box::new(reader),
            stderr: None,
            child: Box::new(MockChild {
                kill,
                killed: Arc::clone(&self.killed),
                exit: exit_rx,
            }),
        })
    }
}

async fn play(writer: &mut tokio::io::DuplexStream, step: Step) -> io::Result<()> {
    match step {
        Step::Line(text) => {
            writer.write_all(text.as_bytes()).await?;
            writer.write_all(b"\n").await
        }
        Step::Raw(bytes) => writer.write_all(bytes).await,
        Step::Sleep(duration) => {
            tokio::time::sleep(duration).await;
            Ok(())
        }
    }
}

struct MockChild {
    kill: CancellationToken,
    killed: Arc<AtomicBool>,
    exit: oneshot::Receiver<i32>,
}

#[async_trait]
impl DownloadChild for MockChild {
    fn id(&self) -> Option<u32> {
        Some(4242)
    }

    async fn wait(&mut self) -> io::Result<ExitReport> {
        tokio::select! {
            _ = self.kill.cancelled() => Ok(ExitReport { code: None }),
            code = &mut self.exit => Ok(ExitReport { code: code.ok() }),
        }
    }

    async fn kill(&mut self) -> io::Result<()> {
        self.killed.store(true, Ordering::SeqCst);
        self.kill.cancel();
        Ok(())
    }
}
