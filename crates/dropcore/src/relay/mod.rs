//! Progress relay: one downloader process per request, its stdout turned
//! into an event stream.
//!
//! Each call to [`DownloadRelay::spawn`] starts four cooperating pieces:
//!
//! - a stdout pump reading lines into a bounded channel,
//! - a stderr logger (stderr never reaches the client),
//! - a supervisor owning the child, the timeout, the keep-alive ticker and
//!   the sender side of the event channel,
//! - the returned [`RelayStream`], which holds a drop guard on the shared
//!   cancellation token.
//!
//! Client disconnect (the stream is dropped), the timeout and child exit all
//! race on that one token, so whichever happens first tears everything down.

pub mod launcher;
pub mod message;

pub use launcher::{DownloadChild, ExitReport, Launcher, OutputPipe, ScriptLauncher, SpawnedDownload};
pub use message::{RelayEvent, RelayMessage};

use futures_util::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, timeout, timeout_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::core::config;
use crate::core::metrics;
use crate::core::utils::truncate_utf8;
use crate::core::validation::DownloadUrl;

/// Error text sent when the downloader exits without a `FILE:` or `ERROR:` line.
pub const SILENT_EXIT_MESSAGE: &str = "Downloader exited without reporting a file";

/// Timers and buffer sizes for one relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    /// Hard limit from stream start; the child is killed when it expires
    pub timeout: Duration,
    /// Period of the keep-alive comment frames
    pub keep_alive: Duration,
    /// Stdout lines buffered between the child and the event writer
    pub line_buffer: usize,
    /// Events buffered towards the client
    pub event_buffer: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            timeout: config::relay::timeout(),
            keep_alive: config::relay::keep_alive(),
            line_buffer: config::relay::LINE_BUFFER,
            event_buffer: config::relay::EVENT_BUFFER,
        }
    }
}

/// Events for one download, ending when the relay closes.
pub type RelayStream = BoxStream<'static, RelayEvent>;

/// How a relay ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Child exited after reporting a file
    Completed,
    /// Child reported an error or exited silently
    Failed,
    /// Killed by the timeout
    TimedOut,
    /// Client went away; child killed
    Cancelled,
    /// The downloader could not be started
    SpawnFailed,
}

impl RelayOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
            Self::SpawnFailed => "spawn_failed",
        }
    }
}

impl fmt::Display for RelayOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A started relay: the client-facing events plus the supervisor task.
pub struct RelayRun {
    pub events: RelayStream,
    pub outcome: JoinHandle<RelayOutcome>,
}

/// Entry point shared by the HTTP route and the terminal client.
#[derive(Clone)]
pub struct DownloadRelay {
    launcher: Arc<dyn Launcher>,
    settings: RelaySettings,
}

impl DownloadRelay {
    pub fn new(launcher: Arc<dyn Launcher>, settings: RelaySettings) -> Self {
        Self { launcher, settings }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Starts a relay and returns only its event stream.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, url: DownloadUrl) -> RelayStream {
        self.spawn(url).events
    }

    /// Starts a relay, keeping a handle on the supervisor's outcome.
    pub fn spawn(&self, url: DownloadUrl) -> RelayRun {
        let token = CancellationToken::new();
        let guard = token.clone().drop_guard();
        let (event_tx, event_rx) = mpsc::channel(self.settings.event_buffer.max(1));

        let supervisor = Supervisor {
            launcher: Arc::clone(&self.launcher),
            settings: self.settings.clone(),
            url,
            token,
            events: event_tx,
        };
        let outcome = tokio::spawn(supervisor.run());

        // The guard lives inside the stream state: dropping the stream before
        // the relay finishes cancels the token and the supervisor kills the child.
        let events = stream::unfold((event_rx, guard), |(mut rx, guard)| async move {
            rx.recv().await.map(|event| (event, (rx, guard)))
        })
        .boxed();

        RelayRun { events, outcome }
    }
}

/// What the child reported so far.
#[derive(Debug, Default)]
struct RunReport {
    saw_file: bool,
    saw_error: bool,
}

impl RunReport {
    fn observe(&mut self, message: &RelayMessage) {
        match message {
            RelayMessage::File(_) => self.saw_file = true,
            RelayMessage::Error(_) => self.saw_error = true,
            _ => {}
        }
    }
}

/// Messages waiting for room in the client channel.
///
/// Holds at most `capacity` entries. A progress line replaces a progress line
/// still waiting at the back; once full, only `FILE:`, `ERROR:` and `DONE`
/// are still queued.
#[derive(Debug)]
struct Outbox {
    queue: VecDeque<RelayMessage>,
    capacity: usize,
}

impl Outbox {
    fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Queues `message`. Returns `false` when an older or the new message was discarded.
    fn push(&mut self, message: RelayMessage) -> bool {
        let collapses = matches!(message, RelayMessage::Progress(_))
            && matches!(self.queue.back(), Some(RelayMessage::Progress(_)));
        if collapses {
            if let Some(last) = self.queue.back_mut() {
                *last = message;
            }
            return false;
        }

        let essential = matches!(message, RelayMessage::File(_) | RelayMessage::Error(_) | RelayMessage::Done);
        if self.queue.len() >= self.capacity && !essential {
            return false;
        }
        self.queue.push_back(message);
        true
    }

    fn pop(&mut self) -> Option<RelayEvent> {
        self.queue.pop_front().map(RelayEvent::from)
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

struct Supervisor {
    launcher: Arc<dyn Launcher>,
    settings: RelaySettings,
    url: DownloadUrl,
    token: CancellationToken,
    events: mpsc::Sender<RelayEvent>,
}

impl Supervisor {
    async fn run(self) -> RelayOutcome {
        let started = Instant::now();
        metrics::RELAY_STARTED_TOTAL.inc();
        metrics::RELAY_ACTIVE.inc();

        let outcome = self.relay(started + self.settings.timeout).await;

        // Stops the pumps; harmless when the client already cancelled.
        self.token.cancel();
        metrics::RELAY_ACTIVE.dec();
        let elapsed = started.elapsed().as_secs_f64();
        metrics::record_relay_outcome(outcome.as_str(), elapsed);
        log::info!("Relay for {} finished: {} after {:.1}s", self.url, outcome, elapsed);
        outcome
    }

    /// Drives one download until `deadline_at`.
    ///
    /// Nothing in the loop awaits the client: events go through the outbox and
    /// are handed over only when the channel has room, so the deadline and the
    /// stdout pump keep running while a connected client stops reading.
    async fn relay(&self, deadline_at: Instant) -> RelayOutcome {
        let SpawnedDownload {
            stdout,
            stderr,
            mut child,
        } = match self.launcher.launch(&self.url) {
            Ok(spawned) => spawned,
            Err(e) => {
                log::error!(
                    "❌ Failed to start downloader [{}] for {}: {}",
                    self.launcher.name(),
                    self.url,
                    e
                );
                let message = RelayMessage::error(format!("Failed to start downloader: {}", e.public_message()));
                let delivered = timeout_at(deadline_at, async {
                    self.emit(message.into()).await && self.emit(RelayMessage::Done.into()).await
                })
                .await;
                if delivered.is_err() {
                    log::warn!("Client stopped reading before the spawn failure for {} was sent", self.url);
                }
                return RelayOutcome::SpawnFailed;
            }
        };
        log::info!("🎵 Downloader started (pid {:?}) for {}", child.id(), self.url);

        let (line_tx, mut lines) = mpsc::channel(self.settings.line_buffer.max(1));
        tokio::spawn(pump_stdout(stdout, line_tx, self.token.clone()));
        if let Some(stderr) = stderr {
            tokio::spawn(log_stderr(stderr, self.token.clone()));
        }

        let deadline = sleep_until(deadline_at);
        tokio::pin!(deadline);
        let period = self.settings.keep_alive.max(Duration::from_millis(1));
        let mut keep_alive = interval_at(Instant::now() + period, period);
        keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut outbox = Outbox::new(self.settings.line_buffer);
        let mut report = RunReport::default();
        let mut stdout_open = true;
        // Set once the child has exited; the loop then only flushes the outbox
        let mut finished: Option<RelayOutcome> = None;

        loop {
            if let Some(outcome) = finished {
                if outbox.is_empty() {
                    return outcome;
                }
            }

            tokio::select! {
                biased;

                _ = self.token.cancelled() => {
                    log::info!("🔌 Client closed connection for {}", self.url);
                    if finished.is_none() {
                        kill_child(child.as_mut()).await;
                    }
                    return RelayOutcome::Cancelled;
                }

                _ = &mut deadline => {
                    log::warn!(
                        "⏱️ Downloader for {} exceeded {}s, killing it",
                        self.url,
                        self.settings.timeout.as_secs()
                    );
                    if finished.is_none() {
                        kill_child(child.as_mut()).await;
                    }
                    self.emit_final(RelayMessage::error(config::relay::TIMEOUT_MESSAGE).into()).await;
                    return RelayOutcome::TimedOut;
                }

                permit = self.events.reserve(), if !outbox.is_empty() => match permit {
                    Ok(permit) => {
                        if let Some(event) = outbox.pop() {
                            permit.send(event);
                        }
                    }
                    Err(_) => {
                        log::info!("🔌 Client went away for {}", self.url);
                        if finished.is_none() {
                            kill_child(child.as_mut()).await;
                        }
                        return RelayOutcome::Cancelled;
                    }
                },

                line = lines.recv(), if stdout_open => match line {
                    Some(line) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        let message = RelayMessage::parse(trimmed);
                        if message == RelayMessage::Done {
                            // The relay sends DONE itself once the child has exited
                            log::debug!("Downloader for {} printed DONE, waiting for exit", self.url);
                            continue;
                        }
                        log::debug!("downloader: {}", message);
                        report.observe(&message);
                        metrics::RELAY_LINES_TOTAL.inc();
                        if !outbox.push(message) {
                            metrics::RELAY_LINES_DROPPED_TOTAL.inc();
                        }
                    }
                    None => stdout_open = false,
                },

                exit = child.wait(), if !stdout_open && finished.is_none() => {
                    finished = Some(self.close(exit, &report, &mut outbox));
                }

                _ = keep_alive.tick() => match self.events.try_send(RelayEvent::KeepAlive) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        metrics::RELAY_KEEPALIVES_DROPPED_TOTAL.inc();
                        log::debug!("Client buffer full, skipping keep-alive for {}", self.url);
                    }
                    Err(TrySendError::Closed(_)) => {
                        log::info!("🔌 Client went away for {}", self.url);
                        if finished.is_none() {
                            kill_child(child.as_mut()).await;
                        }
                        return RelayOutcome::Cancelled;
                    }
                },
            }
        }
    }

    /// Classifies the exit and queues the closing events.
    fn close(&self, exit: io::Result<ExitReport>, report: &RunReport, outbox: &mut Outbox) -> RelayOutcome {
        match &exit {
            Ok(status) if status.success() => log::info!("✅ Downloader for {} exited cleanly", self.url),
            Ok(status) => log::warn!("⚠️ Downloader for {} exited with {}", self.url, status),
            Err(e) => log::error!("❌ Failed to wait for downloader of {}: {}", self.url, e),
        }

        let outcome = if report.saw_error {
            RelayOutcome::Failed
        } else if report.saw_file {
            RelayOutcome::Completed
        } else {
            let detail = match &exit {
                Ok(status) if !status.success() => format!(" ({})", status),
                Ok(_) => String::new(),
                Err(e) => format!(" ({})", e),
            };
            outbox.push(RelayMessage::error(format!("{}{}", SILENT_EXIT_MESSAGE, detail)));
            RelayOutcome::Failed
        };

        outbox.push(RelayMessage::Done);
        outcome
    }

    /// Queues an event for the client, giving up when the client is gone.
    async fn emit(&self, event: RelayEvent) -> bool {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            sent = self.events.send(event) => sent.is_ok(),
        }
    }

    /// Sends a closing event, waiting at most the grace period for room.
    async fn emit_final(&self, event: RelayEvent) {
        if timeout(config::relay::final_event_grace(), self.emit(event)).await.is_err() {
            log::warn!("Client stopped reading, closing {} without the final event", self.url);
        }
    }
}

async fn kill_child(child: &mut dyn DownloadChild) {
    let pid = child.id();
    if let Err(e) = child.kill().await {
        log::warn!("Failed to kill downloader (pid {:?}): {}", pid, e);
    }
}

/// Reads stdout line by line into `lines` until EOF or cancellation.
///
/// Invalid UTF-8 is replaced rather than ending the stream.
async fn pump_stdout(stdout: OutputPipe, lines: mpsc::Sender<String>, token: CancellationToken) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = tokio::select! {
            _ = token.cancelled() => break,
            read = reader.read_until(b'\n', &mut buf) => read,
        };
        match read {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).into_owned();
                if lines.send(line).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                log::warn!("Failed to read downloader stdout: {}", e);
                break;
            }
        }
    }
}

/// Logs stderr server-side.
async fn log_stderr(stderr: OutputPipe, token: CancellationToken) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = tokio::select! {
            _ = token.cancelled() => break,
            read = reader.read_until(b'\n', &mut buf) => read,
        };
        match read {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim();
                if !line.is_empty() {
                    log::warn!("Downloader stderr: {}", truncate_utf8(line, 500));
                }
            }
            Err(e) => {
                log::warn!("Failed to read downloader stderr: {}", e);
                break;
            }
        }
    }
}
