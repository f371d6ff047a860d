//! Client-side download state machine.
//!
//! The browser page runs the same machine in inline script; this version
//! drives the terminal client and pins the transitions down in tests.

use crate::core::validation::file_basename;
use crate::relay::RelayMessage;

pub const STATUS_STARTING: &str = "Starting...";
pub const STATUS_COMPLETE: &str = "Process complete";
pub const STATUS_CANCELLED: &str = "Download cancelled";
pub const STREAM_ERROR_MESSAGE: &str = "Error occurred during download.";
pub const NO_FILE_MESSAGE: &str = "Download finished without a file";

#[derive(Debug, Clone, PartialEq)]
pub enum ClientState {
    Idle,
    Searching,
    Downloading,
    Done { file: String },
    Error { message: String },
    Cancelled,
}

impl ClientState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. } | Self::Cancelled)
    }
}

/// Inputs to [`DownloadSession::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClientSignal {
    SearchStarted,
    SearchFinished,
    /// The event stream was opened
    Open,
    Message(RelayMessage),
    /// Transport failure on the event stream
    StreamError,
    /// The event stream ended
    Closed,
    /// User cancelled, or started another download
    Cancel,
}

impl From<RelayMessage> for ClientSignal {
    fn from(message: RelayMessage) -> Self {
        Self::Message(message)
    }
}

/// One download as the user sees it.
#[derive(Debug, Clone)]
pub struct DownloadSession {
    state: ClientState,
    status: String,
    progress: f64,
    file: Option<String>,
}

impl Default for DownloadSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadSession {
    pub fn new() -> Self {
        Self {
            state: ClientState::Idle,
            status: String::new(),
            progress: 0.0,
            file: None,
        }
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Last reported percentage, 0 to 100.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// True once the session reached done, error or cancelled.
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Link to the finished file under `/downloads/`.
    pub fn save_url(&self) -> Option<String> {
        match &self.state {
            ClientState::Done { file } => Some(format!("/downloads/{}", urlencoding::encode(file))),
            _ => None,
        }
    }

    /// Applies one signal. Returns `false` when the signal was ignored.
    pub fn apply(&mut self, signal: ClientSignal) -> bool {
        if self.state.is_terminal() {
            return false;
        }

        let downloading = self.state == ClientState::Downloading;
        match signal {
            ClientSignal::SearchStarted if self.state == ClientState::Idle => {
                self.state = ClientState::Searching;
            }
            ClientSignal::SearchFinished if self.state == ClientState::Searching => {
                self.state = ClientState::Idle;
            }
            ClientSignal::Open if matches!(self.state, ClientState::Idle | ClientState::Searching) => {
                self.state = ClientState::Downloading;
                self.progress = 0.0;
                self.file = None;
                self.status = STATUS_STARTING.to_string();
            }
            ClientSignal::Message(message) if downloading => return self.on_message(message),
            ClientSignal::StreamError | ClientSignal::Closed if downloading => {
                self.fail(STREAM_ERROR_MESSAGE);
            }
            ClientSignal::Cancel => {
                self.state = ClientState::Cancelled;
                self.status = STATUS_CANCELLED.to_string();
            }
            _ => return false,
        }
        true
    }

    fn on_message(&mut self, message: RelayMessage) -> bool {
        match message {
            RelayMessage::Progress(_) => match message.percent() {
                Some(percent) => {
                    self.progress = percent.clamp(0.0, 100.0);
                    self.status = format!("Downloading... {}%", percent);
                }
                None => return false,
            },
            RelayMessage::Step(text) => self.status = text,
            RelayMessage::File(name) => match file_basename(&name) {
                Ok(file) => {
                    self.file = Some(file);
                    self.status = STATUS_COMPLETE.to_string();
                }
                Err(e) => {
                    log::warn!("Ignoring reported file: {}", e);
                    return false;
                }
            },
            RelayMessage::Done => match self.file.clone() {
                Some(file) => {
                    self.progress = 100.0;
                    self.state = ClientState::Done { file };
                }
                None => self.fail(NO_FILE_MESSAGE),
            },
            RelayMessage::Error(text) => self.fail(&text),
            RelayMessage::Unrecognized(_) => return false,
        }
        true
    }

    fn fail(&mut self, message: &str) {
        self.status = message.to_string();
        self.state = ClientState::Error {
            message: message.to_string(),
        };
    }
}
