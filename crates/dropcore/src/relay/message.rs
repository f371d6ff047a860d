//! Line protocol spoken by the external downloader.
//!
//! Every stdout line is parsed into a [`RelayMessage`] at the relay boundary.
//! Rendering a message with `Display` gives back the exact line it came from,
//! so the wire stays byte-transparent while the rest of the code works with
//! tagged values.

use std::fmt;

const PROGRESS_PREFIX: &str = "PROGRESS:";
const STEP_PREFIX: &str = "STEP:";
const FILE_PREFIX: &str = "FILE:";
const ERROR_PREFIX: &str = "ERROR:";
const DONE_LINE: &str = "DONE";

/// One downloader output line.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    /// `PROGRESS:<float>%`, stored as the text after the prefix
    Progress(String),
    /// `STEP:<text>`
    Step(String),
    /// `FILE:<filename>`
    File(String),
    /// bare `DONE`
    Done,
    /// `ERROR:<text>`
    Error(String),
    /// Anything else; forwarded untouched
    Unrecognized(String),
}

impl RelayMessage {
    /// Parses an already trimmed line.
    pub fn parse(line: &str) -> Self {
        if let Some(rest) = line.strip_prefix(PROGRESS_PREFIX) {
            Self::Progress(rest.to_string())
        } else if let Some(rest) = line.strip_prefix(STEP_PREFIX) {
            Self::Step(rest.to_string())
        } else if let Some(rest) = line.strip_prefix(FILE_PREFIX) {
            Self::File(rest.to_string())
        } else if let Some(rest) = line.strip_prefix(ERROR_PREFIX) {
            Self::Error(rest.to_string())
        } else if line == DONE_LINE {
            Self::Done
        } else {
            Self::Unrecognized(line.to_string())
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    /// Percentage carried by a `PROGRESS:` line, e.g. `" 42.5%"` → `42.5`.
    pub fn percent(&self) -> Option<f64> {
        match self {
            Self::Progress(raw) => raw.trim().trim_end_matches('%').trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for RelayMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Progress(rest) => write!(f, "{}{}", PROGRESS_PREFIX, rest),
            Self::Step(rest) => write!(f, "{}{}", STEP_PREFIX, rest),
            Self::File(rest) => write!(f, "{}{}", FILE_PREFIX, rest),
            Self::Error(rest) => write!(f, "{}{}", ERROR_PREFIX, rest),
            Self::Done => f.write_str(DONE_LINE),
            Self::Unrecognized(line) => f.write_str(line),
        }
    }
}

/// What the relay hands to the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Message(RelayMessage),
    KeepAlive,
}

impl RelayEvent {
    /// Server-sent-event frame for this event.
    ///
    /// Messages become one `data:` field per line segment; a stray carriage
    /// return would otherwise end the field early on the client side.
    /// Keep-alives are a bare comment.
    pub fn to_frame(&self) -> String {
        match self {
            Self::KeepAlive => ":\n\n".to_string(),
            Self::Message(message) => {
                let line = message.to_string();
                let mut frame = String::with_capacity(line.len() + 8);
                for segment in line.split(['\r', '\n']) {
                    frame.push_str("data: ");
                    frame.push_str(segment);
                    frame.push('\n');
                }
                frame.push('\n');
                frame
            }
        }
    }
}

impl From<RelayMessage> for RelayEvent {
    fn from(message: RelayMessage) -> Self {
        Self::Message(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_vocabulary() {
        assert_eq!(RelayMessage::parse("PROGRESS:50%"), RelayMessage::Progress("50%".into()));
        assert_eq!(RelayMessage::parse("STEP:Converting to MP3..."), RelayMessage::Step("Converting to MP3...".into()));
        assert_eq!(RelayMessage::parse("FILE:abc.mp3"), RelayMessage::File("abc.mp3".into()));
        assert_eq!(RelayMessage::parse("ERROR:Video unavailable"), RelayMessage::Error("Video unavailable".into()));
        assert_eq!(RelayMessage::parse("DONE"), RelayMessage::Done);
    }

    #[test]
    fn test_parse_unrecognized_lines_pass_through() {
        for line in ["DONE!", "progress:10%", "[youtube] abc: Downloading webpage", "FILE"] {
            let parsed = RelayMessage::parse(line);
            assert_eq!(parsed, RelayMessage::Unrecognized(line.to_string()));
            assert_eq!(parsed.to_string(), line);
        }
    }

    #[test]
    fn test_display_reproduces_line() {
        for line in ["PROGRESS: 12.3%", "STEP:", "FILE:My Song (Live).mp3", "ERROR:a:b:c", "DONE"] {
            assert_eq!(RelayMessage::parse(line).to_string(), line);
        }
    }

    #[test]
    fn test_percent() {
        assert_eq!(RelayMessage::parse("PROGRESS:50%").percent(), Some(50.0));
        assert_eq!(RelayMessage::parse("PROGRESS: 42.5% ").percent(), Some(42.5));
        assert_eq!(RelayMessage::parse("PROGRESS:n/a").percent(), None);
        assert_eq!(RelayMessage::parse("STEP:50%").percent(), None);
    }

    #[test]
    fn test_frames() {
        assert_eq!(RelayEvent::KeepAlive.to_frame(), ":\n\n");
        assert_eq!(
            RelayEvent::from(RelayMessage::parse("STEP:Fetching")).to_frame(),
            "data: STEP:Fetching\n\n"
        );
        assert_eq!(RelayEvent::from(RelayMessage::Done).to_frame(), "data: DONE\n\n");
        assert_eq!(
            RelayEvent::from(RelayMessage::parse("PROGRESS:1%\rPROGRESS:2%")).to_frame(),
            "data: PROGRESS:1%\ndata: PROGRESS:2%\n\n"
        );
    }
}
