//! dropcore - core library for the tubedrop MP3 downloader
//!
//! Everything that does not depend on the HTTP server lives here, so the
//! terminal client and the web server share one implementation.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, metrics, process and validation helpers
//! - `relay`: launches the external downloader and turns its stdout into an event stream
//! - `search`: search proxy over a pluggable provider (yt-dlp by default)
//! - `session`: client-side download state machine driven by relay messages

pub mod core;
pub mod relay;
pub mod search;
pub mod session;

// Re-export commonly used types for convenience
pub use core::{config, AppConfig, AppError, AppResult};
pub use relay::{DownloadRelay, RelayEvent, RelayMessage, RelaySettings};
pub use search::{SearchItem, SearchProvider, SearchService};
pub use session::{ClientSignal, ClientState, DownloadSession};
