//! Scripted downloader for relay tests
//!
//! Stands in for the external downloader process without spawning anything,
//! so timer-driven scenarios can run under paused Tokio time.

pub mod mock_downloader;

pub use mock_downloader::{MockLauncher, Step};
