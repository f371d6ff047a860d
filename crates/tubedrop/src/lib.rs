//! tubedrop - search YouTube and download MP3s with live progress
//!
//! The web server and the terminal client live here; the relay, search and
//! configuration are in `dropcore`.

pub mod cli;
pub mod page;
pub mod web_server;

pub use web_server::{build_router, start_web_server, AppState};
