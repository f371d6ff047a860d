use once_cell::sync::Lazy;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::core::error::{AppError, AppResult};
use crate::relay::RelaySettings;

/// Port the web server listens on
/// Read from WEB_PORT environment variable
/// Default: 3000
pub static WEB_PORT: Lazy<u16> = Lazy::new(|| env_parse("WEB_PORT", 3000));

/// Address the web server binds to
/// Read from BIND_ADDR environment variable
/// Default: 0.0.0.0
pub static BIND_ADDR: Lazy<String> = Lazy::new(|| env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()));

/// Program launched for every download request
/// Read from DOWNLOADER_BIN environment variable
/// Default: the project virtualenv interpreter
pub static DOWNLOADER_BIN: Lazy<String> =
    Lazy::new(|| env::var("DOWNLOADER_BIN").unwrap_or_else(|_| "venv/bin/python3".to_string()));

/// Script passed to the downloader program before the URL
/// Read from DOWNLOADER_SCRIPT environment variable
/// Set to an empty string when DOWNLOADER_BIN is a standalone executable
pub static DOWNLOADER_SCRIPT: Lazy<Option<String>> = Lazy::new(|| {
    let script = env::var("DOWNLOADER_SCRIPT").unwrap_or_else(|_| "app/python/download_mp3.py".to_string());
    if script.trim().is_empty() {
        None
    } else {
        Some(script)
    }
});

/// Directory the downloader writes finished files to, served at /downloads
/// Read from DOWNLOAD_DIR environment variable
/// Supports tilde (~) expansion for home directory
pub static DOWNLOAD_DIR: Lazy<String> =
    Lazy::new(|| env::var("DOWNLOAD_DIR").unwrap_or_else(|_| "public/downloads".to_string()));

/// yt-dlp binary used by the search provider
/// Read from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: tubedrop.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "tubedrop.log".to_string()));

/// Hosts the page is allowed to load thumbnails from
/// Read from THUMBNAIL_HOSTS environment variable (comma separated)
/// Default: i.ytimg.com
pub static THUMBNAIL_HOSTS: Lazy<Vec<String>> = Lazy::new(|| {
    parse_host_list(&env::var("THUMBNAIL_HOSTS").unwrap_or_else(|_| "i.ytimg.com".to_string()))
});

/// Hard limit for one downloader run, in seconds
/// Read from RELAY_TIMEOUT_SECS environment variable
pub static RELAY_TIMEOUT_SECS: Lazy<u64> = Lazy::new(|| env_parse("RELAY_TIMEOUT_SECS", relay::TIMEOUT_SECS));

/// Keep-alive period, in seconds
/// Read from RELAY_KEEPALIVE_SECS environment variable
pub static RELAY_KEEPALIVE_SECS: Lazy<u64> = Lazy::new(|| {
    let secs = env_parse("RELAY_KEEPALIVE_SECS", relay::KEEPALIVE_SECS);
    if secs == 0 {
        log::warn!("RELAY_KEEPALIVE_SECS=0 is not allowed, using {}", relay::KEEPALIVE_SECS);
        relay::KEEPALIVE_SECS
    } else {
        secs
    }
});

/// Maximum number of search results returned to the client
/// Read from SEARCH_MAX_RESULTS environment variable
pub static SEARCH_MAX_RESULTS: Lazy<usize> = Lazy::new(|| env_parse("SEARCH_MAX_RESULTS", search::MAX_RESULTS));

/// Progress relay configuration
pub mod relay {
    use super::Duration;

    /// Downloader runs longer than this are killed (8 minutes)
    pub const TIMEOUT_SECS: u64 = 480;

    /// Interval between keep-alive comment frames
    pub const KEEPALIVE_SECS: u64 = 15;

    /// Stdout lines buffered between the child and the event writer
    pub const LINE_BUFFER: usize = 1024;

    /// Events buffered towards the HTTP response body
    pub const EVENT_BUFFER: usize = 64;

    /// Message sent to the client when the timeout fires
    pub const TIMEOUT_MESSAGE: &str = "Download timed out";

    /// How long a closing event may wait for a client that stopped reading
    pub const FINAL_EVENT_GRACE_SECS: u64 = 5;

    pub fn timeout() -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }

    pub fn keep_alive() -> Duration {
        Duration::from_secs(KEEPALIVE_SECS)
    }

    pub fn final_event_grace() -> Duration {
        Duration::from_secs(FINAL_EVENT_GRACE_SECS)
    }
}

/// Search proxy configuration
pub mod search {
    use super::Duration;

    /// Results returned to the client
    pub const MAX_RESULTS: usize = 10;

    /// Timeout for a yt-dlp search invocation (in seconds)
    pub const YTDLP_TIMEOUT_SECS: u64 = 30;

    /// Fallback thumbnail when the provider reports none
    pub const THUMBNAIL_TEMPLATE: &str = "https://i.ytimg.com/vi/{id}/hqdefault.jpg";

    pub fn ytdlp_timeout() -> Duration {
        Duration::from_secs(YTDLP_TIMEOUT_SECS)
    }
}

/// Reads and parses an environment variable, falling back to `default`
/// when it is unset or malformed.
fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Ignoring invalid {}={:?}, using default", name, raw);
                default
            }
        },
        Err(_) => default,
    }
}

/// Splits a comma separated host list, dropping blanks.
pub fn parse_host_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|h| h.trim().to_lowercase())
        .filter(|h| !h.is_empty())
        .collect()
}

/// Expands `~` in a configured path.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Snapshot of the runtime configuration handed to the server and the CLI.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub downloader_bin: String,
    /// Arguments placed before the URL (usually the script path)
    pub downloader_args: Vec<String>,
    pub download_dir: PathBuf,
    pub ytdl_bin: String,
    pub relay_timeout: Duration,
    pub keep_alive: Duration,
    pub search_max_results: usize,
    pub thumbnail_hosts: Vec<String>,
    pub log_file_path: String,
}

impl AppConfig {
    /// Builds the configuration from environment variables (see the statics above).
    pub fn from_env() -> Self {
        Self {
            bind_addr: BIND_ADDR.clone(),
            port: *WEB_PORT,
            downloader_bin: DOWNLOADER_BIN.clone(),
            downloader_args: DOWNLOADER_SCRIPT.iter().cloned().collect(),
            download_dir: expand_path(&DOWNLOAD_DIR),
            ytdl_bin: YTDL_BIN.clone(),
            relay_timeout: Duration::from_secs(*RELAY_TIMEOUT_SECS),
            keep_alive: Duration::from_secs(*RELAY_KEEPALIVE_SECS),
            search_max_results: *SEARCH_MAX_RESULTS,
            thumbnail_hosts: THUMBNAIL_HOSTS.clone(),
            log_file_path: LOG_FILE_PATH.clone(),
        }
    }

    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            timeout: self.relay_timeout,
            keep_alive: self.keep_alive,
            line_buffer: relay::LINE_BUFFER,
            event_buffer: relay::EVENT_BUFFER,
        }
    }

    pub fn socket_addr(&self) -> AppResult<SocketAddr> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse()
            .map_err(|e| AppError::Validation(format!("Invalid bind address {}:{}: {}", self.bind_addr, self.port, e)))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 3000,
            downloader_bin: "venv/bin/python3".to_string(),
            downloader_args: vec!["app/python/download_mp3.py".to_string()],
            download_dir: PathBuf::from("public/downloads"),
            ytdl_bin: "yt-dlp".to_string(),
            relay_timeout: relay::timeout(),
            keep_alive: relay::keep_alive(),
            search_max_results: search::MAX_RESULTS,
            thumbnail_hosts: vec!["i.ytimg.com".to_string()],
            log_file_path: "tubedrop.log".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_list() {
        assert_eq!(
            parse_host_list(" i.ytimg.com, ,IMG.youtube.com "),
            vec!["i.ytimg.com".to_string(), "img.youtube.com".to_string()]
        );
        assert!(parse_host_list("").is_empty());
    }

    #[test]
    fn test_default_relay_settings() {
        let settings = AppConfig::default().relay_settings();
        assert_eq!(settings.timeout, Duration::from_secs(480));
        assert_eq!(settings.keep_alive, Duration::from_secs(15));
        assert_eq!(settings.line_buffer, relay::LINE_BUFFER);
    }

    #[test]
    fn test_socket_addr() {
        let mut config = AppConfig::default();
        config.bind_addr = "127.0.0.1".to_string();
        config.port = 8080;
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:8080");

        config.bind_addr = "not an address".to_string();
        assert!(config.socket_addr().is_err());
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        assert_eq!(env_parse::<u64>("TUBEDROP_TEST_UNSET_VARIABLE", 7), 7);
    }

    #[test]
    fn test_expand_path_keeps_relative() {
        assert_eq!(expand_path("public/downloads"), PathBuf::from("public/downloads"));
    }
}
