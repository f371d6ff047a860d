//! Input validation for the public endpoints
//!
//! - Download URL validation (fixed host allowlist)
//! - Search query presence check
//! - Reported filename reduction to a bare file name
//! - Thumbnail host allowlist

use lazy_regex::regex_is_match;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Missing URL or a host outside the allowlist
    #[error("Invalid YouTube URL")]
    InvalidUrl,

    /// Missing or blank search query
    #[error("No query provided")]
    MissingQuery,

    /// Filename that has no usable final component
    #[error("Invalid filename '{0}'")]
    InvalidFilename(String),
}

/// Checks a URL against the download allowlist.
///
/// Only `http(s)://youtube.com/`, `http(s)://www.youtube.com/` and
/// `http(s)://youtu.be/` prefixes are accepted; other subdomains such as
/// `m.youtube.com` are rejected.
///
/// # Examples
/// ```
/// use dropcore::core::validation::is_allowed_download_url;
///
/// assert!(is_allowed_download_url("https://www.youtube.com/watch?v=abc"));
/// assert!(is_allowed_download_url("http://youtu.be/abc"));
/// assert!(!is_allowed_download_url("https://evil.com/?next=https://youtube.com/"));
/// ```
pub fn is_allowed_download_url(url: &str) -> bool {
    regex_is_match!(r"^https?://(www\.)?(youtube\.com|youtu\.be)/", url)
}

/// A URL that passed the allowlist check and may be handed to the downloader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadUrl(String);

impl DownloadUrl {
    /// Validates an optional, already percent-decoded query value.
    pub fn parse(raw: Option<&str>) -> Result<Self, ValidationError> {
        match raw {
            Some(url) if is_allowed_download_url(url) => Ok(Self(url.to_string())),
            _ => Err(ValidationError::InvalidUrl),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DownloadUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns the query when it contains something other than whitespace.
pub fn require_query(raw: Option<&str>) -> Result<&str, ValidationError> {
    match raw {
        Some(query) if !query.trim().is_empty() => Ok(query),
        _ => Err(ValidationError::MissingQuery),
    }
}

/// Reduces a reported filename to its final path component.
///
/// The downloader is expected to report a bare name, but a path must never
/// leak into the `/downloads/<name>` link.
pub fn file_basename(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    Path::new(trimmed)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ValidationError::InvalidFilename(trimmed.to_string()))
}

/// True when `src` is an `https` URL on one of `hosts`.
pub fn is_allowed_thumbnail(src: &str, hosts: &[String]) -> bool {
    let Ok(url) = Url::parse(src) else {
        return false;
    };
    url.scheme() == "https"
        && url
            .host_str()
            .is_some_and(|host| hosts.iter().any(|allowed| allowed.eq_ignore_ascii_case(host)))
}
