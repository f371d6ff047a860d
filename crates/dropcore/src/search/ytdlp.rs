//! yt-dlp search provider.
//!
//! Runs `yt-dlp --flat-playlist --dump-single-json ytsearchN:<query>` and maps
//! the flat entries to [`VideoHit`]s. Flat mode skips per-video extraction, so
//! a search costs one request to YouTube.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::process::Command;

use super::{SearchProvider, VideoHit};
use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::process::{first_stderr_line, run_with_timeout};
use crate::core::utils::{format_duration, truncate_utf8};

#[derive(Debug, Deserialize)]
struct FlatPlaylist {
    #[serde(default)]
    entries: Vec<FlatEntry>,
}

#[derive(Debug, Deserialize)]
struct FlatEntry {
    id: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    duration_string: Option<String>,
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: Option<String>,
}

/// Search provider backed by the yt-dlp binary.
#[derive(Debug, Clone)]
pub struct YtDlpSearch {
    bin: String,
    timeout: Duration,
}

impl YtDlpSearch {
    pub fn new(bin: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            timeout: config::search::ytdlp_timeout(),
        }
    }

    fn search_term(query: &str, limit: usize) -> String {
        format!("ytsearch{}:{}", limit.max(1), query)
    }
}

#[async_trait]
impl SearchProvider for YtDlpSearch {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn search(&self, query: &str, limit: usize) -> AppResult<Vec<VideoHit>> {
        let mut cmd = Command::new(&self.bin);
        cmd.args([
            "--flat-playlist",
            "--dump-single-json",
            "--no-warnings",
            "--ignore-config",
            &Self::search_term(query, limit),
        ]);

        let output = run_with_timeout(&mut cmd, self.timeout).await.map_err(|e| match e {
            AppError::Io(io) => AppError::Search(format!("Failed to run {}: {}", self.bin, io)),
            AppError::Process(msg) => AppError::Search(msg),
            other => other,
        })?;

        if !output.status.success() {
            return Err(AppError::Search(truncate_utf8(&first_stderr_line(&output), 300)));
        }

        parse_search_output(&output.stdout)
    }
}

/// Maps yt-dlp's flat playlist JSON to hits, skipping entries without an id.
pub fn parse_search_output(stdout: &[u8]) -> AppResult<Vec<VideoHit>> {
    let playlist: FlatPlaylist =
        serde_json::from_slice(stdout).map_err(|e| AppError::Search(format!("Unexpected yt-dlp output: {}", e)))?;

    Ok(playlist.entries.into_iter().filter_map(entry_to_hit).collect())
}

fn entry_to_hit(entry: FlatEntry) -> Option<VideoHit> {
    let id = entry.id.filter(|id| !id.is_empty())?;
    let duration_secs = entry.duration.filter(|d| d.is_finite() && *d >= 0.0).map(|d| d.round() as u64);
    let duration_label = match (duration_secs, entry.duration_string) {
        (Some(secs), _) => format_duration(secs),
        (None, Some(label)) => label,
        (None, None) => String::new(),
    };
    let thumbnail = entry
        .thumbnails
        .into_iter()
        .rev()
        .find_map(|t| t.url)
        .unwrap_or_else(|| config::search::THUMBNAIL_TEMPLATE.replace("{id}", &id));

    Some(VideoHit {
        title: entry.title.unwrap_or_default(),
        thumbnail,
        duration_label,
        id,
    })
}
