//! Shared helpers for the tubedrop integration tests

#![allow(dead_code)]

#[path = "../../../dropcore/tests/mocks/mod.rs"]
pub mod mocks;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dropcore::search::VideoHit;
use dropcore::{AppConfig, AppError, AppResult, DownloadRelay, RelaySettings, SearchProvider, SearchService};
use tubedrop::AppState;

pub use mocks::{MockLauncher, Step};

/// Search provider returning `count` generated hits, or an error.
pub struct FakeSearch {
    pub count: usize,
    pub fail_with: Option<String>,
}

impl FakeSearch {
    pub fn returning(count: usize) -> Self {
        Self { count, fail_with: None }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            count: 0,
            fail_with: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    fn name(&self) -> &str {
        "fake"
    }

    async fn search(&self, query: &str, _limit: usize) -> AppResult<Vec<VideoHit>> {
        if let Some(message) = &self.fail_with {
            return Err(AppError::Search(message.clone()));
        }
        Ok((0..self.count)
            .map(|i| VideoHit {
                id: format!("vid{:02}", i),
                title: format!("{} result {}", query, i),
                thumbnail: format!("https://i.ytimg.com/vi/vid{:02}/hqdefault.jpg", i),
                duration_label: "3:20".to_string(),
            })
            .collect())
    }
}

/// Relay timers that keep keep-alives out of short tests.
pub fn quiet_settings() -> RelaySettings {
    RelaySettings {
        timeout: Duration::from_secs(60),
        keep_alive: Duration::from_secs(60),
        line_buffer: 64,
        event_buffer: 16,
    }
}

/// App state wired to mocks, serving `download_dir`.
pub fn test_state(launcher: &MockLauncher, search: FakeSearch, settings: RelaySettings, download_dir: &Path) -> AppState {
    let config = AppConfig {
        download_dir: download_dir.to_path_buf(),
        relay_timeout: settings.timeout,
        keep_alive: settings.keep_alive,
        ..AppConfig::default()
    };
    let relay = DownloadRelay::new(Arc::new(launcher.clone()), settings);
    let search = SearchService::new(Arc::new(search), config.search_max_results)
        .with_thumbnail_hosts(config.thumbnail_hosts.clone());
    AppState::new(relay, search, config)
}

/// Frames for the given lines, in order.
pub fn frames(lines: &[&str]) -> String {
    lines.iter().map(|line| format!("data: {}\n\n", line)).collect()
}

pub const VIDEO_URL: &str = "https://www.youtube.com/watch?v=abc";
pub const ENCODED_VIDEO_URL: &str = "https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3Dabc";
