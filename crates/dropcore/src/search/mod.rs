//! Search proxy over a pluggable provider.
//!
//! Provides the `SearchProvider` trait for search backends and the
//! `SearchService` that trims provider results to what the page needs.
//!
//! Built-in providers:
//! - `YtDlpSearch`: `ytsearchN:` queries through the yt-dlp binary

pub mod ytdlp;

pub use ytdlp::YtDlpSearch;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::core::config;
use crate::core::error::AppResult;
use crate::core::metrics;
use crate::core::validation::{is_allowed_thumbnail, require_query};

/// Everything a provider knows about one video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoHit {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    /// Human-readable duration, e.g. "3:45"; empty for livestreams or unknown
    pub duration_label: String,
}

/// One entry of the `/api/search` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    pub title: String,
    #[serde(rename = "videoId")]
    pub video_id: String,
    pub thumbnail: String,
    pub duration: String,
}

impl From<VideoHit> for SearchItem {
    fn from(hit: VideoHit) -> Self {
        Self {
            title: hit.title,
            video_id: hit.id,
            thumbnail: hit.thumbnail,
            duration: hit.duration_label,
        }
    }
}

/// Body of a successful `/api/search` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub items: Vec<SearchItem>,
}

/// Trait for search backends.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Human-readable name of this provider (e.g., "yt-dlp")
    fn name(&self) -> &str;

    /// Ranked results for `query`; `limit` is a hint and may be exceeded.
    async fn search(&self, query: &str, limit: usize) -> AppResult<Vec<VideoHit>>;
}

/// Validates the query, calls the provider and trims the results.
#[derive(Clone)]
pub struct SearchService {
    provider: Arc<dyn SearchProvider>,
    max_results: usize,
    thumbnail_hosts: Vec<String>,
}

impl SearchService {
    pub fn new(provider: Arc<dyn SearchProvider>, max_results: usize) -> Self {
        Self {
            provider,
            max_results,
            thumbnail_hosts: config::THUMBNAIL_HOSTS.clone(),
        }
    }

    /// Thumbnails outside `hosts` are replaced by the default YouTube one.
    pub fn with_thumbnail_hosts(mut self, hosts: Vec<String>) -> Self {
        self.thumbnail_hosts = hosts;
        self
    }

    fn to_item(&self, hit: VideoHit) -> SearchItem {
        let mut item = SearchItem::from(hit);
        if !is_allowed_thumbnail(&item.thumbnail, &self.thumbnail_hosts) {
            log::debug!("Replacing off-list thumbnail {:?}", item.thumbnail);
            item.thumbnail = config::search::THUMBNAIL_TEMPLATE.replace("{id}", &item.video_id);
        }
        item
    }

    /// Runs a search for the raw `query` parameter.
    pub async fn search(&self, query: Option<&str>) -> AppResult<SearchResponse> {
        let started = Instant::now();
        let query = match require_query(query) {
            Ok(query) => query,
            Err(e) => {
                metrics::record_search("bad_request", 0.0);
                return Err(e.into());
            }
        };

        log::info!("🔎 Searching [{}] for {:?}", self.provider.name(), query);
        match self.provider.search(query, self.max_results).await {
            Ok(hits) => {
                let total = hits.len();
                let items: Vec<SearchItem> = hits.into_iter().take(self.max_results).map(|hit| self.to_item(hit)).collect();
                metrics::record_search("ok", started.elapsed().as_secs_f64());
                log::info!("Search for {:?} returned {} of {} results", query, items.len(), total);
                Ok(SearchResponse { items })
            }
            Err(e) => {
                metrics::record_search("error", started.elapsed().as_secs_f64());
                log::error!("Search provider [{}] failed for {:?}: {}", self.provider.name(), query, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::AppError;
    use pretty_assertions::assert_eq;

    struct FixedProvider {
        hits: usize,
    }

    #[async_trait]
    impl SearchProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn search(&self, query: &str, _limit: usize) -> AppResult<Vec<VideoHit>> {
            Ok((0..self.hits)
                .map(|i| VideoHit {
                    id: format!("id{}", i),
                    title: format!("{} #{}", query, i),
                    thumbnail: format!("https://i.ytimg.com/vi/id{}/hqdefault.jpg", i),
                    duration_label: format!("1:{:02}", i),
                })
                .collect())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl SearchProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn search(&self, _query: &str, _limit: usize) -> AppResult<Vec<VideoHit>> {
            Err(AppError::Search("provider exploded".into()))
        }
    }

    #[tokio::test]
    async fn test_search_caps_results() {
        let service = SearchService::new(Arc::new(FixedProvider { hits: 15 }), config::search::MAX_RESULTS);
        let response = service.search(Some("lofi")).await.unwrap();
        assert_eq!(response.items.len(), 10);
        assert_eq!(
            response.items[0],
            SearchItem {
                title: "lofi #0".into(),
                video_id: "id0".into(),
                thumbnail: "https://i.ytimg.com/vi/id0/hqdefault.jpg".into(),
                duration: "1:00".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_search_keeps_short_lists() {
        let service = SearchService::new(Arc::new(FixedProvider { hits: 3 }), 10);
        assert_eq!(service.search(Some("x")).await.unwrap().items.len(), 3);
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let service = SearchService::new(Arc::new(FixedProvider { hits: 1 }), config::search::MAX_RESULTS);
        let err = service.search(None).await.unwrap_err();
        assert_eq!(err.public_message(), "No query provided");
        assert!(service.search(Some("")).await.is_err());
    }

    #[tokio::test]
    async fn test_search_propagates_provider_error() {
        let service = SearchService::new(Arc::new(FailingProvider), config::search::MAX_RESULTS);
        let err = service.search(Some("x")).await.unwrap_err();
        assert_eq!(err.public_message(), "provider exploded");
    }

    struct OffListThumbnail;

    #[async_trait]
    impl SearchProvider for OffListThumbnail {
        fn name(&self) -> &str {
            "off-list"
        }

        async fn search(&self, _query: &str, _limit: usize) -> AppResult<Vec<VideoHit>> {
            Ok(vec![VideoHit {
                id: "abc".into(),
                title: "t".into(),
                thumbnail: "https://tracker.example.com/pixel.gif".into(),
                duration_label: String::new(),
            }])
        }
    }

    #[tokio::test]
    async fn test_off_list_thumbnail_is_replaced() {
        let service = SearchService::new(Arc::new(OffListThumbnail), 10).with_thumbnail_hosts(vec!["i.ytimg.com".into()]);
        let response = service.search(Some("x")).await.unwrap();
        assert_eq!(response.items[0].thumbnail, "https://i.ytimg.com/vi/abc/hqdefault.jpg");
    }

    #[test]
    fn test_search_item_serializes_four_fields() {
        let item = SearchItem {
            title: "t".into(),
            video_id: "v".into(),
            thumbnail: "th".into(),
            duration: "1:00".into(),
        };
        let value = serde_json::to_value(&item).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["duration", "thumbnail", "title", "videoId"]);
    }
}
