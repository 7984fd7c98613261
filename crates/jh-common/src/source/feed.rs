use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{DelayRange, SearchCriteria, SourceAdapter, SourceError};
use crate::RawListing;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct FeedAdapterConfig {
    pub name: String,
    pub endpoint: String,
    pub delay: DelayRange,
    /// 1 回の fetch に使える時間。超過時は取得済みページまでで打ち切り、
    /// 部分結果をそのまま返す。
    pub time_budget: Option<Duration>,
}

/// JSON フィードを公開しているボード向けのアダプタ
///
/// HTML スクレイピングが必要なボードは外部プラグインとして同じ
/// [`SourceAdapter`] 契約を実装する。HTTP セッションは adapter が所有し、
/// どの経路で抜けても drop で確実に解放される。
pub struct FeedAdapter {
    config: FeedAdapterConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct FeedPage {
    #[serde(default)]
    listings: Vec<FeedListing>,
    #[serde(default)]
    has_next: bool,
}

#[derive(Debug, Deserialize)]
struct FeedListing {
    url: String,
    title: String,
    #[serde(default)]
    company: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    salary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    posted_at: Option<DateTime<Utc>>,
}

impl FeedAdapter {
    pub fn new(config: FeedAdapterConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn to_raw(&self, listing: FeedListing, retrieved_at: DateTime<Utc>) -> RawListing {
        RawListing {
            source: self.config.name.clone(),
            url: listing.url,
            title: listing.title,
            company: listing.company,
            location_text: listing.location,
            salary_text: listing.salary,
            description: listing.description,
            posted_at: listing.posted_at,
            retrieved_at: Some(retrieved_at),
        }
    }

    fn budget_exhausted(&self, started: Instant) -> bool {
        self.config
            .time_budget
            .map(|budget| started.elapsed() >= budget)
            .unwrap_or(false)
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn fetch(&self, criteria: &SearchCriteria) -> Result<Vec<RawListing>, SourceError> {
        let started = Instant::now();
        let keywords = criteria.keywords.join(" ");
        let mut listings = Vec::new();

        for page in 1..=criteria.max_pages.max(1) {
            if page > 1 {
                if self.budget_exhausted(started) {
                    warn!(
                        source = %self.config.name,
                        page,
                        collected = listings.len(),
                        "time budget exhausted, returning partial results"
                    );
                    break;
                }
                self.config.delay.wait().await;
            }

            let mut request = self
                .client
                .get(&self.config.endpoint)
                .query(&[("q", keywords.as_str()), ("page", page.to_string().as_str())]);
            if let Some(location) = criteria.location.as_deref() {
                request = request.query(&[("location", location)]);
            }

            let page_result = async {
                let response = request.send().await?.error_for_status()?;
                response.json::<FeedPage>().await
            }
            .await;

            let feed = match page_result {
                Ok(feed) => feed,
                Err(err) if page == 1 => {
                    return Err(SourceError::Unavailable(err.to_string()));
                }
                Err(err) => {
                    warn!(
                        source = %self.config.name,
                        page,
                        error = %err,
                        "page fetch failed, keeping pages collected so far"
                    );
                    break;
                }
            };

            let count = feed.listings.len();
            debug!(source = %self.config.name, page, count, "fetched feed page");

            let retrieved_at = Utc::now();
            listings.extend(
                feed.listings
                    .into_iter()
                    .map(|listing| self.to_raw(listing, retrieved_at)),
            );

            if count == 0 || !feed.has_next {
                break;
            }
        }

        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> FeedAdapterConfig {
        FeedAdapterConfig {
            name: "feedboard".into(),
            endpoint: "https://feed.example/jobs".into(),
            delay: DelayRange { min_ms: 0, max_ms: 0 },
            time_budget: None,
        }
    }

    #[test]
    fn feed_page_deserializes_with_defaults() {
        let json = r#"{
            "listings": [
                {"url": "https://feed.example/jobs/1", "title": "UXデザイナー", "company": "Acme"}
            ],
            "has_next": true
        }"#;

        let page: FeedPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.listings.len(), 1);
        assert!(page.has_next);
        assert_eq!(page.listings[0].company, "Acme");
        assert_eq!(page.listings[0].salary, None);
    }

    #[test]
    fn listings_map_to_raw_records() {
        let adapter = FeedAdapter::new(base_config()).unwrap();
        let retrieved_at = Utc::now();
        let raw = adapter.to_raw(
            FeedListing {
                url: "https://feed.example/jobs/1".into(),
                title: "UXデザイナー".into(),
                company: "Acme".into(),
                location: Some("東京都渋谷区".into()),
                salary: Some("400万〜600万円".into()),
                description: None,
                posted_at: None,
            },
            retrieved_at,
        );

        assert_eq!(raw.source, "feedboard");
        assert_eq!(raw.title, "UXデザイナー");
        assert_eq!(raw.retrieved_at, Some(retrieved_at));
    }

    #[test]
    fn budget_exhaustion_is_detected() {
        let mut config = base_config();
        config.time_budget = Some(Duration::from_millis(0));
        let adapter = FeedAdapter::new(config).unwrap();
        assert!(adapter.budget_exhausted(Instant::now()));

        let adapter = FeedAdapter::new(base_config()).unwrap();
        assert!(!adapter.budget_exhausted(Instant::now()));
    }
}
