pub mod feed;

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::RawListing;

pub use feed::{FeedAdapter, FeedAdapterConfig};

/// 1 実行分の検索条件スナップショット。実行中は不変。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub keywords: Vec<String>,
    pub location: Option<String>,
    pub max_pages: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// 回復不能な取得失敗。当該ソースはこの実行ではスキップされる。
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// 求人ボードごとの取得アダプタ
///
/// 1 ボード = 1 実装。可変状態は共有せず、結果は自分のバッチとしてのみ返す。
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, criteria: &SearchCriteria) -> Result<Vec<RawListing>, SourceError>;
}

/// リクエスト間の礼節待機レンジ（ミリ秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            min_ms: 2000,
            max_ms: 3000,
        }
    }
}

impl DelayRange {
    /// レンジ内のランダムな時間だけ待つ
    pub async fn wait(&self) {
        let ms = if self.max_ms > self.min_ms {
            rand::thread_rng().gen_range(self.min_ms..=self.max_ms)
        } else {
            self.min_ms
        };
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_delay_range_matches_polite_crawling() {
        let delay = DelayRange::default();
        assert_eq!(delay.min_ms, 2000);
        assert_eq!(delay.max_ms, 3000);
    }

    #[tokio::test]
    async fn zero_delay_returns_immediately() {
        let delay = DelayRange { min_ms: 0, max_ms: 0 };
        delay.wait().await;
    }
}
