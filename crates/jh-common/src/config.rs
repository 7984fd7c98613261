use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dedup::MergePolicy;
use crate::matching::Weights;
use crate::source::{DelayRange, SearchCriteria};
use crate::{KeywordPref, UserPreference};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 全ソース共通の実行設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub keywords: Vec<String>,
    pub location: Option<String>,
    pub max_pages: u32,
    pub delay: DelayRange,
    /// アダプタ 1 つあたりの実行時間上限（秒）。超過したアダプタは打ち切る。
    pub adapter_timeout_secs: u64,
    pub min_salary: Option<i64>,
    /// マッチ保存の下限スコア（0〜100）
    pub min_score: f64,
    pub weights: Weights,
    pub merge_policy: MergePolicy,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            keywords: vec!["デザイナー".into()],
            location: Some("東京".into()),
            max_pages: 2,
            delay: DelayRange::default(),
            adapter_timeout_secs: 300,
            min_salary: None,
            min_score: 50.0,
            weights: Weights::default(),
            merge_policy: MergePolicy::default(),
        }
    }
}

/// ソース単位の設定。未指定の項目はグローバル設定を引き継ぐ。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub location: Option<String>,
    pub max_pages: Option<u32>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
            keywords: None,
            location: None,
            max_pages: None,
        }
    }
}

/// 1 実行分の設定スナップショット。実行中は不変として扱う。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub global: GlobalConfig,
    pub sources: BTreeMap<String, SourceConfig>,
}

impl CrawlConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn is_enabled(&self, source: &str) -> bool {
        self.sources
            .get(source)
            .map(|config| config.enabled)
            .unwrap_or(true)
    }

    /// ソース別上書きを適用した検索条件を組み立てる
    pub fn criteria_for(&self, source: &str) -> SearchCriteria {
        let overrides = self.sources.get(source);

        SearchCriteria {
            keywords: overrides
                .and_then(|c| c.keywords.clone())
                .unwrap_or_else(|| self.global.keywords.clone()),
            location: overrides
                .and_then(|c| c.location.clone())
                .or_else(|| self.global.location.clone()),
            max_pages: overrides
                .and_then(|c| c.max_pages)
                .unwrap_or(self.global.max_pages),
        }
    }

    /// 登録ユーザーがいないときのフォールバック検索条件（user_id 0）
    pub fn default_preference(&self) -> UserPreference {
        UserPreference {
            user_id: 0,
            keywords: self
                .global
                .keywords
                .iter()
                .map(|term| KeywordPref::new(term.clone()))
                .collect(),
            locations: self.global.location.iter().cloned().collect(),
            min_salary: self.global.min_salary,
            excluded_keywords: Vec::new(),
        }
    }
}
