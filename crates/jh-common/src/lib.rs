pub mod config;
pub mod db;
pub mod dedup;
pub mod fingerprint;
pub mod location;
pub mod logging;
pub mod matching;
pub mod normalize;
pub mod normalizer;
pub mod pipeline;
pub mod run_id;
pub mod salary;
pub mod source;
pub mod store;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Commonly used data models for the pipeline.

/// 取り込み直後の生求人レコード。重複・欠損があり得る。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    pub source: String,
    pub url: String,
    pub title: String,
    pub company: String,
    pub location_text: Option<String>,
    pub salary_text: Option<String>,
    pub description: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub retrieved_at: Option<DateTime<Utc>>,
}

/// 年収レンジ（円）。単一金額は min == max で表す。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: i64,
    pub max: i64,
    pub currency: String,
}

/// 正規化・重複排除済みの求人レコード。
///
/// fingerprint は（正規化済み小文字タイトル・会社名・勤務地トークン）のみの
/// 純関数で、説明文やタイムスタンプには依存しない。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalJob {
    pub title: String,
    pub company: String,
    pub location_text: Option<String>,
    pub location_token: Option<String>,
    pub salary: Option<SalaryRange>,
    pub salary_text: Option<String>,
    pub description: Option<String>,
    /// 掲載元 → URL。同一求人が複数ボードで見つかった場合は和集合。
    pub sources: BTreeMap<String, String>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub fingerprint: String,
}

impl CanonicalJob {
    pub fn description_len(&self) -> usize {
        self.description
            .as_deref()
            .map(|d| d.chars().count())
            .unwrap_or(0)
    }
}

/// ユーザー検索条件。外側のユーザー層が書き込み、マッチャーは読み取り専用。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreference {
    pub user_id: i64,
    pub keywords: Vec<KeywordPref>,
    pub locations: Vec<String>,
    pub min_salary: Option<i64>,
    pub excluded_keywords: Vec<String>,
}

/// 検索キーワード。weight 未指定は 1.0 扱い。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordPref {
    pub term: String,
    #[serde(default)]
    pub weight: Option<f64>,
}

impl KeywordPref {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            weight: None,
        }
    }

    pub fn weighted(term: impl Into<String>, weight: f64) -> Self {
        Self {
            term: term.into(),
            weight: Some(weight),
        }
    }

    pub fn effective_weight(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }
}

/// (user_id, fingerprint) ごとに一意なマッチ結果。毎回のマッチ実行で総入れ替え。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchedJob {
    pub user_id: i64,
    pub fingerprint: String,
    pub score: f64,
    pub reasons: Vec<String>,
    pub computed_at: Option<DateTime<Utc>>,
}
