use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::{JobStore, StoreError, UpsertOutcome};
use crate::CanonicalJob;

/// 同一指紋のレコードが衝突したときのフィールド統合方針
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// 情報量の多い方を採用する（説明文は長い方、給与・勤務地は欠損を補完）
    #[default]
    RicherWins,
    /// 新しい観測を優先する（非欠損フィールドで常に上書き）
    PreferNewest,
}

#[derive(Debug, thiserror::Error)]
pub enum DedupError {
    /// リトライ後も upsert が衝突し続けた。指紋スキームかロックの欠陥を示す。
    #[error("duplicate upsert race for fingerprint {fingerprint}")]
    DuplicateRace { fingerprint: String },
    #[error("job store error: {0}")]
    Store(#[from] StoreError),
}

/// 既存レコードに新しい観測を統合する
///
/// first_seen は既存を保持し、last_seen は新しい観測の値を採る。
/// 掲載元 URL は和集合。
pub fn merge_job(existing: &CanonicalJob, incoming: &CanonicalJob, policy: MergePolicy) -> CanonicalJob {
    let mut merged = existing.clone();
    merged.last_seen = incoming.last_seen.or(existing.last_seen);

    let replace_description = match policy {
        MergePolicy::RicherWins => incoming.description_len() > existing.description_len(),
        MergePolicy::PreferNewest => incoming.description.is_some(),
    };
    if replace_description {
        merged.description = incoming.description.clone();
    }

    let replace_salary = match policy {
        MergePolicy::RicherWins => merged.salary.is_none() && incoming.salary.is_some(),
        MergePolicy::PreferNewest => incoming.salary.is_some(),
    };
    if replace_salary {
        merged.salary = incoming.salary.clone();
        merged.salary_text = incoming.salary_text.clone();
    } else if merged.salary_text.is_none() {
        merged.salary_text = incoming.salary_text.clone();
    }

    if merged.location_token.is_none() {
        merged.location_token = incoming.location_token.clone();
    }
    if merged.location_text.is_none() {
        merged.location_text = incoming.location_text.clone();
    }

    for (source, url) in &incoming.sources {
        merged
            .sources
            .entry(source.clone())
            .or_insert_with(|| url.clone());
    }

    merged
}

/// 指紋単位の check-then-act をストアの atomic upsert に委譲する重複排除器
///
/// upsert が競合を報告した場合は 1 回だけリトライし、それでも競合するなら
/// そのレコードについて致命的として [`DedupError::DuplicateRace`] を返す。
pub struct Deduplicator {
    store: Arc<dyn JobStore>,
    policy: MergePolicy,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn JobStore>, policy: MergePolicy) -> Self {
        Self { store, policy }
    }

    pub async fn apply(
        &self,
        mut job: CanonicalJob,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, DedupError> {
        job.first_seen = Some(now);
        job.last_seen = Some(now);

        match self.store.upsert(&job, self.policy).await {
            Ok(outcome) => Ok(outcome),
            Err(StoreError::Conflict(first)) => {
                warn!(
                    fingerprint = %job.fingerprint,
                    error = %first,
                    "upsert conflicted, retrying once"
                );
                match self.store.upsert(&job, self.policy).await {
                    Ok(outcome) => Ok(outcome),
                    Err(StoreError::Conflict(_)) => Err(DedupError::DuplicateRace {
                        fingerprint: job.fingerprint.clone(),
                    }),
                    Err(err) => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::salary::CURRENCY_JPY;
    use crate::SalaryRange;
    use chrono::TimeZone;

    fn base_job(fingerprint: &str) -> CanonicalJob {
        CanonicalJob {
            title: "UXデザイナー".into(),
            company: "Acme".into(),
            location_token: Some("東京".into()),
            description: Some("短い説明".into()),
            sources: [("doda".to_string(), "https://doda.example/1".to_string())]
                .into_iter()
                .collect(),
            first_seen: Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()),
            last_seen: Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()),
            fingerprint: fingerprint.into(),
            ..CanonicalJob::default()
        }
    }

    #[test]
    fn richer_wins_keeps_longer_description() {
        let existing = base_job("fp");
        let mut incoming = base_job("fp");
        incoming.description = Some("こちらの方がずっと長い詳細な説明文です。".into());
        incoming.last_seen = Some(Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap());

        let merged = merge_job(&existing, &incoming, MergePolicy::RicherWins);
        assert_eq!(merged.description, incoming.description);
        assert_eq!(merged.first_seen, existing.first_seen);
        assert_eq!(merged.last_seen, incoming.last_seen);

        // 逆方向: 短い説明は既存を上書きしない
        let shorter = merge_job(&incoming, &existing, MergePolicy::RicherWins);
        assert_eq!(shorter.description, incoming.description);
    }

    #[test]
    fn source_urls_are_unioned() {
        let existing = base_job("fp");
        let mut incoming = base_job("fp");
        incoming.sources =
            [("green".to_string(), "https://green.example/9".to_string())]
                .into_iter()
                .collect();

        let merged = merge_job(&existing, &incoming, MergePolicy::RicherWins);
        assert_eq!(merged.sources.len(), 2);
        assert!(merged.sources.contains_key("doda"));
        assert!(merged.sources.contains_key("green"));
    }

    #[test]
    fn richer_wins_fills_missing_salary_without_overwriting() {
        let mut existing = base_job("fp");
        existing.salary = Some(SalaryRange {
            min: 4_000_000,
            max: 6_000_000,
            currency: CURRENCY_JPY.to_string(),
        });
        let mut incoming = base_job("fp");
        incoming.salary = Some(SalaryRange {
            min: 5_000_000,
            max: 5_000_000,
            currency: CURRENCY_JPY.to_string(),
        });

        let merged = merge_job(&existing, &incoming, MergePolicy::RicherWins);
        assert_eq!(merged.salary, existing.salary);

        existing.salary = None;
        let filled = merge_job(&existing, &incoming, MergePolicy::RicherWins);
        assert_eq!(filled.salary, incoming.salary);
    }

    #[test]
    fn prefer_newest_overwrites_present_fields() {
        let existing = base_job("fp");
        let mut incoming = base_job("fp");
        incoming.description = Some("短".into());
        incoming.salary = Some(SalaryRange {
            min: 5_000_000,
            max: 5_000_000,
            currency: CURRENCY_JPY.to_string(),
        });

        let merged = merge_job(&existing, &incoming, MergePolicy::PreferNewest);
        assert_eq!(merged.description.as_deref(), Some("短"));
        assert_eq!(merged.salary, incoming.salary);
    }
}
