use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::scoring::{score_job, MatchScore, MatchingConfig};
use crate::{CanonicalJob, MatchedJob, UserPreference};

/// 求人全体を 1 ユーザーの条件でランキングするエンジン
pub struct MatchingEngine {
    config: MatchingConfig,
}

impl MatchingEngine {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    pub fn default() -> Self {
        Self::new(MatchingConfig::default())
    }

    /// 全求人をスコアリングし、min_score 以上を降順で返す
    ///
    /// 同点は last_seen の新しい順（鮮度タイブレーク）。
    pub fn rank_jobs(
        &self,
        pref: &UserPreference,
        jobs: &[CanonicalJob],
        computed_at: DateTime<Utc>,
    ) -> Vec<MatchedJob> {
        let mut scored: Vec<(MatchScore, &CanonicalJob)> = jobs
            .iter()
            .map(|job| (score_job(job, pref, &self.config), job))
            .filter(|(score, _)| score.total >= self.config.min_score)
            .collect();

        scored.sort_by(|a, b| {
            match b.0.total.partial_cmp(&a.0.total).unwrap_or(Ordering::Equal) {
                Ordering::Equal => b.1.last_seen.cmp(&a.1.last_seen),
                other => other,
            }
        });

        scored
            .into_iter()
            .map(|(score, job)| MatchedJob {
                user_id: pref.user_id,
                fingerprint: job.fingerprint.clone(),
                score: score.total,
                reasons: score.reasons,
                computed_at: Some(computed_at),
            })
            .collect()
    }
}
