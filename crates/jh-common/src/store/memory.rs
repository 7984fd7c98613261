use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{JobStats, JobStore, MatchStore, PreferenceStore, StoreError, UpsertOutcome};
use crate::dedup::{merge_job, MergePolicy};
use crate::{CanonicalJob, MatchedJob, UserPreference};

/// テスト・ローカル実行用のインメモリ求人ストア
///
/// 1 本のロック下で check-then-act を行うため、upsert は指紋単位で
/// アトミックになる。
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<BTreeMap<String, CanonicalJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<CanonicalJob>, StoreError> {
        let jobs = self.jobs.lock().await;
        Ok(jobs.get(fingerprint).cloned())
    }

    async fn upsert(
        &self,
        job: &CanonicalJob,
        policy: MergePolicy,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut jobs = self.jobs.lock().await;
        match jobs.get(&job.fingerprint) {
            Some(existing) => {
                let merged = merge_job(existing, job, policy);
                jobs.insert(job.fingerprint.clone(), merged);
                Ok(UpsertOutcome::Merged)
            }
            None => {
                jobs.insert(job.fingerprint.clone(), job.clone());
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn list_all(&self) -> Result<Vec<CanonicalJob>, StoreError> {
        let jobs = self.jobs.lock().await;
        Ok(jobs.values().cloned().collect())
    }

    async fn stats(&self) -> Result<JobStats, StoreError> {
        let jobs = self.jobs.lock().await;
        let mut by_source: BTreeMap<String, u64> = BTreeMap::new();
        for job in jobs.values() {
            for source in job.sources.keys() {
                *by_source.entry(source.clone()).or_insert(0) += 1;
            }
        }
        Ok(JobStats {
            total: jobs.len() as u64,
            by_source,
        })
    }
}

/// 固定のユーザーリストを返す検索条件ストア
#[derive(Default)]
pub struct MemoryPreferenceStore {
    users: Vec<UserPreference>,
}

impl MemoryPreferenceStore {
    pub fn new(users: Vec<UserPreference>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn list_active_users(&self) -> Result<Vec<UserPreference>, StoreError> {
        Ok(self.users.clone())
    }
}

#[derive(Default)]
pub struct MemoryMatchStore {
    by_user: Mutex<BTreeMap<i64, Vec<MatchedJob>>>,
}

impl MemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn matches_for(&self, user_id: i64) -> Vec<MatchedJob> {
        let by_user = self.by_user.lock().await;
        by_user.get(&user_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl MatchStore for MemoryMatchStore {
    async fn replace_for_user(
        &self,
        user_id: i64,
        matches: &[MatchedJob],
    ) -> Result<(), StoreError> {
        let mut by_user = self.by_user.lock().await;
        by_user.insert(user_id, matches.to_vec());
        Ok(())
    }
}
