pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::dedup::MergePolicy;
use crate::{CanonicalJob, MatchedJob, UserPreference};

pub use memory::{MemoryJobStore, MemoryMatchStore, MemoryPreferenceStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 接続不能などの基盤障害。実行全体を中断させる。
    #[error("store backend unavailable: {0}")]
    Unavailable(String),
    /// 同一指紋への同時書き込み競合。呼び出し側がリトライを判断する。
    #[error("conflicting concurrent write: {0}")]
    Conflict(String),
    #[error("store query failed: {0}")]
    Query(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Merged,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStats {
    pub total: u64,
    pub by_source: BTreeMap<String, u64>,
}

/// 求人ストア。upsert は指紋単位でアトミックであること。
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<CanonicalJob>, StoreError>;

    /// 指紋が未登録なら挿入、登録済みなら `policy` に従って統合する。
    /// check-then-act の競合はストア側で解決し、解決不能なら
    /// [`StoreError::Conflict`] を返す。
    async fn upsert(
        &self,
        job: &CanonicalJob,
        policy: MergePolicy,
    ) -> Result<UpsertOutcome, StoreError>;

    async fn list_all(&self) -> Result<Vec<CanonicalJob>, StoreError>;

    async fn stats(&self) -> Result<JobStats, StoreError>;
}

/// ユーザー検索条件ストア（マッチャーからは読み取り専用）
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn list_active_users(&self) -> Result<Vec<UserPreference>, StoreError>;
}

/// マッチ結果ストア。ユーザー単位で総入れ替えする。
#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn replace_for_user(
        &self,
        user_id: i64,
        matches: &[MatchedJob],
    ) -> Result<(), StoreError>;
}
