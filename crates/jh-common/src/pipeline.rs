use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::CrawlConfig;
use crate::dedup::{DedupError, Deduplicator};
use crate::matching::{MatchingConfig, MatchingEngine};
use crate::normalizer::Normalizer;
use crate::run_id;
use crate::source::{SourceAdapter, SourceError};
use crate::store::{JobStore, MatchStore, PreferenceStore, StoreError, UpsertOutcome};
use crate::{CanonicalJob, RawListing};

/// 1 実行分の状態機械。Failed はどの段階からも到達し得る。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunStage {
    #[default]
    Idle,
    Fetching,
    Normalizing,
    Deduplicating,
    Persisted,
    Matching,
    Done,
    Failed,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::Idle => "idle",
            RunStage::Fetching => "fetching",
            RunStage::Normalizing => "normalizing",
            RunStage::Deduplicating => "deduplicating",
            RunStage::Persisted => "persisted",
            RunStage::Matching => "matching",
            RunStage::Done => "done",
            RunStage::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub source: String,
    pub fetched: usize,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// 実行レポート。部分失敗は件数として報告し、実行自体は止めない。
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub run_id: String,
    pub stage: RunStage,
    pub sources: Vec<SourceOutcome>,
    pub fetched: usize,
    pub dropped_unparseable: usize,
    pub inserted: usize,
    pub merged: usize,
    pub record_failures: usize,
    pub users_matched: usize,
    pub matches_written: usize,
}

impl RunReport {
    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_some()).count()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// ストア障害は実行全体に対して致命的
    #[error("store failure during {stage}: {source}")]
    Store {
        stage: &'static str,
        #[source]
        source: StoreError,
    },
}

/// 取得 → 正規化 → 重複排除 → マッチングを順に進めるオーケストレータ
///
/// アダプタは 1 タスクずつ並行実行し、1 つの失敗・タイムアウトは
/// そのソースのスキップに留める。マッチングは全ユーザー × 全求人に対して
/// 実行する（条件やロジックが新着と独立に変わり得るため）。
pub struct Pipeline {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    jobs: Arc<dyn JobStore>,
    preferences: Arc<dyn PreferenceStore>,
    matches: Arc<dyn MatchStore>,
    config: CrawlConfig,
    normalizer: Normalizer,
}

impl Pipeline {
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        jobs: Arc<dyn JobStore>,
        preferences: Arc<dyn PreferenceStore>,
        matches: Arc<dyn MatchStore>,
        config: CrawlConfig,
    ) -> Self {
        Self {
            adapters,
            jobs,
            preferences,
            matches,
            config,
            normalizer: Normalizer::default(),
        }
    }

    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let mut report = RunReport {
            run_id: run_id::generate(),
            ..RunReport::default()
        };
        info!(run_id = %report.run_id, "starting pipeline run");

        report.stage = RunStage::Fetching;
        let raw = self.fetch_all(&mut report).await;
        report.fetched = raw.len();

        report.stage = RunStage::Normalizing;
        let canonical = self.normalize_all(raw, &mut report);

        report.stage = RunStage::Deduplicating;
        if let Err(err) = self.dedup_all(canonical, &mut report).await {
            return Self::fail(report, err);
        }
        report.stage = RunStage::Persisted;
        debug!(
            run_id = %report.run_id,
            inserted = report.inserted,
            merged = report.merged,
            "listings persisted"
        );

        report.stage = RunStage::Matching;
        if let Err(err) = self.match_all(&mut report).await {
            return Self::fail(report, err);
        }

        report.stage = RunStage::Done;
        info!(
            run_id = %report.run_id,
            fetched = report.fetched,
            inserted = report.inserted,
            merged = report.merged,
            dropped = report.dropped_unparseable,
            failed_sources = report.failed_sources(),
            users_matched = report.users_matched,
            matches_written = report.matches_written,
            "pipeline run finished"
        );
        Ok(report)
    }

    fn fail(mut report: RunReport, err: PipelineError) -> Result<RunReport, PipelineError> {
        report.stage = RunStage::Failed;
        error!(run_id = %report.run_id, error = %err, "pipeline run aborted");
        Err(err)
    }

    async fn fetch_all(&self, report: &mut RunReport) -> Vec<RawListing> {
        let timeout = Duration::from_secs(self.config.global.adapter_timeout_secs);
        let mut tasks: JoinSet<(SourceOutcome, Vec<RawListing>)> = JoinSet::new();

        for adapter in &self.adapters {
            let name = adapter.name().to_string();
            if !self.config.is_enabled(&name) {
                debug!(source = %name, "source disabled, skipping");
                continue;
            }

            let adapter = adapter.clone();
            let criteria = self.config.criteria_for(&name);
            tasks.spawn(async move {
                let started = Instant::now();
                let result = tokio::time::timeout(timeout, adapter.fetch(&criteria)).await;
                let duration_ms = started.elapsed().as_millis() as u64;

                match result {
                    Ok(Ok(listings)) => (
                        SourceOutcome {
                            source: name,
                            fetched: listings.len(),
                            error: None,
                            duration_ms,
                        },
                        listings,
                    ),
                    Ok(Err(SourceError::Unavailable(message))) => (
                        SourceOutcome {
                            source: name,
                            fetched: 0,
                            error: Some(message),
                            duration_ms,
                        },
                        Vec::new(),
                    ),
                    Err(_) => (
                        SourceOutcome {
                            source: name,
                            fetched: 0,
                            error: Some(format!("timed out after {}s", timeout.as_secs())),
                            duration_ms,
                        },
                        Vec::new(),
                    ),
                }
            });
        }

        let mut all = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((outcome, listings)) => {
                    match &outcome.error {
                        Some(message) => warn!(
                            source = %outcome.source,
                            error = %message,
                            "source skipped for this run"
                        ),
                        None => info!(
                            source = %outcome.source,
                            fetched = outcome.fetched,
                            duration_ms = outcome.duration_ms,
                            "source fetch complete"
                        ),
                    }
                    report.sources.push(outcome);
                    all.extend(listings);
                }
                Err(err) => {
                    warn!(error = %err, "adapter task aborted");
                    report.sources.push(SourceOutcome {
                        source: "unknown".into(),
                        fetched: 0,
                        error: Some(err.to_string()),
                        duration_ms: 0,
                    });
                }
            }
        }

        all
    }

    fn normalize_all(&self, raw: Vec<RawListing>, report: &mut RunReport) -> Vec<CanonicalJob> {
        raw.into_iter()
            .filter_map(|listing| match self.normalizer.normalize(&listing) {
                Ok(job) => Some(job),
                Err(err) => {
                    report.dropped_unparseable += 1;
                    debug!(source = %listing.source, error = %err, "dropped unparseable listing");
                    None
                }
            })
            .collect()
    }

    async fn dedup_all(
        &self,
        jobs: Vec<CanonicalJob>,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        let dedup = Deduplicator::new(self.jobs.clone(), self.config.global.merge_policy);
        let now = Utc::now();

        for job in jobs {
            let fingerprint = job.fingerprint.clone();
            match dedup.apply(job, now).await {
                Ok(UpsertOutcome::Inserted) => report.inserted += 1,
                Ok(UpsertOutcome::Merged) => report.merged += 1,
                Err(DedupError::DuplicateRace { fingerprint }) => {
                    report.record_failures += 1;
                    error!(%fingerprint, "persistent upsert race, record dropped");
                }
                Err(DedupError::Store(source)) => {
                    error!(%fingerprint, "job store failed, aborting run");
                    return Err(PipelineError::Store {
                        stage: "deduplicating",
                        source,
                    });
                }
            }
        }

        Ok(())
    }

    async fn match_all(&self, report: &mut RunReport) -> Result<(), PipelineError> {
        let users = self
            .preferences
            .list_active_users()
            .await
            .map_err(|source| PipelineError::Store {
                stage: "matching",
                source,
            })?;

        let users = if users.is_empty() {
            info!("no active users, matching against the default preference");
            vec![self.config.default_preference()]
        } else {
            users
        };

        let jobs = Arc::new(self.jobs.list_all().await.map_err(|source| {
            PipelineError::Store {
                stage: "matching",
                source,
            }
        })?);

        let matching_config = MatchingConfig {
            weights: self.config.global.weights,
            min_score: self.config.global.min_score,
        };
        let computed_at = Utc::now();

        let mut tasks: JoinSet<Result<(i64, usize), StoreError>> = JoinSet::new();
        for pref in users {
            let jobs = jobs.clone();
            let store = self.matches.clone();
            let config = matching_config.clone();
            tasks.spawn(async move {
                let engine = MatchingEngine::new(config);
                let ranked = engine.rank_jobs(&pref, &jobs, computed_at);
                let written = ranked.len();
                store.replace_for_user(pref.user_id, &ranked).await?;
                Ok((pref.user_id, written))
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok((user_id, written))) => {
                    report.users_matched += 1;
                    report.matches_written += written;
                    debug!(user_id, written, "stored ranked matches");
                }
                Ok(Err(source)) => {
                    return Err(PipelineError::Store {
                        stage: "matching",
                        source,
                    });
                }
                Err(err) => {
                    report.record_failures += 1;
                    warn!(error = %err, "matching task aborted");
                }
            }
        }

        Ok(())
    }
}
