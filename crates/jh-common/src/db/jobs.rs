use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio_postgres::Row;
use tracing::instrument;

use super::{pg_error, pool_error, PgPool};
use crate::dedup::{merge_job, MergePolicy};
use crate::salary::CURRENCY_JPY;
use crate::store::{JobStats, JobStore, StoreError, UpsertOutcome};
use crate::{CanonicalJob, SalaryRange};

const JOB_COLUMNS: &str = "fingerprint, title, company, location_text, location_token, \
     salary_min, salary_max, salary_currency, salary_text, description, \
     sources, first_seen, last_seen";

/// Postgres 実装の求人ストア
///
/// upsert は `SELECT ... FOR UPDATE` の行ロックで指紋単位の
/// check-then-act を直列化する。未登録指紋同士の競合は一意制約違反として
/// [`StoreError::Conflict`] になり、呼び出し側（Deduplicator）のリトライで
/// 既存行ロックに合流する。
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn sources_json(sources: &BTreeMap<String, String>) -> Value {
    serde_json::to_value(sources).unwrap_or_else(|_| Value::Object(Default::default()))
}

fn map_job_row(row: &Row) -> Result<CanonicalJob, StoreError> {
    let sources_value: Value = row.get("sources");
    let sources: BTreeMap<String, String> = serde_json::from_value(sources_value)
        .map_err(|e| StoreError::Query(format!("failed to map sources column: {e}")))?;

    let salary = match (
        row.get::<_, Option<i64>>("salary_min"),
        row.get::<_, Option<i64>>("salary_max"),
    ) {
        (Some(min), Some(max)) => Some(SalaryRange {
            min,
            max,
            currency: row
                .get::<_, Option<String>>("salary_currency")
                .unwrap_or_else(|| CURRENCY_JPY.to_string()),
        }),
        _ => None,
    };

    Ok(CanonicalJob {
        title: row.get("title"),
        company: row.get("company"),
        location_text: row.get("location_text"),
        location_token: row.get("location_token"),
        salary,
        salary_text: row.get("salary_text"),
        description: row.get("description"),
        sources,
        first_seen: row.get::<_, Option<DateTime<Utc>>>("first_seen"),
        last_seen: row.get::<_, Option<DateTime<Utc>>>("last_seen"),
        fingerprint: row.get("fingerprint"),
    })
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<CanonicalJob>, StoreError> {
        let client = self.pool.get().await.map_err(pool_error)?;
        let query = format!("SELECT {JOB_COLUMNS} FROM jh.jobs WHERE fingerprint = $1");
        let row = client
            .query_opt(query.as_str(), &[&fingerprint])
            .await
            .map_err(pg_error)?;

        row.as_ref().map(map_job_row).transpose()
    }

    #[instrument(skip(self, job), fields(fingerprint = %job.fingerprint))]
    async fn upsert(
        &self,
        job: &CanonicalJob,
        policy: MergePolicy,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut client = self.pool.get().await.map_err(pool_error)?;
        let tx = client.transaction().await.map_err(pg_error)?;

        let lock_query = format!("SELECT {JOB_COLUMNS} FROM jh.jobs WHERE fingerprint = $1 FOR UPDATE");
        let existing = tx
            .query_opt(lock_query.as_str(), &[&job.fingerprint])
            .await
            .map_err(pg_error)?;

        let outcome = match existing {
            Some(row) => {
                let current = map_job_row(&row)?;
                let merged = merge_job(&current, job, policy);
                tx.execute(
                    "UPDATE jh.jobs SET
                        title = $2,
                        company = $3,
                        location_text = $4,
                        location_token = $5,
                        salary_min = $6,
                        salary_max = $7,
                        salary_currency = $8,
                        salary_text = $9,
                        description = $10,
                        sources = $11,
                        first_seen = $12,
                        last_seen = $13
                     WHERE fingerprint = $1",
                    &[
                        &merged.fingerprint,
                        &merged.title,
                        &merged.company,
                        &merged.location_text,
                        &merged.location_token,
                        &merged.salary.as_ref().map(|s| s.min),
                        &merged.salary.as_ref().map(|s| s.max),
                        &merged.salary.as_ref().map(|s| s.currency.clone()),
                        &merged.salary_text,
                        &merged.description,
                        &sources_json(&merged.sources),
                        &merged.first_seen,
                        &merged.last_seen,
                    ],
                )
                .await
                .map_err(pg_error)?;
                UpsertOutcome::Merged
            }
            None => {
                tx.execute(
                    "INSERT INTO jh.jobs (
                        fingerprint, title, company, location_text, location_token,
                        salary_min, salary_max, salary_currency, salary_text, description,
                        sources, first_seen, last_seen
                     ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
                    &[
                        &job.fingerprint,
                        &job.title,
                        &job.company,
                        &job.location_text,
                        &job.location_token,
                        &job.salary.as_ref().map(|s| s.min),
                        &job.salary.as_ref().map(|s| s.max),
                        &job.salary.as_ref().map(|s| s.currency.clone()),
                        &job.salary_text,
                        &job.description,
                        &sources_json(&job.sources),
                        &job.first_seen,
                        &job.last_seen,
                    ],
                )
                .await
                .map_err(pg_error)?;
                UpsertOutcome::Inserted
            }
        };

        tx.commit().await.map_err(pg_error)?;
        Ok(outcome)
    }

    async fn list_all(&self) -> Result<Vec<CanonicalJob>, StoreError> {
        let client = self.pool.get().await.map_err(pool_error)?;
        let query = format!("SELECT {JOB_COLUMNS} FROM jh.jobs ORDER BY fingerprint");
        let rows = client
            .query(query.as_str(), &[])
            .await
            .map_err(pg_error)?;

        rows.iter().map(map_job_row).collect()
    }

    async fn stats(&self) -> Result<JobStats, StoreError> {
        let client = self.pool.get().await.map_err(pool_error)?;

        let total: i64 = client
            .query_one("SELECT COUNT(*) FROM jh.jobs", &[])
            .await
            .map_err(pg_error)?
            .get(0);

        let rows = client
            .query(
                "SELECT key, COUNT(*) FROM jh.jobs,
                    LATERAL jsonb_object_keys(sources) AS key
                 GROUP BY key ORDER BY key",
                &[],
            )
            .await
            .map_err(pg_error)?;

        let by_source = rows
            .into_iter()
            .map(|row| (row.get::<_, String>(0), row.get::<_, i64>(1) as u64))
            .collect();

        Ok(JobStats {
            total: total as u64,
            by_source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_serialize_as_a_json_object() {
        let sources: BTreeMap<String, String> =
            [("doda".to_string(), "https://doda.example/1".to_string())]
                .into_iter()
                .collect();

        let value = sources_json(&sources);
        assert_eq!(value["doda"], "https://doda.example/1");

        let empty = sources_json(&BTreeMap::new());
        assert!(empty.as_object().map(|o| o.is_empty()).unwrap_or(false));
    }
}
