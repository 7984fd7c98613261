use deadpool_postgres::PoolError;
use thiserror::Error;
use tokio_postgres::Error as PgError;
use tracing::{info, instrument};

use crate::db::PgPool;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("failed to run migration: {0}")]
    Postgres(#[from] PgError),
}

struct Migration {
    id: i32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    id: 1,
    description: "jobs / user_preferences / matched_jobs tables",
    sql: r#"
CREATE TABLE IF NOT EXISTS jh.jobs (
    fingerprint TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    company TEXT NOT NULL,
    location_text TEXT,
    location_token TEXT,
    salary_min BIGINT,
    salary_max BIGINT,
    salary_currency TEXT,
    salary_text TEXT,
    description TEXT,
    sources JSONB NOT NULL DEFAULT '{}'::jsonb,
    first_seen TIMESTAMPTZ,
    last_seen TIMESTAMPTZ
);

CREATE INDEX IF NOT EXISTS idx_jobs_last_seen ON jh.jobs(last_seen);
CREATE INDEX IF NOT EXISTS idx_jobs_location_token ON jh.jobs(location_token);

CREATE TABLE IF NOT EXISTS jh.user_preferences (
    user_id BIGINT PRIMARY KEY,
    keywords JSONB NOT NULL DEFAULT '[]'::jsonb,
    locations JSONB NOT NULL DEFAULT '[]'::jsonb,
    min_salary BIGINT,
    excluded_keywords JSONB NOT NULL DEFAULT '[]'::jsonb,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS jh.matched_jobs (
    user_id BIGINT NOT NULL,
    fingerprint TEXT NOT NULL,
    score DOUBLE PRECISION NOT NULL,
    reasons JSONB NOT NULL DEFAULT '[]'::jsonb,
    computed_at TIMESTAMPTZ,
    PRIMARY KEY (user_id, fingerprint)
);

CREATE INDEX IF NOT EXISTS idx_matched_jobs_user_score
    ON jh.matched_jobs(user_id, score DESC);
"#,
}];

/// 未適用のマイグレーションを順に適用する
#[instrument(skip(pool))]
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrationError> {
    let mut client = pool.get().await?;
    client
        .batch_execute(
            "CREATE SCHEMA IF NOT EXISTS jh;
             CREATE TABLE IF NOT EXISTS jh.schema_migrations (
                id INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
             );",
        )
        .await?;

    for migration in MIGRATIONS {
        let already_applied: bool = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM jh.schema_migrations WHERE id = $1)",
                &[&migration.id],
            )
            .await?
            .get(0);

        if already_applied {
            continue;
        }

        let tx = client.transaction().await?;
        tx.batch_execute(migration.sql).await?;
        tx.execute(
            "INSERT INTO jh.schema_migrations (id, description) VALUES ($1, $2)",
            &[&migration.id, &migration.description],
        )
        .await?;
        tx.commit().await?;

        info!(
            id = migration.id,
            description = migration.description,
            "applied migration"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_ids_are_unique_and_ordered() {
        let mut last = 0;
        for migration in MIGRATIONS {
            assert!(migration.id > last, "migration ids must increase");
            last = migration.id;
        }
    }
}
