use async_trait::async_trait;
use serde_json::Value;
use tokio_postgres::Row;

use super::{pg_error, pool_error, PgPool};
use crate::store::{PreferenceStore, StoreError};
use crate::{KeywordPref, UserPreference};

/// Postgres 実装の検索条件ストア。is_active なユーザーのみ返す。
pub struct PgPreferenceStore {
    pool: PgPool,
}

impl PgPreferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_preference_row(row: &Row) -> Result<UserPreference, StoreError> {
    let keywords: Vec<KeywordPref> = parse_json_column(row, "keywords")?;
    let locations: Vec<String> = parse_json_column(row, "locations")?;
    let excluded_keywords: Vec<String> = parse_json_column(row, "excluded_keywords")?;

    Ok(UserPreference {
        user_id: row.get("user_id"),
        keywords,
        locations,
        min_salary: row.get("min_salary"),
        excluded_keywords,
    })
}

fn parse_json_column<T: serde::de::DeserializeOwned>(
    row: &Row,
    column: &str,
) -> Result<T, StoreError> {
    let value: Value = row.get(column);
    serde_json::from_value(value)
        .map_err(|e| StoreError::Query(format!("failed to map {column} column: {e}")))
}

#[async_trait]
impl PreferenceStore for PgPreferenceStore {
    async fn list_active_users(&self) -> Result<Vec<UserPreference>, StoreError> {
        let client = self.pool.get().await.map_err(pool_error)?;
        let rows = client
            .query(
                "SELECT user_id, keywords, locations, min_salary, excluded_keywords
                 FROM jh.user_preferences
                 WHERE is_active
                 ORDER BY user_id",
                &[],
            )
            .await
            .map_err(pg_error)?;

        rows.iter().map(map_preference_row).collect()
    }
}
