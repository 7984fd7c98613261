use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use super::{pg_error, pool_error, PgPool};
use crate::store::{MatchStore, StoreError};
use crate::MatchedJob;

/// Postgres 実装のマッチ結果ストア
///
/// replace_for_user は DELETE + INSERT を 1 トランザクションで行い、
/// 前回実行分を総入れ替えする。
pub struct PgMatchStore {
    pool: PgPool,
}

impl PgMatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn reasons_json(reasons: &[String]) -> Value {
    serde_json::to_value(reasons).unwrap_or_else(|_| Value::Array(Vec::new()))
}

#[async_trait]
impl MatchStore for PgMatchStore {
    #[instrument(skip(self, matches), fields(count = matches.len()))]
    async fn replace_for_user(
        &self,
        user_id: i64,
        matches: &[MatchedJob],
    ) -> Result<(), StoreError> {
        let mut client = self.pool.get().await.map_err(pool_error)?;
        let tx = client.transaction().await.map_err(pg_error)?;

        tx.execute("DELETE FROM jh.matched_jobs WHERE user_id = $1", &[&user_id])
            .await
            .map_err(pg_error)?;

        let stmt = tx
            .prepare(
                "INSERT INTO jh.matched_jobs (user_id, fingerprint, score, reasons, computed_at)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .await
            .map_err(pg_error)?;

        for matched in matches {
            tx.execute(
                &stmt,
                &[
                    &user_id,
                    &matched.fingerprint,
                    &matched.score,
                    &reasons_json(&matched.reasons),
                    &matched.computed_at,
                ],
            )
            .await
            .map_err(pg_error)?;
        }

        tx.commit().await.map_err(pg_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_serialize_as_a_json_array() {
        let value = reasons_json(&["キーワード一致: デザイナー".to_string()]);
        assert_eq!(value[0], "キーワード一致: デザイナー");

        let empty = reasons_json(&[]);
        assert!(empty.as_array().map(|a| a.is_empty()).unwrap_or(false));
    }
}
