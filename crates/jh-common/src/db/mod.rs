pub mod jobs;
pub mod matches;
pub mod migrations;
pub mod pool;
pub mod preferences;

pub use jobs::PgJobStore;
pub use matches::PgMatchStore;
pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool_from_url, DbPoolError, PgPool};
pub use preferences::PgPreferenceStore;

use deadpool_postgres::PoolError;
use tokio_postgres::error::SqlState;
use tokio_postgres::Error as PgError;

use crate::store::StoreError;

// Store trait 実装が共有するエラーマッピング。
// 接続系は Unavailable、一意制約違反は Conflict、その他は Query に落とす。

pub(crate) fn pool_error(err: PoolError) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

pub(crate) fn pg_error(err: PgError) -> StoreError {
    if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        StoreError::Conflict(err.to_string())
    } else {
        StoreError::Query(err.to_string())
    }
}
