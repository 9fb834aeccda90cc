mod config;
mod error;
mod models;
pub mod store;

pub use config::SqliteConfig;
pub use error::SqliteDaoError;
pub use store::SqliteQuizStore;

use crate::dao::storage::StorageError;

impl From<SqliteDaoError> for StorageError {
    fn from(err: SqliteDaoError) -> Self {
        let message = err.to_string();
        if err.is_unavailable() {
            StorageError::unavailable(message, err)
        } else {
            StorageError::failed(message, err)
        }
    }
}
