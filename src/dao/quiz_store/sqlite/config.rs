use std::{str::FromStr, time::Duration};

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};

use super::error::{SqliteDaoError, SqliteResult};

const DEFAULT_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings of the SQLite store.
#[derive(Clone, Debug)]
pub struct SqliteConfig {
    /// sqlx connection string.
    pub url: String,
    /// Size of the connection pool.
    pub max_connections: u32,
    /// How long a writer waits on a locked database.
    pub busy_timeout: Duration,
}

impl SqliteConfig {
    /// Settings for `url` with the default pool size and busy timeout.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Private in-memory database, used by tests.
    pub fn in_memory() -> Self {
        Self::from_url("sqlite::memory:")
    }

    pub(crate) fn is_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    pub(crate) fn connect_options(&self) -> SqliteResult<SqliteConnectOptions> {
        let options = SqliteConnectOptions::from_str(&self.url).map_err(|source| {
            SqliteDaoError::InvalidUrl {
                url: self.url.clone(),
                source,
            }
        })?;

        let options = options
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout);

        if self.is_memory() {
            return Ok(options);
        }

        Ok(options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal))
    }

    pub(crate) fn pool_options(&self) -> SqlitePoolOptions {
        // every connection to `:memory:` opens its own database, so the pool
        // must keep exactly one alive for the store's lifetime
        if self.is_memory() {
            return SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        SqlitePoolOptions::new()
            .max_connections(self.max_connections.max(1))
            .acquire_timeout(self.busy_timeout * 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_memory_urls() {
        assert!(SqliteConfig::in_memory().is_memory());
        assert!(SqliteConfig::from_url("sqlite:file:quiz?mode=memory&cache=shared").is_memory());
        assert!(!SqliteConfig::from_url("sqlite://data/aniguess.db").is_memory());
    }

    #[test]
    fn rejects_unparseable_urls() {
        let err = SqliteConfig::from_url("sqlite://data/aniguess.db?flavour=strawberry").connect_options();
        assert!(matches!(err, Err(SqliteDaoError::InvalidUrl { .. })));
    }
}
