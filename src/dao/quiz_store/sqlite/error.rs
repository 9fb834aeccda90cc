use thiserror::Error;

pub type SqliteResult<T> = std::result::Result<T, SqliteDaoError>;

#[derive(Debug, Error)]
pub enum SqliteDaoError {
    #[error("invalid SQLite connection string `{url}`")]
    InvalidUrl {
        url: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to prepare database directory `{path}`")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open SQLite database `{url}`")]
    Connect {
        url: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to apply SQLite schema")]
    Schema {
        #[source]
        source: sqlx::Error,
    },
    #[error("SQLite health check failed")]
    HealthPing {
        #[source]
        source: sqlx::Error,
    },
    #[error("SQLite operation `{operation}` failed")]
    Query {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("column `{column}` holds an unreadable value `{value}`")]
    Corrupt { column: &'static str, value: String },
}

impl SqliteDaoError {
    pub(crate) fn query(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Query { operation, source }
    }

    /// Whether the failure points at an unreachable database rather than a bad statement.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::Directory { .. } | Self::HealthPing { .. } => true,
            Self::Query { source, .. } | Self::Schema { source } => matches!(
                source,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            Self::InvalidUrl { .. } | Self::Corrupt { .. } => false,
        }
    }
}
