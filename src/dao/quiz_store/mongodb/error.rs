use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB operation `{operation}` failed")]
    Operation {
        operation: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("field `{field}` holds an unreadable value `{value}`")]
    Corrupt { field: &'static str, value: String },
}

impl MongoDaoError {
    pub(crate) fn operation(operation: &'static str) -> impl FnOnce(MongoError) -> Self {
        move |source| Self::Operation { operation, source }
    }

    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::MissingEnvVar { .. }
            | Self::InvalidUri { .. }
            | Self::ClientConstruction { .. }
            | Self::InitialPing { .. }
            | Self::HealthPing { .. } => true,
            Self::EnsureIndex { source, .. } | Self::Operation { source, .. } => matches!(
                *source.kind,
                ErrorKind::Io(_)
                    | ErrorKind::ServerSelection { .. }
                    | ErrorKind::ConnectionPoolCleared { .. }
            ),
            Self::Corrupt { .. } => false,
        }
    }
}

pub(super) fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write_error)) if write_error.code == DUPLICATE_KEY
    )
}
