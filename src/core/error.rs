use std::path::PathBuf;

/// Errors raised while dumping a queue.
///
/// Every variant except `Store` aborts the run; store insertion failures are
/// logged by the store sink and the loop carries on.
#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("{0}")]
    Configuration(String),

    #[error("{stage}: {message}")]
    Connection { stage: &'static str, message: String },

    #[error("SQLite: {0}")]
    StoreInit(#[source] sqlx::Error),

    #[error("Queue get: {0}")]
    Fetch(String),

    #[error("save '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialize properties and headers: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("DB: {0}")]
    Store(#[source] sqlx::Error),
}

impl DumpError {
    pub fn connection(stage: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Connection {
            stage,
            message: err.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DumpError>;
