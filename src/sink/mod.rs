pub mod file;
pub mod store;

pub use file::FileSink;
pub use store::StoreSink;

use crate::config::{DumpConfig, OutputMode};
use crate::core::error::Result;
use crate::core::message::Message;

use std::path::PathBuf;

/// What persisting one message produced.
#[derive(Debug, PartialEq, Eq)]
pub enum Persisted {
    Files(Vec<PathBuf>),
    Row { inserted: bool },
}

/// The output strategy for a run, chosen once from the configuration.
pub enum Sink {
    File(FileSink),
    Store(StoreSink),
}

impl Sink {
    pub async fn open(config: &DumpConfig) -> Result<Self> {
        match config.output {
            OutputMode::Files { full } => Ok(Sink::File(FileSink::new(&config.output_dir, full))),
            OutputMode::Store => {
                let path = config.output_dir.join(store::DB_FILE_NAME);
                Ok(Sink::Store(StoreSink::open(&path).await?))
            }
        }
    }

    /// Persists one message under `counter`.
    /// File errors are returned; store insertion errors are only logged.
    pub async fn persist(&mut self, msg: &Message, counter: u64) -> Result<Persisted> {
        match self {
            Sink::File(sink) => sink.persist(msg, counter).await.map(Persisted::Files),
            Sink::Store(sink) => Ok(Persisted::Row {
                inserted: sink.persist(msg, counter).await,
            }),
        }
    }

    pub async fn close(self) {
        match self {
            Sink::File(_) => {}
            Sink::Store(sink) => {
                sink.close().await;
                tracing::info!("DB connection closed");
            }
        }
    }
}
