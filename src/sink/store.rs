//! Store Sink
//!
//! Persists messages as rows of the `dump` table in a SQLite database. The
//! `headers` column holds the whole properties/headers envelope, not only the
//! headers; the column name is kept so existing dumps stay readable.

use crate::core::error::{DumpError, Result};
use crate::core::message::Message;
use crate::core::metadata::Envelope;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use std::path::{Path, PathBuf};

/// Database file created in the output directory.
pub const DB_FILE_NAME: &str = "dump.db";

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS dump (\
    id INTEGER PRIMARY KEY AUTOINCREMENT,\
    message STRING NOT NULL,\
    headers STRING NOT NULL\
    );";

const INSERT_ROW: &str = "INSERT INTO dump (message, headers) VALUES (?, ?)";

pub struct StoreSink {
    path: PathBuf,
    conn: SqliteConnection,
}

impl StoreSink {
    /// Opens (creating if needed) the database at `path` and ensures the
    /// `dump` table exists.
    pub async fn open(path: &Path) -> Result<Self> {
        let mut conn = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .connect()
            .await
            .map_err(DumpError::StoreInit)?;

        if let Err(e) = sqlx::query(CREATE_TABLE).execute(&mut conn).await {
            if let Err(close_err) = conn.close().await {
                tracing::warn!("Failed to close '{}': {close_err}", path.display());
            }
            return Err(DumpError::StoreInit(e));
        }

        tracing::debug!("Store sink opened '{}'", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            conn,
        })
    }

    /// Inserts one row for `msg`: the raw body and the indented JSON envelope.
    pub async fn insert(&mut self, msg: &Message) -> Result<()> {
        let envelope = Envelope::from_message(msg).to_json_pretty()?;

        sqlx::query(INSERT_ROW)
            .bind(msg.body.as_slice())
            .bind(envelope)
            .execute(&mut self.conn)
            .await
            .map_err(DumpError::Store)?;

        Ok(())
    }

    /// Inserts one row for `msg`, logging instead of returning failures.
    /// Returns whether the row was written.
    pub async fn persist(&mut self, msg: &Message, counter: u64) -> bool {
        match self.insert(msg).await {
            Ok(()) => {
                tracing::debug!("Message {counter} inserted into '{}'", self.path.display());
                true
            }
            Err(e) => {
                tracing::error!("Message {counter} not stored: {e}");
                false
            }
        }
    }

    pub async fn close(self) {
        if let Err(e) = self.conn.close().await {
            tracing::warn!("Failed to close '{}': {e}", self.path.display());
        }
    }
}
