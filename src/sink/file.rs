//! File Sink
//!
//! Writes each message body to `msg-NNNN` in the output directory, where
//! `NNNN` is the zero-padded retrieval counter. In full mode the normalized
//! properties and raw headers are written next to it as
//! `msg-NNNN-headers+properties.json`. Existing files are overwritten.
//!
//! Every path written is echoed to standard output.

use crate::core::error::{DumpError, Result};
use crate::core::message::Message;
use crate::core::metadata::Envelope;

use std::path::{Path, PathBuf};

/// Marker appended to the body path for the metadata sidecar.
pub const SIDECAR_SUFFIX: &str = "-headers+properties.json";

/// Path of the body file for `counter`.
pub fn message_path(output_dir: &Path, counter: u64) -> PathBuf {
    output_dir.join(format!("msg-{counter:04}"))
}

/// Path of the metadata sidecar for `counter`.
pub fn sidecar_path(output_dir: &Path, counter: u64) -> PathBuf {
    let mut path = message_path(output_dir, counter).into_os_string();
    path.push(SIDECAR_SUFFIX);
    PathBuf::from(path)
}

#[derive(Debug)]
pub struct FileSink {
    output_dir: PathBuf,
    full: bool,
}

impl FileSink {
    pub fn new(output_dir: &Path, full: bool) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            full,
        }
    }

    async fn write(&self, path: PathBuf, contents: &[u8]) -> Result<PathBuf> {
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| DumpError::io(&path, e))?;

        println!("{}", path.display());
        Ok(path)
    }

    /// Writes the body, and in full mode the sidecar, for one message.
    /// Returns the paths written in order.
    pub async fn persist(&mut self, msg: &Message, counter: u64) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(2);

        let body_path = message_path(&self.output_dir, counter);
        written.push(self.write(body_path, &msg.body).await?);

        if self.full {
            let json = Envelope::from_message(msg).to_json_pretty()?;
            let meta_path = sidecar_path(&self.output_dir, counter);
            written.push(self.write(meta_path, json.as_bytes()).await?);
        }

        tracing::debug!("Message {counter} saved to {} file(s)", written.len());
        Ok(written)
    }
}
