use super::types::DumpConfig;
use crate::core::error::{DumpError, Result};

pub fn validate_config(config: &DumpConfig) -> Result<()> {
    if config.queue.is_empty() {
        return Err(DumpError::Configuration("Must supply queue name".into()));
    }

    if config.connection.uri.is_empty() {
        return Err(DumpError::Configuration("Must supply AMQP URI".into()));
    }

    if !config.output_dir.is_dir() {
        return Err(DumpError::Configuration(format!(
            "Output directory '{}' does not exist",
            config.output_dir.display()
        )));
    }

    Ok(())
}
