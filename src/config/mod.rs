///! Configuration Module

pub mod types;
pub mod validation;

pub use types::{AckMode, DumpConfig, OutputMode};
pub use validation::validate_config;
