use clap::Parser;
use std::path::PathBuf;

mod broker;
mod config;
mod core;
mod logging;
mod sink;

use broker::AmqpConnectionConfig;
use config::{DumpConfig, OutputMode};

/// amqp-dump - Dump messages from an AMQP queue
#[derive(Parser)]
#[command(name = "amqp-dump")]
#[command(version = "0.1.0")]
#[command(about = "Pull messages from an AMQP queue and save them to files or a SQLite database")]
struct Cli {
    /// AMQP URI
    #[arg(long, default_value = config::types::DEFAULT_URI)]
    uri: String,

    /// Insecure TLS mode: don't check certificates
    #[arg(long)]
    insecure_tls: bool,

    /// AMQP queue name
    #[arg(long, default_value = "")]
    queue: String,

    /// Acknowledge messages
    #[arg(long)]
    ack: bool,

    /// Maximum number of messages to dump or 0 for unlimited
    #[arg(long, default_value_t = config::types::DEFAULT_MAX_MESSAGES)]
    max_messages: u64,

    /// Directory in which to save the dumped messages
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Dump messages to a SQLite database
    #[arg(long)]
    db: bool,

    /// Dump the message, its properties and headers
    #[arg(long)]
    full: bool,

    /// Print progress
    #[arg(long)]
    verbose: bool,

    /// Diagnostic log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Cli {
    fn into_config(self) -> DumpConfig {
        let output = if self.db {
            if self.full {
                tracing::warn!("--full only applies to file dumps and is ignored with --db");
            }
            OutputMode::Store
        } else {
            OutputMode::Files { full: self.full }
        };

        DumpConfig {
            connection: AmqpConnectionConfig::new(&self.uri, self.insecure_tls),
            queue: self.queue,
            ack: self.ack.into(),
            max_messages: self.max_messages,
            output_dir: self.output_dir,
            output,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Unexpected positional arguments exit with status 2 and usage text
    let cli = Cli::parse();

    logging::init_logging(&cli.log_level, cli.verbose);

    let config = cli.into_config();

    if let Err(e) = core::dump::run(&config).await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
