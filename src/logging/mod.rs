mod progress;

use progress::ProgressFormat;

use tracing::Level;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Diagnostics go to stderr, filtered by `RUST_LOG` or `default_level`.
/// With `verbose`, this crate's INFO events are also printed to stdout as
/// `* <message>` progress lines.
pub fn init_logging(default_level: &str, verbose: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let diagnostics = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .compact()
        .with_filter(filter);

    let progress = verbose.then(|| {
        fmt::layer()
            .with_writer(std::io::stdout)
            .event_format(ProgressFormat)
            .with_filter(filter_fn(|meta| {
                *meta.level() == Level::INFO && meta.target().starts_with(env!("CARGO_CRATE_NAME"))
            }))
    });

    tracing_subscriber::registry()
        .with(diagnostics)
        .with(progress)
        .init();
}
