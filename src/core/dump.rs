use super::error::Result;
use crate::broker::{AmqpSource, MessageSource};
use crate::config::{validate_config, DumpConfig};
use crate::sink::{Persisted, Sink};

/// Totals for a finished run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DumpSummary {
    pub retrieved: u64,
    pub files_written: u64,
    pub rows_inserted: u64,
    pub rows_failed: u64,
}

impl DumpSummary {
    fn record(&mut self, persisted: Persisted) {
        self.retrieved += 1;
        match persisted {
            Persisted::Files(paths) => self.files_written += paths.len() as u64,
            Persisted::Row { inserted: true } => self.rows_inserted += 1,
            Persisted::Row { inserted: false } => self.rows_failed += 1,
        }
    }
}

/// Pulls messages one at a time from the configured queue into `sink` until
/// `max_messages` have been retrieved or the queue reports empty.
///
/// Messages are persisted in fetch order under counters `0, 1, 2, ...`.
pub async fn dump_queue<S>(source: &mut S, sink: &mut Sink, config: &DumpConfig) -> Result<DumpSummary>
where
    S: MessageSource + ?Sized,
{
    let mut summary = DumpSummary::default();

    tracing::info!("Pulling messages from queue \"{}\"", config.queue);

    let mut counter = 0;
    while config.wants_more(counter) {
        let Some(message) = source.fetch(&config.queue, config.ack).await? else {
            tracing::info!("No more messages in queue");
            break;
        };

        let persisted = sink.persist(&message, counter).await?;
        summary.record(persisted);
        counter += 1;
    }

    Ok(summary)
}

/// Opens the sink, drains the queue into it and closes the sink, whatever the
/// outcome of the loop.
pub async fn run_with_source<S>(source: &mut S, config: &DumpConfig) -> Result<DumpSummary>
where
    S: MessageSource + ?Sized,
{
    let mut sink = Sink::open(config).await?;
    let result = dump_queue(source, &mut sink, config).await;
    sink.close().await;
    result
}

/// Drains the queue through `source` and then closes it, whatever the
/// outcome of the run.
pub async fn run_on<S>(source: &mut S, config: &DumpConfig) -> Result<DumpSummary>
where
    S: MessageSource + ?Sized,
{
    let result = run_with_source(source, config).await;

    source.close().await;
    tracing::info!("AMQP connection closed");

    if let Ok(summary) = &result {
        tracing::info!(
            "Dumped {} message(s): {} file(s) written, {} row(s) inserted, {} row(s) failed",
            summary.retrieved,
            summary.files_written,
            summary.rows_inserted,
            summary.rows_failed
        );
    }

    result
}

/// Runs a complete dump against the broker named in `config`.
///
/// Validation happens before any connection attempt.
pub async fn run(config: &DumpConfig) -> Result<DumpSummary> {
    validate_config(config)?;

    tracing::info!("Dialing \"{}\"", config.connection.redacted_uri());
    let mut source = AmqpSource::connect(&config.connection).await?;

    run_on(&mut source, config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AckMode, OutputMode};
    use crate::core::error::DumpError;
    use crate::core::message::Message;
    use crate::sink::file::{message_path, sidecar_path};

    use async_trait::async_trait;
    use sqlx::sqlite::SqliteConnectOptions;
    use sqlx::{ConnectOptions, Connection};
    use std::collections::VecDeque;
    use std::path::Path;

    #[derive(Default)]
    struct FakeSource {
        queue: VecDeque<Message>,
        fail_on_fetch: Option<usize>,
        fetches: usize,
        acks: Vec<AckMode>,
        closed: bool,
    }

    impl FakeSource {
        fn with_bodies(bodies: &[&str]) -> Self {
            Self {
                queue: bodies.iter().map(|b| Message::new(*b)).collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl MessageSource for FakeSource {
        async fn fetch(&mut self, _queue: &str, ack: AckMode) -> Result<Option<Message>> {
            self.acks.push(ack);
            self.fetches += 1;
            if self.fail_on_fetch == Some(self.fetches) {
                return Err(DumpError::Fetch("channel closed".to_string()));
            }
            Ok(self.queue.pop_front())
        }

        async fn close(&mut self) {
            self.closed = true;
        }
    }

    fn config(dir: &Path, max_messages: u64, output: OutputMode) -> DumpConfig {
        DumpConfig {
            queue: "orders".to_string(),
            max_messages,
            output_dir: dir.to_path_buf(),
            output,
            ..Default::default()
        }
    }

    fn files_in(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_stops_at_max_messages() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::with_bodies(&["a", "b", "c", "d"]);
        let config = config(dir.path(), 3, OutputMode::Files { full: false });

        let summary = run_with_source(&mut source, &config).await.unwrap();

        assert_eq!(summary.retrieved, 3);
        assert_eq!(summary.files_written, 3);
        assert_eq!(source.fetches, 3);
        assert_eq!(source.queue.len(), 1);
        for (counter, body) in ["a", "b", "c"].iter().enumerate() {
            let path = message_path(dir.path(), counter as u64);
            assert_eq!(std::fs::read(path).unwrap(), body.as_bytes());
        }
        assert_eq!(files_in(dir.path()), 3);
    }

    #[tokio::test]
    async fn test_unbounded_drains_queue() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::with_bodies(&["a", "b", "c", "d", "e"]);
        let config = config(dir.path(), 0, OutputMode::Files { full: false });

        let summary = run_with_source(&mut source, &config).await.unwrap();

        assert_eq!(summary.retrieved, 5);
        assert_eq!(source.fetches, 6);
        assert!(source.queue.is_empty());
        assert_eq!(std::fs::read(message_path(dir.path(), 4)).unwrap(), b"e");
    }

    #[tokio::test]
    async fn test_empty_queue_produces_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::default();
        let config = config(dir.path(), 10, OutputMode::Files { full: true });

        let summary = run_with_source(&mut source, &config).await.unwrap();

        assert_eq!(summary, DumpSummary::default());
        assert_eq!(files_in(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_full_mode_writes_two_files_per_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::with_bodies(&["a", "b"]);
        let config = config(dir.path(), 0, OutputMode::Files { full: true });

        let summary = run_with_source(&mut source, &config).await.unwrap();

        assert_eq!(summary.files_written, 4);
        assert!(sidecar_path(dir.path(), 0).exists());
        assert!(sidecar_path(dir.path(), 1).exists());
        assert_eq!(files_in(dir.path()), 4);
    }

    #[tokio::test]
    async fn test_fetch_error_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource {
            fail_on_fetch: Some(2),
            ..FakeSource::with_bodies(&["a", "b", "c"])
        };
        let config = config(dir.path(), 0, OutputMode::Files { full: false });

        let err = run_with_source(&mut source, &config).await.unwrap_err();

        assert!(matches!(err, DumpError::Fetch(_)));
        assert!(message_path(dir.path(), 0).exists());
        assert_eq!(files_in(dir.path()), 1);
    }

    #[tokio::test]
    async fn test_write_error_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::with_bodies(&["a", "b"]);
        let config = config(&dir.path().join("absent"), 0, OutputMode::Files { full: false });

        let err = run_with_source(&mut source, &config).await.unwrap_err();

        assert!(matches!(err, DumpError::Io { .. }));
        assert_eq!(source.fetches, 1);
    }

    #[tokio::test]
    async fn test_store_mode_inserts_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::with_bodies(&["a", "b"]);
        let config = config(dir.path(), 0, OutputMode::Store);

        let summary = run_with_source(&mut source, &config).await.unwrap();

        assert_eq!(summary.rows_inserted, 2);
        assert_eq!(summary.files_written, 0);
        assert!(dir.path().join("dump.db").exists());
        assert!(!message_path(dir.path(), 0).exists());
    }

    #[tokio::test]
    async fn test_ack_mode_is_fixed_for_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::with_bodies(&["a", "b"]);
        let config = DumpConfig {
            ack: AckMode::Auto,
            ..config(dir.path(), 0, OutputMode::Files { full: false })
        };

        run_with_source(&mut source, &config).await.unwrap();

        assert_eq!(source.acks, vec![AckMode::Auto; 3]);
    }

    #[tokio::test]
    async fn test_run_rejects_missing_queue_before_dialing() {
        let dir = tempfile::tempdir().unwrap();
        let config = DumpConfig {
            queue: String::new(),
            connection: crate::broker::AmqpConnectionConfig::new("amqp://nowhere.invalid:1/", false),
            ..config(dir.path(), 0, OutputMode::Files { full: false })
        };

        let err = run(&config).await.unwrap_err();
        assert!(matches!(err, DumpError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_source_closed_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::with_bodies(&["a"]);
        let config = config(dir.path(), 0, OutputMode::Files { full: false });

        let summary = run_on(&mut source, &config).await.unwrap();

        assert_eq!(summary.retrieved, 1);
        assert!(source.closed);
    }

    #[tokio::test]
    async fn test_source_closed_after_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource {
            fail_on_fetch: Some(1),
            ..FakeSource::with_bodies(&["a"])
        };
        let config = config(dir.path(), 0, OutputMode::Files { full: false });

        let err = run_on(&mut source, &config).await.unwrap_err();

        assert!(matches!(err, DumpError::Fetch(_)));
        assert!(source.closed);
    }

    #[tokio::test]
    async fn test_source_closed_after_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::with_bodies(&["a"]);
        let config = config(&dir.path().join("absent"), 0, OutputMode::Files { full: false });

        let err = run_on(&mut source, &config).await.unwrap_err();

        assert!(matches!(err, DumpError::Io { .. }));
        assert!(source.closed);
    }

    #[tokio::test]
    async fn test_source_closed_after_store_init_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::with_bodies(&["a"]);
        let config = config(&dir.path().join("absent"), 0, OutputMode::Store);

        let err = run_on(&mut source, &config).await.unwrap_err();

        assert!(matches!(err, DumpError::StoreInit(_)));
        assert_eq!(source.fetches, 0);
        assert!(source.closed);
    }

    #[tokio::test]
    async fn test_store_insert_failures_do_not_stop_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::with_bodies(&["a", "b"]);
        let config = config(dir.path(), 0, OutputMode::Store);

        let mut sink = Sink::open(&config).await.unwrap();

        let mut other = SqliteConnectOptions::new()
            .filename(dir.path().join("dump.db"))
            .connect()
            .await
            .unwrap();
        sqlx::query("DROP TABLE dump").execute(&mut other).await.unwrap();
        other.close().await.unwrap();

        let summary = dump_queue(&mut source, &mut sink, &config).await;
        sink.close().await;

        assert_eq!(
            summary.unwrap(),
            DumpSummary {
                retrieved: 2,
                files_written: 0,
                rows_inserted: 0,
                rows_failed: 2,
            }
        );
        assert!(source.queue.is_empty());
    }
}
