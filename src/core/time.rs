use chrono::{DateTime, SecondsFormat, Utc};

fn utc(secs: u64) -> Option<DateTime<Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
}

/// Renders an AMQP timestamp (seconds since the epoch) as
/// `YYYY-MM-DD HH:MM:SS +0000 UTC`.
pub fn format_timestamp(secs: u64) -> String {
    match utc(secs) {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S +0000 UTC").to_string(),
        None => {
            tracing::warn!("Timestamp {secs} is out of range");
            secs.to_string()
        }
    }
}

/// Renders an AMQP timestamp header value as RFC 3339.
pub fn format_rfc3339(secs: u64) -> String {
    utc(secs)
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| secs.to_string())
}
