use super::MessageSource;
use crate::config::AckMode;
use crate::core::error::{DumpError, Result};
use crate::core::message::{HeaderValue, Headers, Message};

use async_trait::async_trait;
use lapin::message::Delivery;
use lapin::options::BasicGetOptions;
use lapin::tcp::{HandshakeResult, TcpStream};
use lapin::types::{AMQPValue, FieldTable, ShortString};
use lapin::uri::{AMQPScheme, AMQPUri};
use lapin::{Channel, Connection, ConnectionProperties};
use native_tls::TlsConnector;

/// How the connection to the broker is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Plain,
    Tls,
    /// TLS without certificate or host name verification
    InsecureTls,
}

/// AMQP connection settings.
#[derive(Debug, Clone)]
pub struct AmqpConnectionConfig {
    pub uri: String,
    pub insecure_tls: bool,
}

impl AmqpConnectionConfig {
    pub fn new(uri: &str, insecure_tls: bool) -> Self {
        Self {
            uri: uri.to_string(),
            insecure_tls,
        }
    }

    pub fn parse_uri(&self) -> Result<AMQPUri> {
        self.uri
            .parse::<AMQPUri>()
            .map_err(|e| DumpError::connection("Dial", format!("invalid URI: {e}")))
    }

    /// Picks the transport for `uri`. `insecure_tls` only matters for `amqps`.
    pub fn transport(&self, uri: &AMQPUri) -> Transport {
        match uri.scheme {
            AMQPScheme::AMQP => Transport::Plain,
            AMQPScheme::AMQPS if self.insecure_tls => Transport::InsecureTls,
            AMQPScheme::AMQPS => Transport::Tls,
        }
    }

    /// The URI with its password masked, for logging.
    pub fn redacted_uri(&self) -> String {
        let Some(scheme_end) = self.uri.find("://").map(|i| i + 3) else {
            return self.uri.clone();
        };
        let rest = &self.uri[scheme_end..];
        let Some(at) = rest.find('@') else {
            return self.uri.clone();
        };
        match rest[..at].find(':') {
            Some(colon) => format!(
                "{}{}:****{}",
                &self.uri[..scheme_end],
                &rest[..colon],
                &rest[at..]
            ),
            None => self.uri.clone(),
        }
    }
}

fn insecure_connector() -> Result<TlsConnector> {
    TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .map_err(|e| DumpError::connection("Dial", e))
}

fn connect_insecure(uri: &AMQPUri, connector: &TlsConnector) -> HandshakeResult {
    let addr = format!("{}:{}", uri.authority.host, uri.authority.port);
    tracing::debug!("Opening unverified TLS session to {addr}");
    let stream = TcpStream::connect(addr)?;
    stream.into_native_tls(connector, &uri.authority.host)
}

/// A single AMQP connection and the channel used to pull messages.
pub struct AmqpSource {
    connection: Connection,
    channel: Channel,
}

impl AmqpSource {
    /// Dials the broker and opens a channel. The connection is closed again
    /// if the channel cannot be opened.
    pub async fn connect(config: &AmqpConnectionConfig) -> Result<Self> {
        let uri = config.parse_uri()?;
        let properties = ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio);

        let connection = match config.transport(&uri) {
            Transport::InsecureTls => {
                let connector = insecure_connector()?;
                Connection::connector(
                    uri,
                    Box::new(move |uri| connect_insecure(uri, &connector)),
                    properties,
                )
                .await
            }
            Transport::Plain | Transport::Tls => Connection::connect_uri(uri, properties).await,
        }
        .map_err(|e| DumpError::connection("Dial", e))?;

        let channel = match connection.create_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                if let Err(close_err) = connection.close(0, "channel open failed").await {
                    tracing::warn!("Failed to close AMQP connection: {close_err}");
                }
                return Err(DumpError::connection("Channel", e));
            }
        };

        Ok(Self { connection, channel })
    }
}

#[async_trait]
impl MessageSource for AmqpSource {
    async fn fetch(&mut self, queue: &str, ack: AckMode) -> Result<Option<Message>> {
        let options = BasicGetOptions {
            no_ack: ack.is_auto(),
        };

        let fetched = self
            .channel
            .basic_get(queue, options)
            .await
            .map_err(|e| DumpError::Fetch(e.to_string()))?;

        Ok(fetched.map(|get| {
            tracing::debug!("{} message(s) left in '{}'", get.message_count, queue);
            message_from_delivery(&get.delivery)
        }))
    }

    async fn close(&mut self) {
        if let Err(e) = self.channel.close(200, "Bye").await {
            tracing::debug!("AMQP channel close: {e}");
        }
        if let Err(e) = self.connection.close(200, "Bye").await {
            tracing::warn!("AMQP connection close: {e}");
        }
    }
}

fn text(value: &Option<ShortString>) -> String {
    value
        .as_ref()
        .map(|s| s.as_str().to_owned())
        .unwrap_or_default()
}

fn message_from_delivery(delivery: &Delivery) -> Message {
    let props = &delivery.properties;

    Message {
        body: delivery.data.clone(),
        app_id: text(props.app_id()),
        content_encoding: text(props.content_encoding()),
        content_type: text(props.content_type()),
        correlation_id: text(props.correlation_id()),
        delivery_mode: *props.delivery_mode(),
        expiration: text(props.expiration()),
        message_id: text(props.message_id()),
        priority: *props.priority(),
        reply_to: text(props.reply_to()),
        kind: text(props.kind()),
        user_id: text(props.user_id()),
        exchange: delivery.exchange.as_str().to_owned(),
        routing_key: delivery.routing_key.as_str().to_owned(),
        timestamp: *props.timestamp(),
        headers: props.headers().as_ref().map(header_table).unwrap_or_default(),
    }
}

fn header_table(table: &FieldTable) -> Headers {
    table
        .inner()
        .iter()
        .map(|(key, value)| (key.as_str().to_owned(), header_value(value)))
        .collect()
}

fn header_value(value: &AMQPValue) -> HeaderValue {
    match value {
        AMQPValue::Boolean(b) => HeaderValue::Bool(*b),
        AMQPValue::ShortShortInt(v) => HeaderValue::Int(i64::from(*v)),
        AMQPValue::ShortShortUInt(v) => HeaderValue::UInt(u64::from(*v)),
        AMQPValue::ShortInt(v) => HeaderValue::Int(i64::from(*v)),
        AMQPValue::ShortUInt(v) => HeaderValue::UInt(u64::from(*v)),
        AMQPValue::LongInt(v) => HeaderValue::Int(i64::from(*v)),
        AMQPValue::LongUInt(v) => HeaderValue::UInt(u64::from(*v)),
        AMQPValue::LongLongInt(v) => HeaderValue::Int(*v),
        AMQPValue::Float(v) => HeaderValue::Float(f64::from(*v)),
        AMQPValue::Double(v) => HeaderValue::Float(*v),
        AMQPValue::DecimalValue(d) => HeaderValue::Decimal {
            scale: d.scale,
            value: d.value,
        },
        AMQPValue::ShortString(s) => HeaderValue::String(s.as_str().to_owned()),
        AMQPValue::LongString(s) => {
            HeaderValue::String(String::from_utf8_lossy(s.as_bytes()).into_owned())
        }
        AMQPValue::FieldArray(items) => {
            HeaderValue::Array(items.as_slice().iter().map(header_value).collect())
        }
        AMQPValue::Timestamp(secs) => HeaderValue::Timestamp(*secs),
        AMQPValue::FieldTable(table) => HeaderValue::Table(header_table(table)),
        AMQPValue::ByteArray(bytes) => HeaderValue::Bytes(bytes.as_slice().to_vec()),
        AMQPValue::Void => HeaderValue::Null,
    }
}
