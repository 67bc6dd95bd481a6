use super::time::format_rfc3339;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

pub type Headers = BTreeMap<String, HeaderValue>;

/// A user-defined header value as carried on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Decimal { scale: u8, value: u32 },
    String(String),
    Bytes(Vec<u8>),
    Timestamp(u64),
    Array(Vec<HeaderValue>),
    Table(Headers),
}

impl Serialize for HeaderValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            HeaderValue::Null => serializer.serialize_unit(),
            HeaderValue::Bool(b) => serializer.serialize_bool(*b),
            HeaderValue::Int(i) => serializer.serialize_i64(*i),
            HeaderValue::UInt(u) => serializer.serialize_u64(*u),
            HeaderValue::Float(f) => serializer.serialize_f64(*f),
            HeaderValue::Decimal { scale, value } => {
                serializer.serialize_f64(f64::from(*value) / 10f64.powi(i32::from(*scale)))
            }
            HeaderValue::String(s) => serializer.serialize_str(s),
            HeaderValue::Bytes(bytes) => serializer.serialize_str(&BASE64.encode(bytes)),
            HeaderValue::Timestamp(secs) => serializer.serialize_str(&format_rfc3339(*secs)),
            HeaderValue::Array(items) => serializer.collect_seq(items),
            HeaderValue::Table(table) => serializer.collect_map(table),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::String(value.to_owned())
    }
}

/// A message retrieved from a queue: its body plus broker-assigned metadata.
///
/// String properties the broker did not set are empty; numeric properties and
/// the timestamp are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub body: Vec<u8>,
    pub app_id: String,
    pub content_encoding: String,
    pub content_type: String,
    pub correlation_id: String,
    pub delivery_mode: Option<u8>,
    pub expiration: String,
    pub message_id: String,
    pub priority: Option<u8>,
    pub reply_to: String,
    pub kind: String,
    pub user_id: String,
    pub exchange: String,
    pub routing_key: String,
    pub timestamp: Option<u64>,
    pub headers: Headers,
}

#[cfg(test)]
impl Message {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }
}
