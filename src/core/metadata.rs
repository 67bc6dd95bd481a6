//! Metadata Normalization
//!
//! Flattens a message's transport properties into a stable key-value map and
//! wraps it, together with the raw headers, into the envelope that both sinks
//! persist as indented JSON:
//!
//! ```json
//! {
//!   "headers": { "x-retries": 2 },
//!   "properties": { "content_type": "application/json", "routing_key": "orders" }
//! }
//! ```

use super::error::Result;
use super::message::{Headers, Message};
use super::time::format_timestamp;

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Normalized transport properties, keyed by property name.
///
/// Never holds an empty string value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<&'static str, Value>);

#[cfg(test)]
impl Properties {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }
}

impl Properties {
    fn insert_text(&mut self, key: &'static str, value: &str) {
        if !value.is_empty() {
            self.0.insert(key, Value::from(value));
        }
    }

    fn insert_number(&mut self, key: &'static str, value: Option<u8>) {
        if let Some(value) = value {
            self.0.insert(key, Value::from(value));
        }
    }
}

/// Extracts the transport properties of `msg`, omitting unset fields.
pub fn normalize(msg: &Message) -> Properties {
    let mut props = Properties::default();

    props.insert_text("app_id", &msg.app_id);
    props.insert_text("content_encoding", &msg.content_encoding);
    props.insert_text("content_type", &msg.content_type);
    props.insert_text("correlation_id", &msg.correlation_id);
    props.insert_number("delivery_mode", msg.delivery_mode);
    props.insert_text("expiration", &msg.expiration);
    props.insert_text("message_id", &msg.message_id);
    props.insert_number("priority", msg.priority);
    props.insert_text("reply_to", &msg.reply_to);
    props.insert_text("type", &msg.kind);
    props.insert_text("user_id", &msg.user_id);
    props.insert_text("exchange", &msg.exchange);
    props.insert_text("routing_key", &msg.routing_key);

    if let Some(secs) = msg.timestamp.filter(|secs| *secs != 0) {
        props.insert_text("timestamp", &format_timestamp(secs));
    }

    props
}

/// The persisted metadata of one message.
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub headers: &'a Headers,
    pub properties: Properties,
}

impl<'a> Envelope<'a> {
    pub fn from_message(msg: &'a Message) -> Self {
        Self {
            headers: &msg.headers,
            properties: normalize(msg),
        }
    }

    /// Serialises the envelope as two-space indented JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
