//! Message shapes exchanged with live sessions.
//!
//! Messages are plain JSON objects distinguished by their fields, not by a tag:
//!
//! ```text
//! client -> server  {"role": "ui"}                                   register
//! server -> client  {"role": "ui"}                                   registered
//! client -> server  {"clientId": "c1"}                               watch
//! server -> client  {"correlationId", "clientId", "request", "defaultResponse"}
//! client -> server  {"correlationId", "response": {"statusCode", "headers", "body", "delay"}}
//! ```

use crate::registry::ResponseVariant;
use crate::request::NormalizedRequest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// The only role a session may register as.
pub const UI_ROLE: &str = "ui";

/// Status, headers and body of a response the adapter will write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub status_code: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Value,
}

impl ResponseEnvelope {
    /// The default response a matched variant produces.
    pub fn from_variant(variant: &ResponseVariant) -> Self {
        Self {
            status_code: variant.status_code,
            headers: render_headers(&variant.response_header),
            body: variant.response.clone(),
        }
    }
}

/// Header values may be any JSON value; non-strings are written as JSON text.
pub fn render_headers(raw: &Map<String, Value>) -> BTreeMap<String, String> {
    raw.iter()
        .map(|(name, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), rendered)
        })
        .collect()
}

/// Response supplied by an operator in an override command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideResponse {
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub headers: Map<String, Value>,
    #[serde(default)]
    pub body: Option<Value>,
    /// Milliseconds to wait before writing.
    #[serde(default)]
    pub delay: u64,
}

impl OverrideResponse {
    pub fn new(status_code: u16, body: Value) -> Self {
        Self {
            status_code: Some(status_code),
            headers: Map::new(),
            body: Some(body),
            delay: 0,
        }
    }

    /// Reject status codes that cannot be written.
    pub fn validate(&self) -> Result<(), String> {
        match self.status_code {
            Some(code) if !(100..=599).contains(&code) => {
                Err(format!("statusCode {code} is not a valid HTTP status"))
            }
            _ => Ok(()),
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay)
    }

    /// Status defaults to 200 and body to `{}`.
    pub fn to_envelope(&self) -> ResponseEnvelope {
        ResponseEnvelope {
            status_code: self.status_code.unwrap_or(200),
            headers: render_headers(&self.headers),
            body: self
                .body
                .clone()
                .unwrap_or_else(|| Value::Object(Map::new())),
        }
    }
}

/// Event fanned out to every watcher of a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptEvent {
    pub correlation_id: String,
    pub client_id: String,
    pub request: NormalizedRequest,
    pub default_response: ResponseEnvelope,
}

/// Inbound messages from a live session.
///
/// Variant order matters for untagged decoding: the most specific shape first.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Override {
        correlation_id: String,
        response: OverrideResponse,
    },
    #[serde(rename_all = "camelCase")]
    Watch { client_id: String },
    Register { role: String },
}

/// Outbound messages to a live session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Registered { role: String },
    Intercept(InterceptEvent),
}

/// Strict decoding target for anything carrying a `correlationId`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OverrideCommand {
    correlation_id: String,
    response: OverrideResponse,
}

impl ClientMessage {
    /// Decode one inbound line. A message with a `correlationId` is an override
    /// and never falls through to the watch or register shapes.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(line)?;
        if value.get("correlationId").is_some() {
            let command: OverrideCommand = serde_json::from_value(value)?;
            return Ok(ClientMessage::Override {
                correlation_id: command.correlation_id,
                response: command.response,
            });
        }
        serde_json::from_value(value)
    }
}
