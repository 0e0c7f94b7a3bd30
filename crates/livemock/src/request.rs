//! Normalized view of an inbound mock request.
//!
//! Built once per request by the HTTP adapter and immutable afterwards. It holds no
//! transport handles, so it can be cloned into pending interceptions and serialized
//! onto the live channel.

use crate::registry::{normalize_method, DEFAULT_PROJECT};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRequest {
    pub method: String,
    pub path: String,
    pub project: String,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: Value,
}

impl NormalizedRequest {
    /// Minimal request for the given identity, with no headers, query or body.
    pub fn new(method: &str, path: &str, project: &str) -> Self {
        Self {
            method: normalize_method(method),
            path: path.to_string(),
            project: project.to_string(),
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
            body: Value::Null,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }
}

/// How the adapter derives project and client identity from headers.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub project_header: String,
    pub client_id_header: String,
    pub default_project: String,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            project_header: "project-name".to_string(),
            client_id_header: "x-client-id".to_string(),
            default_project: DEFAULT_PROJECT.to_string(),
        }
    }
}

impl NormalizeOptions {
    /// Build the normalized request and the client identifier, if any.
    ///
    /// `headers` must already have lower-cased names.
    pub fn normalize(
        &self,
        method: &str,
        path: &str,
        raw_query: Option<&str>,
        headers: BTreeMap<String, String>,
        raw_body: &[u8],
    ) -> (NormalizedRequest, Option<String>) {
        let project = header_value(&headers, &self.project_header)
            .unwrap_or(&self.default_project)
            .to_string();
        let client_id = header_value(&headers, &self.client_id_header).map(str::to_string);
        let query = raw_query.map(parse_query_string).unwrap_or_default();
        let body = parse_body(raw_body, &query);

        let request = NormalizedRequest {
            method: normalize_method(method),
            path: path.to_string(),
            project,
            headers,
            query,
            body,
        };
        (request, client_id)
    }
}

fn header_value<'a>(headers: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .get(&name.to_ascii_lowercase())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Parse a raw query string, percent-decoding keys and values.
pub fn parse_query_string(query: &str) -> BTreeMap<String, String> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

/// JSON bodies are parsed, other text is kept as a string. An empty body falls back
/// to the query parameters so GET-style requests can be discriminated too.
fn parse_body(raw: &[u8], query: &BTreeMap<String, String>) -> Value {
    if raw.iter().all(u8::is_ascii_whitespace) {
        if query.is_empty() {
            return Value::Null;
        }
        let object: Map<String, Value> = query
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        return Value::Object(object);
    }

    serde_json::from_slice(raw)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(raw).into_owned()))
}
