//! Type definitions for the endpoint registry.
//!
//! The serialized shape of [`Endpoint`] and [`ResponseVariant`] is the persisted
//! catalog format, so field names and defaults here are part of the on-disk contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Project assigned to endpoints that do not name one, unless the registry
/// is opened with another default.
pub const DEFAULT_PROJECT: &str = "KP";

fn default_status_code() -> u16 {
    200
}

// ============================================================================
// Catalog records
// ============================================================================

/// One canned response for an endpoint, optionally gated by a body matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseVariant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Body the inbound request must structurally equal for this variant to apply.
    /// A variant without one is the endpoint's fallback.
    #[serde(rename = "request", default, skip_serializing_if = "Option::is_none")]
    pub request_matcher: Option<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub response_header: Map<String, Value>,
    #[serde(default)]
    pub response: Value,
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    /// Milliseconds to hold the response before writing it.
    #[serde(default)]
    pub delay: u64,
}

impl ResponseVariant {
    /// Create a fallback variant with the given status and body.
    pub fn new(status_code: u16, response: Value) -> Self {
        Self {
            name: None,
            description: None,
            request_matcher: None,
            response_header: Map::new(),
            response,
            status_code,
            delay: 0,
        }
    }

    /// Gate this variant on a request body.
    pub fn with_request_matcher(mut self, matcher: Value) -> Self {
        self.request_matcher = Some(matcher);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.response_header.insert(name.into(), value.into());
        self
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay = delay_ms;
        self
    }

    pub fn is_fallback(&self) -> bool {
        self.request_matcher.is_none()
    }
}

/// A registered mock route: unique by (method, path, project).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub id: String,
    /// Empty only in a freshly loaded document; the registry fills it with its
    /// default project on open.
    #[serde(default)]
    pub project: String,
    pub method: String,
    pub path: String,
    pub responses: Vec<ResponseVariant>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Endpoint {
    pub fn key(&self) -> EndpointKey {
        EndpointKey {
            method: self.method.clone(),
            path: self.path.clone(),
            project: self.project.clone(),
        }
    }

    /// Whether this endpoint answers to the given identity tuple.
    pub fn has_identity(&self, method: &str, path: &str, project: &str) -> bool {
        self.method == method && self.path == path && self.project == project
    }
}

/// Identity tuple of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    pub method: String,
    pub path: String,
    pub project: String,
}

impl EndpointKey {
    /// Build a key, normalizing method and path the same way stored endpoints are.
    /// `project` must already be resolved.
    pub fn new(method: &str, path: &str, project: &str) -> Self {
        Self {
            method: normalize_method(method),
            path: normalize_path(path),
            project: project.trim().to_string(),
        }
    }
}

impl std::fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} (project {})", self.method, self.path, self.project)
    }
}

// ============================================================================
// Operation inputs and projections
// ============================================================================

/// Payload for creating or replacing an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEndpoint {
    #[serde(default)]
    pub project: Option<String>,
    pub method: String,
    pub path: String,
    pub responses: Vec<ResponseVariant>,
}

impl NewEndpoint {
    pub fn new(method: &str, path: &str, project: &str, responses: Vec<ResponseVariant>) -> Self {
        Self {
            project: Some(project.to_string()),
            method: method.to_string(),
            path: path.to_string(),
            responses,
        }
    }

    /// Trim and normalize identity fields; a missing or empty project becomes
    /// `default_project`.
    pub fn sanitized(mut self, default_project: &str) -> Self {
        self.method = normalize_method(&self.method);
        self.path = normalize_path(&self.path);
        self.project = Some(normalize_project(
            self.project.as_deref().unwrap_or(""),
            default_project,
        ));
        self
    }

    pub fn key(&self) -> EndpointKey {
        EndpointKey::new(
            &self.method,
            &self.path,
            self.project.as_deref().unwrap_or(""),
        )
    }
}

/// Replace request carrying the target id in the body.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceEndpointRequest {
    pub id: String,
    #[serde(flatten)]
    pub endpoint: NewEndpoint,
}

/// Append-variant request. `method` may be omitted, in which case the first
/// endpoint with the given path and project is the target.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendResponseRequest {
    pub api_path: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    pub new_response: ResponseVariant,
}

/// Id and path of an endpoint, for compact listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointPath {
    pub id: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub project_name: String,
}

/// The variant selected for a request, with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedResponse {
    pub endpoint_id: String,
    pub variant_index: usize,
    pub variant: ResponseVariant,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors from the catalog backing store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid catalog document {path}: {source}")]
    Format {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Mock API already exists: {0}")]
    Conflict(EndpointKey),
    #[error("Mock API not found: {0}")]
    NotFound(String),
    #[error("Invalid mock API: {0}")]
    Validation(String),
    #[error("Failed to persist mock catalog: {0}")]
    Storage(#[from] StoreError),
}

// ============================================================================
// Normalization helpers
// ============================================================================

pub fn normalize_method(method: &str) -> String {
    method.trim().to_ascii_uppercase()
}

/// Trim a path and make sure it is rooted.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() || trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

pub fn normalize_project(project: &str, default_project: &str) -> String {
    let trimmed = project.trim();
    if trimmed.is_empty() {
        default_project.trim().to_string()
    } else {
        trimmed.to_string()
    }
}
