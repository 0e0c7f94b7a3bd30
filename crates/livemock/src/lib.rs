//! Livemock: a programmable HTTP mock server with live request interception.
//!
//! ## Module Structure
//!
//! - `registry`: persistent catalog of mock endpoints and their response variants
//! - `matcher`: endpoint lookup and structural body matching
//! - `request`: normalization of incoming HTTP requests
//! - `live`: notification channel, interception coordinator, live session server
//! - `server`: mock listener that serves the catalog
//! - `admin_api`: management REST API
//! - `config`: server configuration
//! - `metrics`: Prometheus metrics

pub mod admin_api;
pub mod config;
pub mod live;
pub mod matcher;
pub mod metrics;
pub mod registry;
pub mod request;
pub mod server;
