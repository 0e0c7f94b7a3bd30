//! Management REST API for mock endpoints.
//!
//! This module provides:
//! - Creating, replacing, deleting, and listing mock endpoints
//! - Appending response variants to an existing endpoint
//! - Health, metrics, and pending-interception endpoints
//!
//! The API listens on a configurable port (default: 2525).

mod handlers;
mod router;
mod server;
mod types;

pub use router::route_request;
pub use server::AdminApiServer;
pub use types::{ErrorDetail, ErrorResponse};

use crate::live::InterceptionCoordinator;
use crate::registry::EndpointRegistry;
use std::sync::Arc;

/// State shared by all management routes.
pub struct AdminState {
    pub registry: Arc<EndpointRegistry>,
    pub coordinator: Arc<InterceptionCoordinator>,
}

impl AdminState {
    pub fn new(registry: Arc<EndpointRegistry>, coordinator: Arc<InterceptionCoordinator>) -> Self {
        Self {
            registry,
            coordinator,
        }
    }
}
