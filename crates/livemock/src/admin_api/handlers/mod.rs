//! Route handlers for the management API.

pub mod endpoints;
pub mod system;
