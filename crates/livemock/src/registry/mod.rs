//! Endpoint registry: the catalog of mock endpoints and their canned responses.
//!
//! ## Module Structure
//!
//! - `types`: catalog records, operation payloads, errors
//! - `validation`: shape checks for endpoints and variants
//! - `store`: `CatalogStore` trait with JSON-file and in-memory backends
//! - `core`: `EndpointRegistry`, the owned, concurrency-safe catalog

mod core;
mod store;
mod types;
mod validation;


pub use self::core::EndpointRegistry;
pub use store::{CatalogStore, JsonFileStore, MemoryStore};
pub use types::{
    normalize_method, normalize_path, normalize_project, AppendResponseRequest, Endpoint,
    EndpointKey, EndpointPath, MatchedResponse, NewEndpoint, ProjectSummary, RegistryError,
    ReplaceEndpointRequest, ResponseVariant, StoreError, DEFAULT_PROJECT,
};
pub use validation::{validate_endpoint, validate_variant, SUPPORTED_METHODS};
