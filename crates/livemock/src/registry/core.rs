//! EndpointRegistry - the owned catalog of mock endpoints.
//!
//! Readers take a cheap snapshot (`Arc<Vec<Endpoint>>`) and never observe a
//! half-applied change. Writers are serialized by `write_lock`, build the next
//! catalog, persist it, and only then publish it to readers.

use super::store::{CatalogStore, MemoryStore};
use super::types::{
    normalize_project, Endpoint, EndpointKey, EndpointPath, MatchedResponse, NewEndpoint,
    ProjectSummary, RegistryError, ResponseVariant, DEFAULT_PROJECT,
};
use super::validation::{validate_endpoint, validate_variant};
use crate::matcher::find_match;
use crate::request::NormalizedRequest;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub struct EndpointRegistry {
    endpoints: RwLock<Arc<Vec<Endpoint>>>,
    write_lock: Mutex<()>,
    store: Arc<dyn CatalogStore>,
    default_project: String,
}

impl EndpointRegistry {
    /// Open a registry over `store`, loading whatever it holds.
    pub fn open(store: Arc<dyn CatalogStore>) -> Result<Self, RegistryError> {
        Self::open_with_default_project(store, DEFAULT_PROJECT)
    }

    /// Open a registry whose project-less endpoints belong to `default_project`.
    /// Loaded records without a project are assigned to it as well.
    pub fn open_with_default_project(
        store: Arc<dyn CatalogStore>,
        default_project: &str,
    ) -> Result<Self, RegistryError> {
        let default_project = normalize_project(default_project, DEFAULT_PROJECT);
        let mut endpoints = store.load()?;
        for endpoint in endpoints.iter_mut() {
            endpoint.project = normalize_project(&endpoint.project, &default_project);
        }
        Ok(Self {
            endpoints: RwLock::new(Arc::new(endpoints)),
            write_lock: Mutex::new(()),
            store,
            default_project,
        })
    }

    /// Registry backed by a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self {
            endpoints: RwLock::new(Arc::new(Vec::new())),
            write_lock: Mutex::new(()),
            store: Arc::new(MemoryStore::new()),
            default_project: DEFAULT_PROJECT.to_string(),
        }
    }

    pub fn default_project(&self) -> &str {
        &self.default_project
    }

    /// Resolve an optional project name the way stored endpoints are keyed.
    pub fn resolve_project(&self, project: Option<&str>) -> String {
        normalize_project(project.unwrap_or(""), &self.default_project)
    }

    /// Current catalog snapshot.
    pub fn snapshot(&self) -> Arc<Vec<Endpoint>> {
        Arc::clone(&self.endpoints.read())
    }

    pub fn len(&self) -> usize {
        self.endpoints.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persist `next` and make it visible to readers.
    fn commit(&self, next: Vec<Endpoint>) -> Result<(), RegistryError> {
        self.store.save(&next)?;
        *self.endpoints.write() = Arc::new(next);
        Ok(())
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Register a new endpoint. Fails with `Conflict` on a duplicate identity.
    pub fn add(&self, input: NewEndpoint) -> Result<Endpoint, RegistryError> {
        let input = input.sanitized(&self.default_project);
        validate_endpoint(&input)?;
        let key = input.key();

        let _guard = self.write_lock.lock();
        let current = self.snapshot();
        if current
            .iter()
            .any(|e| e.has_identity(&key.method, &key.path, &key.project))
        {
            return Err(RegistryError::Conflict(key));
        }

        let now = Utc::now();
        let endpoint = Endpoint {
            id: Uuid::new_v4().to_string(),
            project: key.project,
            method: key.method,
            path: key.path,
            responses: input.responses,
            created_at: now,
            updated_at: now,
        };

        let mut next = current.as_ref().clone();
        next.push(endpoint.clone());
        self.commit(next)?;

        info!(
            id = %endpoint.id,
            project = %endpoint.project,
            method = %endpoint.method,
            path = %endpoint.path,
            "Mock API created"
        );
        Ok(endpoint)
    }

    /// Overwrite endpoint `id` in place, keeping its id and creation time.
    pub fn replace(&self, id: &str, input: NewEndpoint) -> Result<Endpoint, RegistryError> {
        let input = input.sanitized(&self.default_project);
        validate_endpoint(&input)?;
        let key = input.key();

        let _guard = self.write_lock.lock();
        let current = self.snapshot();
        let index = current
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        if current
            .iter()
            .any(|e| e.id != id && e.has_identity(&key.method, &key.path, &key.project))
        {
            return Err(RegistryError::Conflict(key));
        }

        let existing = &current[index];
        let updated = Endpoint {
            id: existing.id.clone(),
            project: key.project,
            method: key.method,
            path: key.path,
            responses: input.responses,
            created_at: existing.created_at,
            updated_at: Utc::now(),
        };

        let mut next = current.as_ref().clone();
        next[index] = updated.clone();
        self.commit(next)?;

        info!(id = %updated.id, "Mock API updated");
        Ok(updated)
    }

    /// Delete endpoint `id`. The whole catalog is backed up first.
    pub fn remove(&self, id: &str) -> Result<Endpoint, RegistryError> {
        let _guard = self.write_lock.lock();
        let current = self.snapshot();
        let index = current
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        let backup = self.store.backup(&current)?;

        let mut next = current.as_ref().clone();
        let removed = next.remove(index);
        self.commit(next)?;

        info!(id = %removed.id, backup = %backup, "Mock API deleted");
        Ok(removed)
    }

    /// Append a variant to the endpoint with the given identity.
    pub fn append_response_variant(
        &self,
        key: &EndpointKey,
        variant: ResponseVariant,
    ) -> Result<Endpoint, RegistryError> {
        validate_variant(&variant)?;

        let _guard = self.write_lock.lock();
        let current = self.snapshot();
        let index = current
            .iter()
            .position(|e| e.has_identity(&key.method, &key.path, &key.project))
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))?;

        let mut updated = current[index].clone();
        if variant.is_fallback() && updated.responses.iter().any(ResponseVariant::is_fallback) {
            return Err(RegistryError::Validation(format!(
                "{key} already has a default response; the new response needs a 'request' matcher"
            )));
        }
        updated.responses.push(variant);
        updated.updated_at = Utc::now();

        let mut next = current.as_ref().clone();
        next[index] = updated.clone();
        self.commit(next)?;

        info!(id = %updated.id, responses = updated.responses.len(), "Response appended");
        Ok(updated)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// All endpoints, optionally restricted to one project.
    pub fn list(&self, project: Option<&str>) -> Vec<Endpoint> {
        self.snapshot()
            .iter()
            .filter(|e| project.is_none_or(|p| e.project == p))
            .cloned()
            .collect()
    }

    pub fn list_paths(&self, project: Option<&str>) -> Vec<EndpointPath> {
        self.list(project)
            .into_iter()
            .map(|e| EndpointPath {
                id: e.id,
                path: e.path,
            })
            .collect()
    }

    /// Distinct project names in first-seen order.
    pub fn projects(&self) -> Vec<ProjectSummary> {
        let mut names: Vec<String> = Vec::new();
        for endpoint in self.snapshot().iter() {
            if !names.contains(&endpoint.project) {
                names.push(endpoint.project.clone());
            }
        }
        names
            .into_iter()
            .map(|project_name| ProjectSummary { project_name })
            .collect()
    }

    pub fn get(&self, id: &str) -> Result<Endpoint, RegistryError> {
        self.snapshot()
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// First endpoint with this path and project, whatever its method.
    pub fn find_by_path(&self, path: &str, project: &str) -> Option<Endpoint> {
        self.snapshot()
            .iter()
            .find(|e| e.path == path && e.project == project)
            .cloned()
    }

    /// Run the matcher against the current snapshot.
    pub fn find_match(&self, request: &NormalizedRequest) -> Option<MatchedResponse> {
        let snapshot = self.snapshot();
        let found = find_match(&snapshot, request)?;
        debug!(
            endpoint_id = %found.endpoint.id,
            variant = found.variant_index,
            "Matched mock response"
        );
        Some(MatchedResponse {
            endpoint_id: found.endpoint.id.clone(),
            variant_index: found.variant_index,
            variant: found.variant.clone(),
        })
    }
}
