//! Mock endpoint management handlers.

use crate::admin_api::types::{
    collect_body, error_response, json_response, registry_error_response, ProjectQuery,
};
use crate::registry::{
    normalize_path, AppendResponseRequest, EndpointKey, EndpointRegistry, NewEndpoint,
    RegistryError, ReplaceEndpointRequest,
};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::sync::Arc;

/// Read and decode a JSON request body, or produce the 400 response to send.
async fn parse_json<T, B>(req: Request<B>, what: &str) -> Result<T, Response<Full<Bytes>>>
where
    T: DeserializeOwned,
    B: Body,
    B::Error: Display,
{
    let body = collect_body(req)
        .await
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, &e))?;
    serde_json::from_slice(&body).map_err(|e| {
        error_response(StatusCode::BAD_REQUEST, &format!("Invalid {what} JSON: {e}"))
    })
}

/// POST /mock - Create an endpoint
pub async fn handle_create<B>(req: Request<B>, registry: Arc<EndpointRegistry>) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Display,
{
    let input: NewEndpoint = match parse_json(req, "mock").await {
        Ok(input) => input,
        Err(response) => return response,
    };

    match registry.add(input) {
        Ok(endpoint) => json_response(StatusCode::CREATED, &endpoint),
        Err(e) => registry_error_response(&e),
    }
}

/// PUT /mock/:id - Replace an endpoint
pub async fn handle_replace<B>(
    id: &str,
    req: Request<B>,
    registry: Arc<EndpointRegistry>,
) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Display,
{
    let input: NewEndpoint = match parse_json(req, "mock").await {
        Ok(input) => input,
        Err(response) => return response,
    };

    match registry.replace(id, input) {
        Ok(endpoint) => json_response(StatusCode::OK, &endpoint),
        Err(e) => registry_error_response(&e),
    }
}

/// PUT /mock - Replace an endpoint whose id is carried in the body
pub async fn handle_replace_from_body<B>(
    req: Request<B>,
    registry: Arc<EndpointRegistry>,
) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Display,
{
    let input: ReplaceEndpointRequest = match parse_json(req, "mock").await {
        Ok(input) => input,
        Err(response) => return response,
    };

    match registry.replace(&input.id, input.endpoint) {
        Ok(endpoint) => json_response(StatusCode::OK, &endpoint),
        Err(e) => registry_error_response(&e),
    }
}

/// POST /mock/add/response - Append a response variant
pub async fn handle_append_response<B>(
    req: Request<B>,
    registry: Arc<EndpointRegistry>,
) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Display,
{
    let input: AppendResponseRequest = match parse_json(req, "response").await {
        Ok(input) => input,
        Err(response) => return response,
    };

    let project = registry.resolve_project(input.project.as_deref());
    let key = match input.method.as_deref().filter(|m| !m.trim().is_empty()) {
        Some(method) => EndpointKey::new(method, &input.api_path, &project),
        None => {
            let path = normalize_path(&input.api_path);
            match registry.find_by_path(&path, &project) {
                Some(endpoint) => endpoint.key(),
                None => {
                    let target = format!("{} (project {})", path, project);
                    return registry_error_response(&RegistryError::NotFound(target));
                }
            }
        }
    };

    match registry.append_response_variant(&key, input.new_response) {
        Ok(endpoint) => json_response(StatusCode::OK, &endpoint),
        Err(e) => registry_error_response(&e),
    }
}

/// GET /mock - List endpoints, optionally for one project
pub fn handle_list(query: Option<&str>, registry: Arc<EndpointRegistry>) -> Response<Full<Bytes>> {
    let params = ProjectQuery::parse(query);
    json_response(StatusCode::OK, &registry.list(params.project.as_deref()))
}

/// GET /mock/path - List `{id, path}` pairs, optionally for one project
pub fn handle_list_paths(
    query: Option<&str>,
    registry: Arc<EndpointRegistry>,
) -> Response<Full<Bytes>> {
    let params = ProjectQuery::parse(query);
    json_response(StatusCode::OK, &registry.list_paths(params.project.as_deref()))
}

/// GET /mock/projects/list - Distinct project names
pub fn handle_projects(registry: Arc<EndpointRegistry>) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &registry.projects())
}

/// GET /mock/:id
pub fn handle_get(id: &str, registry: Arc<EndpointRegistry>) -> Response<Full<Bytes>> {
    match registry.get(id) {
        Ok(endpoint) => json_response(StatusCode::OK, &endpoint),
        Err(e) => registry_error_response(&e),
    }
}

/// DELETE /mock/:id
pub fn handle_delete(id: &str, registry: Arc<EndpointRegistry>) -> Response<Full<Bytes>> {
    match registry.remove(id) {
        Ok(_) => json_response(StatusCode::OK, &true),
        Err(e) => registry_error_response(&e),
    }
}
