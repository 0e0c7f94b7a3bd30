//! Route dispatch logic for the management API.

use crate::admin_api::handlers::{endpoints, system};
use crate::admin_api::types::not_found;
use crate::admin_api::AdminState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;
use tracing::debug;

/// Parsed route for paths under `/mock`
#[derive(Debug, PartialEq)]
enum MockRoute<'a> {
    /// GET/POST/PUT /mock
    Collection,
    /// GET /mock/path
    Paths,
    /// GET /mock/projects/list
    Projects,
    /// POST /mock/add/response
    AppendResponse,
    /// GET/PUT/DELETE /mock/:id
    ById(&'a str),
}

impl<'a> MockRoute<'a> {
    /// Parse route from path segments after `/mock`
    fn parse(segments: &[&'a str]) -> Option<Self> {
        match segments {
            [] => Some(MockRoute::Collection),
            ["path"] => Some(MockRoute::Paths),
            ["projects", "list"] => Some(MockRoute::Projects),
            ["add", "response"] => Some(MockRoute::AppendResponse),
            [id] if !id.is_empty() => Some(MockRoute::ById(*id)),
            _ => None,
        }
    }
}

/// Main request router
pub async fn route_request<B>(
    req: Request<B>,
    state: Arc<AdminState>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(|s| s.to_string());

    debug!("Admin API: {} {}", method, path);

    let response = route_by_path(&method, &path, query.as_deref(), req, state).await;
    Ok(response)
}

/// Route based on path
async fn route_by_path<B>(
    method: &Method,
    path: &str,
    query: Option<&str>,
    req: Request<B>,
    state: Arc<AdminState>,
) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Display,
{
    // Fast path for system routes
    match (method, path) {
        (&Method::GET, "/health") => {
            return system::handle_health(&state.registry, &state.coordinator)
        }
        (&Method::GET, "/metrics") => return system::handle_metrics(),
        (&Method::GET, "/live/pending") => {
            return system::handle_pending(Arc::clone(&state.coordinator))
        }
        _ => {}
    }

    let rest = match path.strip_prefix("/mock") {
        Some("") | Some("/") => "",
        Some(rest) if rest.starts_with('/') => rest.trim_start_matches('/').trim_end_matches('/'),
        _ => return not_found(),
    };
    let segments: Vec<&str> = if rest.is_empty() {
        Vec::new()
    } else {
        rest.split('/').collect()
    };

    let route = match MockRoute::parse(&segments) {
        Some(r) => r,
        None => return not_found(),
    };

    let registry = Arc::clone(&state.registry);
    match (method, route) {
        // /mock
        (&Method::GET, MockRoute::Collection) => endpoints::handle_list(query, registry),
        (&Method::POST, MockRoute::Collection) => endpoints::handle_create(req, registry).await,
        (&Method::PUT, MockRoute::Collection) => {
            endpoints::handle_replace_from_body(req, registry).await
        }

        // Projections
        (&Method::GET, MockRoute::Paths) => endpoints::handle_list_paths(query, registry),
        (&Method::GET, MockRoute::Projects) => endpoints::handle_projects(registry),

        // /mock/add/response
        (&Method::POST, MockRoute::AppendResponse) => {
            endpoints::handle_append_response(req, registry).await
        }

        // /mock/:id
        (&Method::GET, MockRoute::ById(id)) => endpoints::handle_get(id, registry),
        (&Method::PUT, MockRoute::ById(id)) => endpoints::handle_replace(id, req, registry).await,
        (&Method::DELETE, MockRoute::ById(id)) => endpoints::handle_delete(id, registry),

        _ => not_found(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::{InterceptionCoordinator, LiveHub};
    use crate::registry::{EndpointRegistry, MemoryStore};
    use http_body_util::BodyExt;
    use hyper::StatusCode;
    use serde_json::{json, Value};
    use std::time::Duration;

    #[test]
    fn test_mock_route_parse() {
        assert_eq!(MockRoute::parse(&[]), Some(MockRoute::Collection));
        assert_eq!(MockRoute::parse(&["path"]), Some(MockRoute::Paths));
        assert_eq!(
            MockRoute::parse(&["projects", "list"]),
            Some(MockRoute::Projects)
        );
        assert_eq!(
            MockRoute::parse(&["add", "response"]),
            Some(MockRoute::AppendResponse)
        );
        assert_eq!(MockRoute::parse(&["abc-123"]), Some(MockRoute::ById("abc-123")));
        assert_eq!(MockRoute::parse(&["abc", "extra"]), None);
        assert_eq!(MockRoute::parse(&[""]), None);
    }

    struct Harness {
        state: Arc<AdminState>,
        store: Arc<MemoryStore>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_default_project("KP")
        }

        fn with_default_project(project: &str) -> Self {
            let store = Arc::new(MemoryStore::new());
            let registry = Arc::new(
                EndpointRegistry::open_with_default_project(store.clone(), project).unwrap(),
            );
            let hub = Arc::new(LiveHub::new());
            let coordinator = InterceptionCoordinator::new(hub, Duration::from_secs(15));
            Self {
                state: Arc::new(AdminState::new(registry, coordinator)),
                store,
            }
        }

        async fn call(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let body = body.map(|b| b.to_string()).unwrap_or_default();
            let req = Request::builder()
                .method(method)
                .uri(uri)
                .body(Full::new(Bytes::from(body)))
                .unwrap();
            let response = route_request(req, Arc::clone(&self.state)).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, value)
        }
    }

    fn user_mock() -> Value {
        json!({
            "project": "KP",
            "method": "GET",
            "path": "/api/user",
            "responses": [{"statusCode": 200, "response": {"msg": "default"}}]
        })
    }

    #[tokio::test]
    async fn test_create_and_duplicate() {
        let h = Harness::new();
        let (status, created) = h.call("POST", "/mock", Some(user_mock())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(created["id"].is_string());
        assert_eq!(created["method"], "GET");

        let (status, body) = h.call("POST", "/mock", Some(user_mock())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["errors"][0]["code"], "409");
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_payloads() {
        let h = Harness::new();
        let (status, _) = h
            .call("POST", "/mock", Some(json!({"method": "GET"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut no_responses = user_mock();
        no_responses["responses"] = json!([]);
        let (status, _) = h.call("POST", "/mock", Some(no_responses)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(h.state.registry.is_empty());
    }

    #[tokio::test]
    async fn test_get_replace_delete() {
        let h = Harness::new();
        let (_, created) = h.call("POST", "/mock", Some(user_mock())).await;
        let id = created["id"].as_str().unwrap().to_string();

        let (status, fetched) = h.call("GET", &format!("/mock/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["path"], "/api/user");

        let mut updated = user_mock();
        updated["path"] = json!("/api/users");
        let (status, replaced) = h.call("PUT", &format!("/mock/{id}"), Some(updated)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(replaced["id"], json!(id));
        assert_eq!(replaced["path"], "/api/users");

        let mut by_body = user_mock();
        by_body["id"] = json!(id);
        let (status, replaced) = h.call("PUT", "/mock", Some(by_body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(replaced["path"], "/api/user");

        let (status, body) = h.call("DELETE", &format!("/mock/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(true));
        assert_eq!(h.store.backups().len(), 1);

        let (status, _) = h.call("GET", &format!("/mock/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = h.call("DELETE", &format!("/mock/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_listings_and_projects() {
        let h = Harness::new();
        h.call("POST", "/mock", Some(user_mock())).await;
        let mut other = user_mock();
        other["project"] = json!("Shop");
        other["path"] = json!("/api/cart");
        h.call("POST", "/mock", Some(other)).await;

        let (_, all) = h.call("GET", "/mock", None).await;
        assert_eq!(all.as_array().unwrap().len(), 2);

        let (_, shop) = h.call("GET", "/mock?project=Shop", None).await;
        assert_eq!(shop.as_array().unwrap().len(), 1);
        assert_eq!(shop[0]["path"], "/api/cart");

        let (_, paths) = h.call("GET", "/mock/path?project=KP", None).await;
        assert_eq!(paths[0]["path"], "/api/user");
        assert!(paths[0]["id"].is_string());

        let (_, projects) = h.call("GET", "/mock/projects/list", None).await;
        assert_eq!(
            projects,
            json!([{"projectName": "KP"}, {"projectName": "Shop"}])
        );
    }

    #[tokio::test]
    async fn test_append_response() {
        let h = Harness::new();
        h.call("POST", "/mock", Some(user_mock())).await;

        let append = json!({
            "apiPath": "/api/user",
            "project": "KP",
            "newResponse": {"request": {"name": "kawa"}, "statusCode": 201, "response": {"msg": "kawa"}}
        });
        let (status, endpoint) = h.call("POST", "/mock/add/response", Some(append)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(endpoint["responses"].as_array().unwrap().len(), 2);

        let second_default = json!({
            "apiPath": "/api/user",
            "method": "GET",
            "newResponse": {"response": {"msg": "another"}}
        });
        let (status, _) = h
            .call("POST", "/mock/add/response", Some(second_default))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = json!({"apiPath": "/nowhere", "newResponse": {"response": {}}});
        let (status, _) = h.call("POST", "/mock/add/response", Some(missing)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_configured_default_project_for_create_and_append() {
        let h = Harness::with_default_project("Shop");
        let mut mock = user_mock();
        mock.as_object_mut().unwrap().remove("project");
        let (status, created) = h.call("POST", "/mock", Some(mock)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["project"], "Shop");

        let append = json!({
            "apiPath": "/api/user",
            "newResponse": {"request": {"name": "kawa"}, "response": {"msg": "kawa"}}
        });
        let (status, endpoint) = h.call("POST", "/mock/add/response", Some(append)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(endpoint["responses"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_system_routes() {
        let h = Harness::new();
        let (status, health) = h.call("GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "ok");

        let (status, pending) = h.call("GET", "/live/pending", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pending, json!([]));

        let (status, _) = h.call("GET", "/unknown", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = h.call("PATCH", "/mock", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
