//! Mock request handling.
//!
//! Flow for one request:
//! 1. Normalize method, path, project, headers, query and body
//! 2. Look up the endpoint and select a response variant
//! 3. Hand the default response to the interception coordinator
//! 4. Apply the delay that goes with the resolution and write the response

use super::MockContext;
use crate::live::{Resolution, ResponseEnvelope};
use crate::metrics;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Response header naming how the response was decided.
pub const RESOLUTION_HEADER: &str = "x-livemock-resolution";

/// Serve one mock request.
pub async fn handle_mock_request<B>(
    req: Request<B>,
    context: Arc<MockContext>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Display,
{
    let started = Instant::now();

    // Extract parts we need before consuming the request body
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);
    let headers: BTreeMap<String, String> = req
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect();

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Failed to read mock request body: {}", e);
            Bytes::new()
        }
    };

    let (request, client_id) =
        context
            .options
            .normalize(&method, &path, query.as_deref(), headers, &body);

    let Some(matched) = context.registry.find_match(&request) else {
        metrics::record_request("unmatched");
        metrics::record_request_duration("unmatched", elapsed_ms(started));
        debug!(method = %request.method, path = %request.path, project = %request.project, "No mock matched");
        let message = format!(
            "No mock found for {} {} (project {})",
            request.method, request.path, request.project
        );
        return Ok(build_mock_response(
            &ResponseEnvelope {
                status_code: StatusCode::NOT_FOUND.as_u16(),
                headers: BTreeMap::new(),
                body: json!({ "errors": [{ "code": "404", "message": message }] }),
            },
            "unmatched",
        ));
    };
    metrics::record_request("matched");
    debug!(
        endpoint = %matched.endpoint_id,
        variant = matched.variant_index,
        "Mock matched"
    );

    let default_response = ResponseEnvelope::from_variant(&matched.variant);
    let resolution = context
        .coordinator
        .resolve(client_id.as_deref(), &request, default_response)
        .await;

    let label = resolution.label();
    let (envelope, delay) = match resolution {
        Resolution::Passthrough(envelope) => {
            (envelope, Duration::from_millis(matched.variant.delay))
        }
        Resolution::Overridden { response, delay } => (response, delay),
        Resolution::TimedOut(envelope) => (envelope, Duration::ZERO),
    };

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    info!(
        method = %request.method,
        path = %request.path,
        status = envelope.status_code,
        resolution = label,
        "Mock response"
    );
    metrics::record_request_duration(label, elapsed_ms(started));
    Ok(build_mock_response(&envelope, label))
}

/// Build the HTTP response for an envelope.
///
/// Header names or values that cannot be written are skipped. The content type is
/// `application/json` unless the envelope sets one; a string body under a non-JSON
/// content type is written verbatim.
pub fn build_mock_response(envelope: &ResponseEnvelope, resolution: &str) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(envelope.status_code).unwrap_or_else(|_| {
        warn!(status = envelope.status_code, "Invalid status code, using 500");
        StatusCode::INTERNAL_SERVER_ERROR
    });

    let mut builder = Response::builder().status(status);
    let mut content_type: Option<String> = None;
    for (name, value) in &envelope.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                if name == CONTENT_TYPE {
                    content_type = value.to_str().ok().map(str::to_string);
                }
                builder = builder.header(name, value);
            }
            _ => warn!(header = %name, "Skipping unwritable response header"),
        }
    }
    if content_type.is_none() {
        builder = builder.header(CONTENT_TYPE, "application/json");
    }
    builder = builder.header(RESOLUTION_HEADER, resolution);

    let is_json = content_type
        .as_deref()
        .map(|ct| ct.to_ascii_lowercase().contains("json"))
        .unwrap_or(true);
    let body = match &envelope.body {
        Value::String(text) if !is_json => text.clone(),
        other => other.to_string(),
    };

    builder.body(Full::new(Bytes::from(body))).unwrap_or_else(|e| {
        warn!("Failed to build mock response: {}", e);
        let mut response = Response::new(Full::new(Bytes::from("Internal Server Error")));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::{
        InterceptionCoordinator, LiveHub, NotificationChannel, OverrideResponse, ServerMessage,
    };
    use crate::registry::{EndpointRegistry, NewEndpoint, ResponseVariant};
    use crate::request::NormalizeOptions;

    fn context(registry: EndpointRegistry) -> Arc<MockContext> {
        let hub = Arc::new(LiveHub::new());
        let coordinator = InterceptionCoordinator::new(hub, Duration::from_secs(15));
        Arc::new(MockContext::new(
            Arc::new(registry),
            coordinator,
            NormalizeOptions::default(),
        ))
    }

    fn request(method: &str, uri: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn body_json(response: Response<Full<Bytes>>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unmatched_request_is_404() {
        let ctx = context(EndpointRegistry::in_memory());
        let response = handle_mock_request(request("GET", "/nope", ""), ctx)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers().get(RESOLUTION_HEADER).unwrap(), "unmatched");
        let body = body_json(response).await;
        assert_eq!(
            body["errors"][0]["message"],
            "No mock found for GET /nope (project KP)"
        );
    }

    #[tokio::test]
    async fn test_matched_variant_with_headers() {
        let registry = EndpointRegistry::in_memory();
        registry
            .add(NewEndpoint::new(
                "POST",
                "/api/user",
                "KP",
                vec![
                    ResponseVariant::new(200, json!({"msg": "default"})),
                    ResponseVariant::new(201, json!({"msg": "kawa"}))
                        .with_request_matcher(json!({"name": "kawa"}))
                        .with_header("project-leader", "Sudipto"),
                ],
            ))
            .unwrap();
        let ctx = context(registry);

        let response = handle_mock_request(
            request("POST", "/api/user", r#"{"name":"kawa"}"#),
            Arc::clone(&ctx),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get("project-leader").unwrap(), "Sudipto");
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(response.headers().get(RESOLUTION_HEADER).unwrap(), "default");
        assert_eq!(body_json(response).await, json!({"msg": "kawa"}));

        let response = handle_mock_request(request("POST", "/api/user", r#"{"name":"x"}"#), ctx)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"msg": "default"}));
    }

    #[tokio::test]
    async fn test_project_header_selects_endpoint() {
        let registry = EndpointRegistry::in_memory();
        registry
            .add(NewEndpoint::new(
                "GET",
                "/api/user",
                "other",
                vec![ResponseVariant::new(200, json!({"project": "other"}))],
            ))
            .unwrap();
        let ctx = context(registry);

        let response = handle_mock_request(request("GET", "/api/user", ""), Arc::clone(&ctx))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let mut req = request("GET", "/api/user", "");
        req.headers_mut()
            .insert("project-name", HeaderValue::from_static("other"));
        let response = handle_mock_request(req, ctx).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_variant_delay_is_applied() {
        let registry = EndpointRegistry::in_memory();
        registry
            .add(NewEndpoint::new(
                "GET",
                "/slow",
                "KP",
                vec![ResponseVariant::new(200, json!({})).with_delay(250)],
            ))
            .unwrap();
        let ctx = context(registry);

        let started = tokio::time::Instant::now();
        let response = handle_mock_request(request("GET", "/slow", ""), ctx)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(started.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_override_delay_is_applied_before_writing() {
        let registry = EndpointRegistry::in_memory();
        registry
            .add(NewEndpoint::new(
                "GET",
                "/api/user",
                "KP",
                vec![ResponseVariant::new(200, json!({"msg": "default"})).with_delay(10_000)],
            ))
            .unwrap();
        let hub = Arc::new(LiveHub::new());
        let coordinator = InterceptionCoordinator::new(hub.clone(), Duration::from_secs(15));
        let ctx = Arc::new(MockContext::new(
            Arc::new(registry),
            Arc::clone(&coordinator),
            NormalizeOptions::default(),
        ));
        let (session, mut rx) = hub.connect();
        hub.subscribe(session, "c1");

        let started = tokio::time::Instant::now();
        let mut req = request("GET", "/api/user", "");
        req.headers_mut()
            .insert("x-client-id", HeaderValue::from_static("c1"));
        let task = tokio::spawn(handle_mock_request(req, ctx));

        let correlation_id = match rx.recv().await {
            Some(ServerMessage::Intercept(event)) => event.correlation_id,
            other => panic!("expected intercept event, got {other:?}"),
        };
        let mut teapot = OverrideResponse::new(418, json!({"teapot": true}));
        teapot.delay = 400;
        coordinator.apply_override(&correlation_id, teapot);

        let response = task.await.unwrap().unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(400));
        assert!(elapsed < Duration::from_secs(10));
        assert_eq!(response.status().as_u16(), 418);
        assert_eq!(response.headers().get(RESOLUTION_HEADER).unwrap(), "override");
        assert_eq!(body_json(response).await, json!({"teapot": true}));
    }

    #[test]
    fn test_build_response_respects_content_type() {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "text/plain".to_string());
        headers.insert("bad header".to_string(), "x".to_string());
        let envelope = ResponseEnvelope {
            status_code: 202,
            headers,
            body: json!("plain text"),
        };
        let response = build_mock_response(&envelope, "override");
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(response.headers().get(RESOLUTION_HEADER).unwrap(), "override");
        assert_eq!(response.headers().len(), 2);
    }
}
