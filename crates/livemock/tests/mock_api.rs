//! End-to-end tests for the management API and the mock listener.

mod common;

use common::{client, TestServer};
use serde_json::{json, Value};
use std::time::Duration;

const DEADLINE: Duration = Duration::from_secs(15);

#[tokio::test]
async fn test_discriminated_variants() {
    let server = TestServer::start(DEADLINE).await;
    let http = client();

    let created = http
        .post(format!("{}/mock", server.admin_url))
        .json(&json!({
            "project": "KP",
            "method": "POST",
            "path": "/api/user",
            "responses": [
                {"statusCode": 200, "response": {"message": "Success"}},
                {
                    "request": {"name": "kawa"},
                    "responseHeader": {"project-leader": "Sudipto"},
                    "statusCode": 201,
                    "response": {"message": "kawa created"}
                }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201);

    let response = http
        .post(format!("{}/api/user", server.mock_url))
        .json(&json!({"name": "kawa"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    assert_eq!(response.headers()["project-leader"], "Sudipto");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"message": "kawa created"}));

    let response = http
        .post(format!("{}/api/user", server.mock_url))
        .json(&json!({"name": "other"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"message": "Success"}));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let server = TestServer::start(DEADLINE).await;
    let response = client()
        .get(format!("{}/api/missing", server.mock_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["errors"][0]["message"],
        "No mock found for GET /api/missing (project KP)"
    );
}

#[tokio::test]
async fn test_duplicate_identity_is_conflict() {
    let server = TestServer::start(DEADLINE).await;
    let http = client();
    let mock = json!({
        "method": "GET",
        "path": "/api/user",
        "responses": [{"response": {}}]
    });

    let first = http
        .post(format!("{}/mock", server.admin_url))
        .json(&mock)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status().as_u16(), 201);
    let first: Value = first.json().await.unwrap();
    assert_eq!(first["project"], "KP");

    let second = http
        .post(format!("{}/mock", server.admin_url))
        .json(&mock)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 409);
    assert_eq!(server.registry.len(), 1);
}

#[tokio::test]
async fn test_catalog_is_persisted_and_backed_up() {
    let server = TestServer::start(DEADLINE).await;
    let http = client();

    let created: Value = http
        .post(format!("{}/mock", server.admin_url))
        .json(&json!({
            "project": "Shop",
            "method": "GET",
            "path": "/api/cart",
            "responses": [{"response": {"items": []}}]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let on_disk: Value =
        serde_json::from_str(&std::fs::read_to_string(&server.data_file).unwrap()).unwrap();
    assert_eq!(on_disk.as_array().unwrap().len(), 1);
    assert_eq!(on_disk[0]["id"], created["id"]);

    let deleted = http
        .delete(format!(
            "{}/mock/{}",
            server.admin_url,
            created["id"].as_str().unwrap()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 200);
    assert_eq!(deleted.json::<Value>().await.unwrap(), json!(true));

    let on_disk: Value =
        serde_json::from_str(&std::fs::read_to_string(&server.data_file).unwrap()).unwrap();
    assert_eq!(on_disk, json!([]));

    let backups: Vec<_> = std::fs::read_dir(&server.backup_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(backups.len(), 1);
    let backup: Value =
        serde_json::from_str(&std::fs::read_to_string(&backups[0]).unwrap()).unwrap();
    assert_eq!(backup[0]["id"], created["id"]);
}

#[tokio::test]
async fn test_query_parameters_stand_in_for_empty_body() {
    let server = TestServer::start(DEADLINE).await;
    let http = client();

    http.post(format!("{}/mock", server.admin_url))
        .json(&json!({
            "method": "GET",
            "path": "/api/search",
            "responses": [
                {"response": {"hits": 0}},
                {"request": {"q": "rust"}, "response": {"hits": 42}}
            ]
        }))
        .send()
        .await
        .unwrap();

    let body: Value = http
        .get(format!("{}/api/search?q=rust", server.mock_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"hits": 42}));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let server = TestServer::start(DEADLINE).await;
    let http = client();
    http.get(format!("{}/nothing", server.mock_url))
        .send()
        .await
        .unwrap();

    let text = http
        .get(format!("{}/metrics", server.admin_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(text.contains("livemock_requests_total"));
}
