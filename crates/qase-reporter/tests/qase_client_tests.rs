//! Qase HTTP client tests against a mock API server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use common::secret::SecretString;
use qase_reporter::client::QaseClient;
use qase_reporter::errors::QaseError;
use qase_reporter::models::ResultCreate;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> QaseClient {
    QaseClient::new(server.uri(), "RM", 554, SecretString::from("test-token")).unwrap()
}

fn case_page(count: i64, entities: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": true,
        "result": {"total": count, "filtered": count, "count": count, "entities": entities}
    }))
}

#[tokio::test]
async fn test_case_index_pages_until_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/case/RM"))
        .and(header("Token", "test-token"))
        .and(query_param("offset", "0"))
        .respond_with(case_page(
            2,
            json!([
                {"id": 1, "title": "TestLogin", "custom_fields": []},
                {"id": 2, "title": "Renamed", "custom_fields": [{"id": 15, "value": "TestPSA"}]}
            ]),
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/case/RM"))
        .and(query_param("offset", "2"))
        .respond_with(case_page(1, json!([{"id": 3, "title": "TestRBAC"}])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/case/RM"))
        .and(query_param("offset", "3"))
        .respond_with(case_page(0, json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let index = client(&server).fetch_case_index().await.unwrap();

    assert_eq!(index.len(), 3);
    assert_eq!(index.lookup("TestLogin"), Some(1));
    assert_eq!(index.lookup("TestPSA"), Some(2));
    assert_eq!(index.lookup("Renamed"), None);
    assert_eq!(index.lookup("TestRBAC"), Some(3));
}

#[tokio::test]
async fn test_ensure_suite_path_reuses_and_creates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/suite/RM"))
        .and(query_param("search", "TestPSA"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "result": {"count": 2, "entities": [
                {"id": 10, "title": "TestPSAOld"},
                {"id": 11, "title": "TestPSA"}
            ]}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/suite/RM"))
        .and(query_param("search", "enforce"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "result": {"count": 0, "entities": []}
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/suite/RM"))
        .and(body_json(json!({"title": "enforce", "parent_id": 11})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": true, "result": {"id": 12}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let suite_id = client(&server)
        .ensure_suite_path(&["TestPSA".to_string(), "enforce".to_string()])
        .await
        .unwrap();

    assert_eq!(suite_id, 12);
}

#[tokio::test]
async fn test_empty_suite_path_resolves_to_root() {
    let server = MockServer::start().await;
    let suite_id = client(&server).ensure_suite_path(&[]).await.unwrap();
    assert_eq!(suite_id, 554);
}

#[tokio::test]
async fn test_create_case_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/case/RM"))
        .and(body_json(json!({
            "title": "deployment",
            "suite_id": 12,
            "is_flaky": 0,
            "automation": 2,
            "custom_field": {"14": "GoValidation"}
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": true, "result": {"id": 99}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let case_id = client(&server).create_case("deployment", 12).await.unwrap();
    assert_eq!(case_id, 99);
}

#[tokio::test]
async fn test_create_result_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/result/RM/42"))
        .and(body_json(json!({
            "case_id": 99,
            "status": "failed",
            "comment": "boom\n",
            "time": 3
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "result": {"case_id": 99, "hash": "abc"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = ResultCreate {
        case_id: 99,
        status: "failed".to_string(),
        comment: "boom\n".to_string(),
        time: 3,
    };
    client(&server).create_result(42, &result).await.unwrap();
}

#[tokio::test]
async fn test_get_run_title() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/run/RM/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "result": {"id": 42, "title": "v2.10-head", "status": 0}
        })))
        .mount(&server)
        .await;

    let run = client(&server).get_run(42).await.unwrap();
    assert_eq!(run.id, 42);
    assert_eq!(run.title, "v2.10-head");
}

#[tokio::test]
async fn test_429_is_rate_limited() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/run/RM/42"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
        .mount(&server)
        .await;

    let err = client(&server).get_run(42).await.expect_err("429");
    assert!(err.is_rate_limited());
    assert!(matches!(err, QaseError::RequestFailed { status: 429, .. }));
}

#[tokio::test]
async fn test_error_body_is_sanitized() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/run/RM/42"))
        .respond_with(
            ResponseTemplate::new(401).set_body_string(r#"{"error": "bad token", "token": "leakedtoken123"}"#),
        )
        .mount(&server)
        .await;

    let err = client(&server).get_run(42).await.expect_err("401");
    assert!(!err.is_rate_limited());
    assert!(!err.to_string().contains("leakedtoken123"));
}

#[tokio::test]
async fn test_status_false_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/run/RM/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": false,
            "errorMessage": "Run not found"
        })))
        .mount(&server)
        .await;

    let err = client(&server).get_run(42).await.expect_err("rejected");
    assert!(matches!(err, QaseError::ApiRejected(msg) if msg == "Run not found"));
}
