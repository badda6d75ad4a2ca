//! Registry client tests against a mock HTTP server.

use serde::Deserialize;
use serde_json::json;
use sortie_registry::{Error, RegistryClient, TOKEN_HEADER};
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct Release {
    name: String,
    version: String,
}

fn client(server: &MockServer, token: Option<&str>) -> RegistryClient {
    let mut builder = RegistryClient::builder().base_url(server.uri());
    if let Some(token) = token {
        builder = builder.token(token);
    }
    builder.build().unwrap()
}

#[tokio::test]
async fn test_get_json_with_authentication_sends_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/releases/postgres"))
        .and(header(TOKEN_HEADER, "secret"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"name": "postgres", "version": "1.4.0"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let release: Release = client(&server, Some("secret"))
        .get_json_with_authentication("api/v1/releases/postgres")
        .await
        .unwrap();

    assert_eq!(
        release,
        Release {
            name: "postgres".into(),
            version: "1.4.0".into()
        }
    );
}

#[tokio::test]
async fn test_unauthenticated_get_has_no_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(|req: &Request| {
            if req.headers.contains_key(TOKEN_HEADER) {
                ResponseTemplate::new(400)
            } else {
                ResponseTemplate::new(200)
            }
        })
        .mount(&server)
        .await;

    let response = client(&server, Some("secret")).get("/health").await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/state"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "bad token"})))
        .mount(&server)
        .await;

    let err = client(&server, Some("wrong"))
        .get_json_with_authentication::<serde_json::Value>("api/v1/state")
        .await
        .unwrap_err();

    assert!(err.is_auth_error());
    assert!(matches!(err, Error::Auth(ref m) if m == "bad token"));
}

#[tokio::test]
async fn test_not_found_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/state"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such deployment"))
        .mount(&server)
        .await;

    let err = client(&server, None)
        .get_json_with_authentication::<serde_json::Value>("api/v1/state")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(ref m) if m == "no such deployment"));
}

#[tokio::test]
async fn test_server_error_maps_to_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/state"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client(&server, None)
        .get_json_with_authentication::<serde_json::Value>("api/v1/state")
        .await
        .unwrap_err();

    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "HTTP 503");
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/state"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server, None)
        .get_json_with_authentication::<serde_json::Value>("api/v1/state")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Json(_)));
}

#[tokio::test]
async fn test_post_json_variants() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/login"))
        .and(body_json(json!({"username": "ops"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/releases"))
        .and(header(TOKEN_HEADER, "secret"))
        .and(body_json(json!({"name": "postgres"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, Some("secret"));
    let response = client
        .post_json("api/v1/login", &json!({"username": "ops"}))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let response = client
        .post_json_with_authentication("api/v1/releases", &json!({"name": "postgres"}))
        .await
        .unwrap();
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_post_file_uploads_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/upload"))
        .and(header(TOKEN_HEADER, "secret"))
        .and(header_exists("content-type"))
        .respond_with(|req: &Request| {
            let content_type = req
                .headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            let body = String::from_utf8_lossy(&req.body);
            if content_type.starts_with("multipart/form-data")
                && body.contains("name=\"file\"")
                && body.contains("filename=\"postgres-1.4.0.tgz\"")
                && body.contains("archive-bytes")
            {
                ResponseTemplate::new(200)
            } else {
                ResponseTemplate::new(400)
            }
        })
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("postgres-1.4.0.tgz");
    std::fs::write(&file, "archive-bytes").unwrap();

    let response = client(&server, Some("secret"))
        .post_file_with_authentication("api/v1/upload", &file)
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn test_post_missing_file() {
    let server = MockServer::start().await;
    let err = client(&server, Some("secret"))
        .post_file_with_authentication("api/v1/upload", "/nonexistent/file.tgz".as_ref())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}

#[tokio::test]
async fn test_absolute_url_bypasses_base() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/state.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = RegistryClient::builder()
        .base_url("http://registry.invalid/base")
        .build()
        .unwrap();
    let body: serde_json::Value = client
        .get_json_with_authentication(&format!("{}/state.json", server.uri()))
        .await
        .unwrap();
    assert_eq!(body, json!({"ok": true}));
}
