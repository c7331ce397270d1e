#![allow(clippy::unwrap_used)]
// End-to-end: models driving the reqwest transport against wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use restmodel_api::TransportConfig;
use restmodel_core::{CoreError, Registry, Runtime, SettingsLayer, record};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, Registry) {
    let server = MockServer::start().await;
    let base = Url::parse(&format!("{}/api", server.uri())).unwrap();
    let runtime = Runtime::http(TransportConfig::default().with_base_url(base)).unwrap();

    let mut registry = Registry::new(
        SettingsLayer::new()
            .content_type("application/json")
            .take_at_least(std::time::Duration::ZERO),
        runtime,
    );
    registry.register(
        "posts",
        SettingsLayer::new()
            .base_route("/posts")
            .headers(record!({ "X-Requested-With": "restmodel" })),
    );
    (server, registry)
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_update_round_trips_through_http() {
    let (server, registry) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/posts/4"))
        .and(header("x-requested-with", "restmodel"))
        .and(body_json(json!({ "id": 4, "title": "Hello" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "id": 4, "title": "Hello", "slug": "hello" } })),
        )
        .mount(&server)
        .await;

    let post = registry
        .create("posts", record!({ "id": 4, "title": "Hello" }), SettingsLayer::new())
        .unwrap();
    post.act("update").unwrap().await.unwrap();

    assert_eq!(post.get("slug"), Some(json!("hello")));
}

#[tokio::test]
async fn test_list_sends_params_as_query() {
    let (server, registry) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
        .mount(&server)
        .await;

    let posts = registry
        .create(
            "posts",
            record!({ "title": "ignored" }),
            SettingsLayer::new().params(record!({ "page": 3 })),
        )
        .unwrap();
    let outcome = posts.act("list").unwrap().await.unwrap();

    assert_eq!(outcome.data(), Some(&json!([{ "id": 1 }])));
}

#[tokio::test]
async fn test_unprocessable_entity_fills_the_error_store() {
    let (server, registry) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/posts"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "The given data was invalid.",
            "errors": { "title": ["The title field is required."] }
        })))
        .mount(&server)
        .await;

    let post = registry
        .create("posts", record!({ "title": "" }), SettingsLayer::new())
        .unwrap();
    let err = post.act("create").unwrap().await.unwrap_err();

    assert!(matches!(err, CoreError::Validation { status: 422, .. }));
    assert_eq!(post.errors().first("title"), Some("The title field is required."));
}

#[tokio::test]
async fn test_server_errors_surface_as_api_errors() {
    let (server, registry) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/posts/9"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "message": "maintenance" })))
        .mount(&server)
        .await;

    let post = registry
        .create("posts", record!({ "id": 9 }), SettingsLayer::new())
        .unwrap();
    let err = post.act("destroy").unwrap().await.unwrap_err();

    match err {
        CoreError::Api { message, status, .. } => {
            assert_eq!(status, Some(503));
            assert_eq!(message, "HTTP 503: maintenance");
        }
        other => panic!("expected an API error, got {other:?}"),
    }
}
