//! End-to-end tests: messages through the worker to a mock WordPress site.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wp_blog_poster::config::Config;
use wp_blog_poster::messages::{ConnectionInfo, PublishedPost};
use wp_blog_poster::service::Publisher;
use wp_blog_poster::settings::{JsonFileStore, MemoryStore, SettingsStore, StoredSettings};
use wp_blog_poster::wordpress::{site_origin, TokenTransport};
use wp_blog_poster::worker;

fn token_settings(server: &MockServer, consented: bool) -> StoredSettings {
    StoredSettings {
        wp_url: server.uri(),
        wp_token: Some("tok".into()),
        query_fallback_consented: consented,
        auto_create_terms: true,
        ..StoredSettings::default()
    }
}

/// Every header-transport call is rejected as if a WAF ate the header.
async fn mount_blocked_header(server: &MockServer, expected_calls: u64) {
    Mock::given(header_exists("X-WPBP-Token"))
        .respond_with(ResponseTemplate::new(403).set_body_raw("<html>Blocked</html>", "text/html"))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_query(
    server: &MockServer,
    http_method: &str,
    route: &str,
    status: u16,
    body: serde_json::Value,
) {
    Mock::given(method(http_method))
        .and(path(route))
        .and(query_param("wpbp_token", "tok"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_create_post_with_fallback_persists_transport() {
    let server = MockServer::start().await;
    mount_blocked_header(&server, 1).await;
    mount_query(&server, "GET", "/wp-json/wp/v2/categories", 200, json!([])).await;
    mount_query(&server, "POST", "/wp-json/wp/v2/categories", 201, json!({"id": 3, "name": "Rust"})).await;
    mount_query(&server, "GET", "/wp-json/wp/v2/tags", 200, json!([{"id": 4, "name": "Async"}])).await;
    Mock::given(method("POST"))
        .and(path("/wp-json/wp/v2/posts"))
        .and(query_param("wpbp_token", "tok"))
        .and(body_partial_json(json!({
            "title": "Hello",
            "status": "future",
            "date": "2030-01-02T10:00:00",
            "categories": [3],
            "tags": [4]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 77,
            "status": "future",
            "link": "https://blog.example/?p=77",
            "slug": "hello"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new(token_settings(&server, true)));
    let publisher = Publisher::from_config(&Config::for_testing(), store.clone());
    let (handle, task) = worker::spawn(publisher, 4);

    let response = handle
        .send(json!({
            "type": "CREATE_POST",
            "version": 1,
            "data": {
                "title": "Hello",
                "content": "<p>hi</p>",
                "status": "future",
                "date": "2030-01-02 10:00",
                "categories": ["Rust"],
                "tags": ["async"]
            }
        }))
        .await
        .expect("worker reply");

    assert!(response.success, "{response:?}");
    let post: PublishedPost = response.data_as().expect("post data");
    assert_eq!(post.id, 77);
    assert_eq!(post.status, "future");
    assert_eq!(post.link, "https://blog.example/?p=77");
    assert_eq!(
        post.edit_url,
        format!("{}/wp-admin/post.php?post=77&action=edit", server.uri())
    );

    let saved = store.snapshot().await;
    assert_eq!(saved.token_transport, TokenTransport::Query);
    assert_eq!(saved.token_transport_origin, site_origin(&server.uri()));
    assert_eq!(saved.last_used_tags.get(&server.uri()), Some(&vec!["async".to_string()]));
    assert_eq!(saved.remembered_tags().to_vec(), vec!["async".to_string()]);

    drop(handle);
    task.await.expect("worker task");
}

#[tokio::test]
async fn test_create_post_without_consent_reports_it() {
    let server = MockServer::start().await;
    mount_blocked_header(&server, 1).await;
    Mock::given(query_param("wpbp_token", "tok"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new(token_settings(&server, false)));
    let publisher = Publisher::from_config(&Config::for_testing(), store.clone());
    let (handle, _task) = worker::spawn(publisher, 4);

    let response = handle
        .send(json!({"type": "CREATE_POST", "data": {"title": "Hi", "content": "<p>x</p>"}}))
        .await
        .expect("worker reply");

    assert!(!response.success);
    assert!(response.needs_query_fallback_consent);
    assert_eq!(response.error.expect("error").code, "NEEDS_QUERY_FALLBACK_CONSENT");
    assert_eq!(store.snapshot().await, token_settings(&server, false));
}

#[tokio::test]
async fn test_images_rehosted_before_post() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/chart.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(&b"chart"[..], "image/png"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/wp-json/wp/v2/media"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 11,
            "source_url": "https://blog.example/uploads/chart.png"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/wp-json/wp/v2/posts"))
        .and(body_partial_json(json!({
            "title": "Untitled",
            "status": "draft",
            "featured_media": 11,
            "content": "<p><img src=\"https://blog.example/uploads/chart.png\"></p>"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 5, "status": "draft"})))
        .expect(1)
        .mount(&server)
        .await;

    let settings = StoredSettings {
        wp_url: server.uri(),
        wp_user: Some("admin".into()),
        wp_password: Some("abcd efgh".into()),
        ..StoredSettings::default()
    };
    let publisher = Publisher::from_config(
        &Config::for_testing(),
        Arc::new(MemoryStore::new(settings)),
    );

    let content = format!("<p><img src=\"{}/img/chart.png\"></p>", server.uri());
    let response = publisher
        .handle_value(json!({"type": "CREATE_POST", "data": {"title": "  ", "content": content}}))
        .await;
    assert!(response.success, "{response:?}");
    let post: PublishedPost = response.data_as().expect("post data");
    assert_eq!(post.link, "");
}

#[tokio::test]
async fn test_connection_persists_consent_and_transport_to_file() {
    let server = MockServer::start().await;
    mount_blocked_header(&server, 1).await;
    mount_query(
        &server,
        "GET",
        "/wp-json/wp/v2/users/me",
        200,
        json!({"id": 1, "name": "", "slug": "editor"}),
    )
    .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(JsonFileStore::new(dir.path().join("settings.json")));
    let publisher = Publisher::from_config(&Config::for_testing(), store.clone());

    let response = publisher
        .handle_value(json!({
            "type": "TEST_CONNECTION",
            "data": {
                "wpUrl": server.uri(),
                "wpUser": "someone",
                "wpToken": "tok",
                "queryFallbackConsented": true
            }
        }))
        .await;

    assert!(response.success, "{response:?}");
    let info: ConnectionInfo = response.data_as().expect("connection info");
    assert_eq!(info.user, "editor");

    let saved = JsonFileStore::new(store.path()).load().await.expect("reload");
    assert!(saved.query_fallback_consented);
    assert_eq!(saved.token_transport, TokenTransport::Query);
    assert_eq!(saved.token_transport_origin, site_origin(&server.uri()));
    // Connection tests never store the credentials themselves
    assert_eq!(saved.wp_token, None);
}

#[tokio::test]
async fn test_connection_failure_is_localized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/users/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "invalid_username",
            "message": "Unknown username."
        })))
        .mount(&server)
        .await;

    let config = Config {
        locale: wp_blog_poster::feedback::Locale::Ja,
        ..Config::for_testing()
    };
    let publisher = Publisher::from_config(&config, Arc::new(MemoryStore::default()));
    let response = publisher
        .handle_value(json!({
            "type": "TEST_CONNECTION",
            "data": {"wpUrl": server.uri(), "wpUser": "nobody", "wpPassword": "x"}
        }))
        .await;

    assert!(!response.success);
    assert!(!response.needs_query_fallback_consent);
    let error = response.error.expect("error");
    assert_eq!(error.code, "AUTH_401");
    assert_eq!(error.message, "認証情報が間違っています（パスワード/トークン）");
    assert_eq!(error.hints.len(), 5);
}
