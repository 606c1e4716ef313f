mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use yachtsync_importer::media::{HttpMediaFetcher, MediaError, MediaFetcher};
use yachtsync_importer::routes::build_router;

use common::{test_state, yacht_envelope, API_KEY};

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
}

fn import_request(uri: &str, body: &Value, key: Option<&str>) -> Request<Body> {
    let mut builder = post_json(uri);
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn import_with_api_key_header() {
    let (state, store) = test_state(Some(API_KEY));
    let (status, body) = send(
        build_router(state),
        import_request("/sync/import?type=new", &yacht_envelope("src-1"), Some(API_KEY)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["imported"], 2);
    assert_eq!(body["created"], 2);
    assert!(body["posts"]["en"].is_i64());
    assert_eq!(body["errors"], json!([]));
    assert_eq!(store.posts().len(), 2);
}

#[tokio::test]
async fn bearer_token_is_accepted() {
    let (state, _) = test_state(Some(API_KEY));
    let request = post_json("/sync/import")
        .header("authorization", format!("Bearer {API_KEY}"))
        .body(Body::from(yacht_envelope("src-1").to_string()))
        .unwrap();
    let (status, body) = send(build_router(state), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn missing_or_wrong_key_is_unauthorized() {
    let (state, store) = test_state(Some(API_KEY));
    let envelope = yacht_envelope("src-1");

    let (status, body) = send(
        build_router(state.clone()),
        import_request("/sync/import", &envelope, None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_ERROR");

    let (status, _) = send(
        build_router(state),
        import_request("/sync/import", &envelope, Some("wrong")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(store.posts().is_empty());
}

#[tokio::test]
async fn unconfigured_importer_rejects_imports() {
    let (state, _) = test_state(None);
    let (status, body) = send(
        build_router(state),
        import_request("/sync/import", &yacht_envelope("src-1"), Some(API_KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "NOT_CONFIGURED");
    assert_eq!(body["message"], "Importer API key is not configured");
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn invalid_payload_is_rejected_without_writes() {
    let (state, store) = test_state(Some(API_KEY));
    let mut envelope = yacht_envelope("src-1");
    envelope["data"]["slug"] = json!("");

    let (status, body) = send(
        build_router(state.clone()),
        import_request("/sync/import", &envelope, Some(API_KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().is_some_and(|m| m.contains("slug")));

    let (status, _) = send(
        build_router(state),
        import_request("/sync/import?type=news", &yacht_envelope("src-1"), Some(API_KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(store.posts().is_empty());
    assert!(store.attachments().is_empty());
}

#[tokio::test]
async fn legacy_payload_is_converted() {
    let (state, store) = test_state(Some(API_KEY));
    let legacy = json!({
        "type": "used",
        "import_media": false,
        "data": {
            "slug": "bavaria-c42",
            "title_en": "Bavaria C42",
            "title_sl": "Bavaria C42 rabljena",
            "content_sl": "Opis",
            "custom_fields": {"price": 189000, "sub_title_sl": "Rabljena"}
        }
    });
    let (status, body) = send(
        build_router(state),
        import_request("/sync/import-legacy", &legacy, Some(API_KEY)),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["imported"], 2);
    let posts = store.posts();
    let sl = posts.iter().find(|p| p.language.as_str() == "sl").unwrap();
    assert_eq!(sl.source_id, "legacy:bavaria-c42");
    assert_eq!(sl.title, "Bavaria C42 rabljena");
    assert_eq!(sl.meta["sub_title"], "Rabljena");
    assert_eq!(sl.meta["price"], 189000);
    assert_eq!(sl.meta["_condition"], "used");
}

#[tokio::test]
async fn status_reports_configuration() {
    let (state, _) = test_state(Some(API_KEY));
    let request = Request::builder()
        .uri("/sync/status")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(build_router(state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "configured": true,
            "api_url": "https://shop.example.com/sync/import",
            "translation_plugin_active": true,
            "custom_fields_plugin_active": true,
            "translation_backend": "polylang"
        })
    );
}

#[tokio::test]
async fn health_reports_memory_storage() {
    let (state, _) = test_state(None);
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(build_router(state), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "memory");
}

// ---------------------------------------------------------------------------
// HttpMediaFetcher against a local server
// ---------------------------------------------------------------------------

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

async fn serve_media() -> String {
    let app = Router::new()
        .route(
            "/photo",
            get(|| async { ([("content-type", "application/octet-stream")], PNG_MAGIC) }),
        )
        .route(
            "/manual.pdf",
            get(|| async { ([("content-type", "application/pdf; charset=binary")], "%PDF-1.4") }),
        )
        .route("/missing.jpg", get(|| async { StatusCode::NOT_FOUND }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn http_fetcher_sniffs_images_and_writes_files() {
    let base = serve_media().await;
    let dir = tempfile::tempdir().unwrap();
    let fetcher = HttpMediaFetcher::new(dir.path(), Duration::from_secs(5)).unwrap();

    let image = fetcher.fetch(&format!("{base}/photo")).await.unwrap();
    assert_eq!(image.mime_type.as_deref(), Some("image/png"));
    assert!(image.file_path.ends_with(".png"));
    assert_eq!(image.size_bytes, PNG_MAGIC.len() as i64);
    assert!(dir.path().join(&image.file_path).exists());

    let pdf = fetcher.fetch(&format!("{base}/manual.pdf")).await.unwrap();
    assert_eq!(pdf.mime_type.as_deref(), Some("application/pdf"));
    assert!(pdf.file_path.ends_with(".pdf"));

    let err = fetcher.fetch(&format!("{base}/missing.jpg")).await.unwrap_err();
    assert!(matches!(err, MediaError::Status(404)));
}
