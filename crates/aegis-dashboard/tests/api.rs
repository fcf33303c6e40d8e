//! Router-level tests for the dashboard API and panel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use aegis_dashboard::build_router;
use aegis_metrics::{BoxFuture, FetchError, Fetcher, MetricFamilies, PollUpdate, Poller};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use tokio::sync::watch;
use tower::ServiceExt;

const REFERENCE: &str = "# HELP aegis_requests_total Requests by outcome.\n\
                         # TYPE aegis_requests_total counter\n\
                         aegis_requests_total{status=\"success_honest\"} 10\n\
                         aegis_requests_total{status=\"success_deceptive\"} 3\n\
                         aegis_active_sessions 42\n\
                         aegis_crypto_errors 0\n";

/// Serves canned bodies by endpoint.
struct StaticFetcher(HashMap<String, String>);

impl Fetcher for StaticFetcher {
    fn fetch<'a>(&'a self, endpoint: &'a str) -> BoxFuture<'a, Result<String, FetchError>> {
        let result = self
            .0
            .get(endpoint)
            .cloned()
            .ok_or_else(|| FetchError::Connect(format!("no route to {endpoint}")));
        Box::pin(async move { result })
    }
}

fn setup() -> (Router, Poller) {
    let fetcher: Arc<dyn Fetcher> = Arc::new(StaticFetcher(HashMap::from([
        ("http://core-b:8001/metrics".to_string(), REFERENCE.to_string()),
        (
            "http://core-b2:8001/metrics".to_string(),
            "aegis_active_sessions 7\n".to_string(),
        ),
    ])));
    let poller = Poller::new(fetcher.clone(), MetricFamilies::default());
    (build_router(poller.clone(), fetcher), poller)
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(resp: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn wait_for(rx: &mut watch::Receiver<Option<PollUpdate>>, endpoint: &str) -> PollUpdate {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            rx.changed().await.unwrap();
            if let Some(update) = rx.borrow_and_update().clone() {
                if update.endpoint == endpoint {
                    return update;
                }
            }
        }
    })
    .await
    .expect("timed out waiting for update")
}

fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn state_before_start_is_empty() {
    let (router, _poller) = setup();

    let req = Request::builder().uri("/api/state").body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["running"], false);
    assert!(json["data"]["latest"].is_null());
}

#[tokio::test]
async fn state_reflects_published_scrape() {
    let (router, poller) = setup();
    let mut rx = poller.subscribe();
    poller
        .start("http://core-b:8001/metrics", Duration::from_secs(3600))
        .unwrap();
    wait_for(&mut rx, "http://core-b:8001/metrics").await;

    let req = Request::builder().uri("/api/state").body(Body::empty()).unwrap();
    let json = body_json(router.oneshot(req).await.unwrap()).await;

    let latest = &json["data"]["latest"];
    assert_eq!(json["data"]["running"], true);
    assert_eq!(latest["generation"], 1);
    assert_eq!(latest["state"]["honestCount"], 10.0);
    assert_eq!(latest["state"]["deceptiveCount"], 3.0);
    assert_eq!(latest["state"]["activeSessions"], 42.0);
    assert_eq!(latest["state"]["cryptoErrors"], 0.0);
    assert!(latest["error"].is_null());
    poller.stop();
}

#[tokio::test]
async fn redirect_via_api() {
    let (router, poller) = setup();
    let mut rx = poller.subscribe();

    // Not started yet.
    let resp = router
        .clone()
        .oneshot(json_post("/api/endpoint", serde_json::json!({"endpoint": "http://core-b2:8001/metrics"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    poller
        .start("http://core-b:8001/metrics", Duration::from_secs(3600))
        .unwrap();

    let resp = router
        .clone()
        .oneshot(json_post("/api/endpoint", serde_json::json!({"endpoint": "  "})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = router
        .oneshot(json_post("/api/endpoint", serde_json::json!({"endpoint": "http://core-b2:8001/metrics"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["data"]["generation"], 2);

    let update = wait_for(&mut rx, "http://core-b2:8001/metrics").await;
    assert_eq!(update.state().unwrap().active_sessions, 7.0);
    poller.stop();
}

#[tokio::test]
async fn refresh_via_api() {
    let (router, poller) = setup();

    let req = Request::builder().method("POST").uri("/api/refresh").body(Body::empty()).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    poller
        .start("http://core-b:8001/metrics", Duration::from_secs(3600))
        .unwrap();
    let req = Request::builder().method("POST").uri("/api/refresh").body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["data"]["generation"], 2);
    poller.stop();
}

#[tokio::test]
async fn failed_scrape_surfaces_error() {
    let (router, poller) = setup();
    let mut rx = poller.subscribe();
    poller
        .start("http://nowhere:1/metrics", Duration::from_secs(3600))
        .unwrap();
    wait_for(&mut rx, "http://nowhere:1/metrics").await;

    let req = Request::builder().uri("/api/state").body(Body::empty()).unwrap();
    let json = body_json(router.oneshot(req).await.unwrap()).await;
    let latest = &json["data"]["latest"];
    assert!(latest["state"].is_null());
    assert!(latest["error"].as_str().unwrap().contains("no route"));
    poller.stop();
}

#[tokio::test]
async fn metrics_proxy() {
    let (router, _poller) = setup();

    let req = Request::builder()
        .uri("/api/metrics?target=http%3A%2F%2Fcore-b%3A8001%2Fmetrics")
        .body(Body::empty())
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(
        resp.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
    assert_eq!(body_text(resp).await, REFERENCE);

    let req = Request::builder()
        .uri("/api/metrics?target=http%3A%2F%2Funknown%2Fmetrics")
        .body(Body::empty())
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn generate_config_returns_zip() {
    let (router, _poller) = setup();

    let resp = router
        .oneshot(json_post(
            "/api/generate-config",
            serde_json::json!({
                "backend_url": "http://my-backend:8080",
                "core_a_port": 8000,
                "core_b_grpc_port": 50051,
                "core_b_http_port": 8001,
                "session_ttl": 600,
                "use_redis": true,
                "redis_url": "redis://redis:6379"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/zip");
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=aegis_config.zip"
    );

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
    let mut names: Vec<&str> = archive.file_names().collect();
    names.sort();
    assert_eq!(names, vec!["README.txt", "docker-compose.yml"]);
}

#[tokio::test]
async fn generate_config_rejects_invalid() {
    let (router, _poller) = setup();

    let resp = router
        .oneshot(json_post(
            "/api/generate-config",
            serde_json::json!({ "backend_url": "http://api:80", "core_a_port": 0 }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("core_a_port"));
}

#[tokio::test]
async fn panel_renders_and_redirects() {
    let (router, poller) = setup();
    let mut rx = poller.subscribe();
    poller
        .start("http://core-b:8001/metrics", Duration::from_secs(3600))
        .unwrap();
    wait_for(&mut rx, "http://core-b:8001/metrics").await;

    let req = Request::builder().uri("/").body(Body::empty()).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_text(resp).await;
    assert!(html.contains("LIVE THREAT MONITOR"));
    assert!(html.contains("<p>42</p>"));

    let req = Request::builder()
        .method("POST")
        .uri("/endpoint")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from("endpoint=http%3A%2F%2Fcore-b2%3A8001%2Fmetrics"))
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()[header::LOCATION], "/");
    assert_eq!(poller.endpoint(), "http://core-b2:8001/metrics");
    poller.stop();
}

fn form_post(body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/endpoint")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn panel_shows_rejected_redirect() {
    let (router, poller) = setup();

    let resp = router
        .clone()
        .oneshot(form_post("endpoint=http%3A%2F%2Fcore-b2%3A8001%2Fmetrics"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let html = body_text(resp).await;
    assert!(html.contains("Endpoint not applied: poller not started"));
    assert!(html.contains("LIVE THREAT MONITOR"));
    assert!(!poller.is_running());

    let resp = router.oneshot(form_post("endpoint=+")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(resp).await.contains("Endpoint is required."));
}
