//! Router tests against an in-memory store and a scripted network

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use shell_api::{AppState, create_router};
use shell_core::{
    CacheManager, LifecycleController, Manifest, ManifestConfig, MatchOptions, Namespace,
    RequestInterceptor, VersionTag,
};
use shell_proxy::{Fetcher, NetworkRequest, NetworkResponse, ProxyError};
use shell_storage::MemoryStorage;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tower::ServiceExt;
use url::Url;

#[derive(Default)]
struct Origin {
    routes: HashMap<&'static str, &'static str>,
    offline: AtomicBool,
    fetches: AtomicUsize,
}

#[async_trait]
impl Fetcher for Origin {
    async fn fetch(&self, request: &NetworkRequest) -> Result<NetworkResponse, ProxyError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(ProxyError::Unavailable("connection refused".to_string()));
        }

        Ok(match self.routes.get(request.url.path()) {
            Some(body) => NetworkResponse::new(StatusCode::OK, *body),
            None => NetworkResponse::new(StatusCode::NOT_FOUND, "not found"),
        })
    }
}

struct Harness {
    origin: Arc<Origin>,
    lifecycle: Arc<LifecycleController>,
    router: Router,
}

fn harness() -> Harness {
    let origin = Arc::new(Origin {
        routes: HashMap::from([
            ("/index.html", "<html>shell</html>"),
            ("/app.js", "app();"),
            ("/api/documents", "[]"),
        ]),
        ..Origin::default()
    });

    let scope = Url::parse("http://localhost:8080").unwrap();
    let cache = Arc::new(CacheManager::new(
        Arc::new(MemoryStorage::new()),
        Namespace::new("turbosign").unwrap(),
    ));
    let manifest = Arc::new(
        Manifest::new(ManifestConfig {
            root_document: "/index.html".to_string(),
            precache: vec!["/index.html".to_string(), "/app.js".to_string()],
            optional: vec![],
            runtime_patterns: vec!["^/app".to_string()],
        })
        .unwrap(),
    );
    let lifecycle = Arc::new(LifecycleController::new(
        cache.clone(),
        manifest.clone(),
        origin.clone(),
        scope.clone(),
        VersionTag::new("v1.0.0").unwrap(),
        MatchOptions::default(),
    ));
    let interceptor = Arc::new(RequestInterceptor::new(
        cache.clone(),
        manifest,
        lifecycle.clone(),
        origin.clone(),
        scope,
        MatchOptions::default(),
    ));

    let state = AppState::new(cache, lifecycle.clone(), interceptor, origin.clone());

    Harness {
        origin,
        lifecycle,
        router: create_router(state, None),
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Option<String>, String) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let source = response
        .headers()
        .get("x-shell-cache")
        .map(|v| v.to_str().unwrap().to_string());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, source, String::from_utf8(body.to_vec()).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_reflects_activation() {
    let h = harness();

    let (_, _, body) = send(&h.router, get("/_shell/health")).await;
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "degraded");

    h.lifecycle.run().await.unwrap();

    let (status, _, body) = send(&h.router, get("/_shell/health")).await;
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], "v1.0.0");
    assert_eq!(json["state"], "active");
}

#[tokio::test]
async fn test_cached_asset_served_offline() {
    let h = harness();
    h.lifecycle.run().await.unwrap();
    h.origin.offline.store(true, Ordering::SeqCst);

    let (status, source, body) = send(&h.router, get("/app.js?v=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.as_deref(), Some("hit"));
    assert_eq!(body, "app();");
}

#[tokio::test]
async fn test_navigation_serves_root_document() {
    let h = harness();
    h.lifecycle.run().await.unwrap();
    h.origin.offline.store(true, Ordering::SeqCst);

    let request = Request::builder()
        .uri("/documents/42/sign")
        .header("sec-fetch-mode", "navigate")
        .body(Body::empty())
        .unwrap();

    let (status, source, body) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.as_deref(), Some("shell"));
    assert_eq!(body, "<html>shell</html>");
}

#[tokio::test]
async fn test_runtime_miss_offline_is_503() {
    let h = harness();
    h.lifecycle.run().await.unwrap();
    h.origin.offline.store(true, Ordering::SeqCst);

    let (status, source, body) = send(&h.router, get("/app-chunk.js")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(source.as_deref(), Some("offline"));
    assert_eq!(body, "Offline");
}

#[tokio::test]
async fn test_pass_through_is_forwarded() {
    let h = harness();
    h.lifecycle.run().await.unwrap();

    let (status, source, body) = send(&h.router, get("/api/documents")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.as_deref(), Some("bypass"));
    assert_eq!(body, "[]");

    h.origin.offline.store(true, Ordering::SeqCst);
    let (status, _, body) = send(&h.router, get("/api/documents")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"]["code"], "BAD_GATEWAY");
}

#[tokio::test]
async fn test_foreign_authority_is_refused() {
    let h = harness();
    h.lifecycle.run().await.unwrap();
    let before = h.origin.fetches.load(Ordering::SeqCst);

    let (status, source, body) =
        send(&h.router, get("http://169.254.169.254/latest/meta-data")).await;

    assert_eq!(status, StatusCode::MISDIRECTED_REQUEST);
    assert!(source.is_none());
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"]["code"], "MISDIRECTED_REQUEST");
    assert_eq!(h.origin.fetches.load(Ordering::SeqCst), before);

    // Absolute-form targets naming the shell itself are still served
    let (status, source, _) = send(&h.router, get("http://localhost:8080/app.js")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.as_deref(), Some("hit"));
}

#[tokio::test]
async fn test_open_redirects_to_viewer() {
    let h = harness();

    let response = h
        .router
        .clone()
        .oneshot(get("/_shell/open?file=%2Ffiles%2Fcontract.pdf"))
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/web/viewer.html?file=%2Ffiles%2Fcontract.pdf#zoom=page-width"
    );
}

#[tokio::test]
async fn test_update_and_status() {
    let h = harness();

    let request = Request::builder()
        .method("POST")
        .uri("/_shell/update")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["lifecycle"]["state"], "active");

    let (status, _, body) = send(&h.router, get("/_shell/status")).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["lifecycle"]["active"], "turbosign-v1.0.0");
    assert_eq!(json["stores"][0]["handle"], "turbosign-v1.0.0");
    assert_eq!(json["stores"][0]["entries"], 2);
}

#[tokio::test]
async fn test_failed_update_reports_install_failure() {
    let h = harness();
    h.origin.offline.store(true, Ordering::SeqCst);

    let request = Request::builder()
        .method("POST")
        .uri("/_shell/update")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&h.router, request).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"]["code"], "INSTALL_FAILED");
}
