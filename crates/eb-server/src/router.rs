//! Axum router construction.

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::routes;

/// Build the front-door router.
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/healthz", get(routes::health::healthz))
        .route(
            "/encode",
            post(routes::encode::encode).options(routes::health::preflight),
        )
        .route("/dapr/subscribe", get(routes::subscribe::subscriptions))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use eb_av::{ToolRegistry, FFMPEG};
    use eb_core::config::Config;
    use eb_storage::LocalStore;

    use crate::notifier::LogNotifier;

    fn test_context(config: Config) -> (tempfile::TempDir, AppContext) {
        let root = tempfile::tempdir().unwrap();
        let ctx = AppContext::new(
            config,
            Arc::new(LocalStore::new(root.path())),
            Arc::new(ToolRegistry::with_paths([(FFMPEG, PathBuf::from("nonexistent_ffmpeg_xyz"))])),
            Arc::new(LogNotifier),
            CancellationToken::new(),
        );
        (root, ctx)
    }

    async fn body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let (_root, ctx) = test_context(Config::default());
        let response = build_router(ctx)
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn encode_preflight() {
        let (_root, ctx) = test_context(Config::default());
        let response = build_router(ctx)
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/encode")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_request_is_rejected() {
        let (_root, ctx) = test_context(Config::default());
        let response = build_router(ctx)
            .oneshot(
                Request::post("/encode")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"jobId":"j1","audiosKeys":[]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response.into_body()).await;
        assert_eq!(json["code"], "validation_error");
        assert_eq!(json["error"], "Validation error: no audio track provided");
    }

    #[tokio::test]
    async fn missing_asset_is_download_error() {
        let mut config = Config::default();
        config.storage.max_retry = 0;
        config.storage.retry_base_secs = 0;
        let (_root, ctx) = test_context(config);

        let response = build_router(ctx)
            .oneshot(
                Request::post("/encode")
                    .body(Body::from(r#"{"jobId":"j1","audiosKeys":["missing.mp3"]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response.into_body()).await;
        assert_eq!(json["code"], "download_error");
    }

    #[tokio::test]
    async fn subscription_follows_request_topic() {
        let (_root, ctx) = test_context(Config::default());
        let response = build_router(ctx)
            .oneshot(Request::get("/dapr/subscribe").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response.into_body()).await, serde_json::json!([]));

        let mut config = Config::default();
        config.server.request_topic = "encode-requests".into();
        config.pubsub.component = "pubsub".into();
        let (_root, ctx) = test_context(config);
        let response = build_router(ctx)
            .oneshot(Request::get("/dapr/subscribe").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            body_json(response.into_body()).await,
            serde_json::json!([{
                "pubsubname": "pubsub",
                "topic": "encode-requests",
                "route": "/encode"
            }])
        );
    }
}
