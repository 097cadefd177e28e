//! HTTP control surface for a running herd.
//!
//! - `GET /herd` reports the current herd size
//! - `PATCH /herd` resizes it
//! - `GET /metrics` reports success / failure / retry totals
//! - `GET /health` for liveness probes
//!
//! `/metrics` answers with a JSON object (`{"success":..,"failure":..,"retry":..}`)
//! for this herd only, not Prometheus text exposition. Process-wide counters
//! are exported over OTLP when telemetry has an endpoint.

mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;

use crate::engine::HerdControl;
use crate::error::{Error, Result};

pub use handlers::HerdBody;

/// Shared state for the control surface.
#[derive(Clone)]
pub struct AppState {
    pub herd: Arc<dyn HerdControl>,
}

impl AppState {
    pub fn new(herd: impl HerdControl + 'static) -> Self {
        Self {
            herd: Arc::new(herd),
        }
    }
}

/// Create the router with all control routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/herd",
            get(handlers::get_herd).patch(handlers::patch_herd),
        )
        .route("/metrics", get(handlers::get_metrics))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Bind `addr` and serve the control surface until the task is dropped.
pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Config(format!("invalid listen address {addr:?}: {e}")))?;
    let listener = TcpListener::bind(addr).await?;
    serve_with_listener(state, listener).await
}

/// Serve on an already-bound listener.
pub async fn serve_with_listener(state: AppState, listener: TcpListener) -> Result<()> {
    tracing::info!("control surface listening on http://{}", listener.local_addr()?);
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HerdConfig;
    use crate::engine::Herd;
    use crate::model::{Outcome, WorkItem};
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    fn test_herd(herd_size: usize) -> Herd<i32> {
        Herd::new(
            |_: &mut WorkItem<i32>| Outcome::Success,
            HerdConfig::default().herd_size(herd_size),
        )
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn patch(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("PATCH")
            .uri("/herd")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn get_herd_reports_size() {
        let app = create_router(AppState::new(test_herd(15)));

        let response = app
            .oneshot(Request::builder().uri("/herd").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let json = body_json(response).await;
        assert_eq!(json, serde_json::json!({"num": 15, "msg": "success"}));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn patch_herd_resizes() {
        let herd = test_herd(1);
        herd.start();
        let app = create_router(AppState::new(herd.clone()));

        let response = app.oneshot(patch(r#"{"num": 10}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json, serde_json::json!({"num": 10, "msg": "success"}));
        assert_eq!(herd.herd_size(), 10);
    }

    #[tokio::test]
    async fn patch_herd_rejects_negative() {
        let herd = test_herd(3);
        let app = create_router(AppState::new(herd.clone()));

        let response = app.oneshot(patch(r#"{"num": -1}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(
            json,
            serde_json::json!({"num": 3, "msg": "herd size cannot be negative"})
        );
        assert_eq!(herd.herd_size(), 3);
    }

    #[tokio::test]
    async fn patch_herd_same_size_is_noop() {
        let app = create_router(AppState::new(test_herd(4)));

        let response = app.oneshot(patch(r#"{"num": 4}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["num"], 4);
        assert_eq!(json["msg"], "herd size already 4");
    }

    #[tokio::test]
    async fn patch_herd_rejects_malformed_body() {
        let app = create_router(AppState::new(test_herd(2)));

        let response = app.oneshot(patch(r#"{"num": "many"}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["num"], 2);
        assert!(json["msg"].as_str().is_some_and(|m| !m.is_empty()));
    }

    #[tokio::test]
    async fn metrics_start_at_zero() {
        let app = create_router(AppState::new(test_herd(1)));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let json = body_json(response).await;
        assert_eq!(
            json,
            serde_json::json!({"success": 0, "failure": 0, "retry": 0})
        );
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = create_router(AppState::new(test_herd(1)));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
