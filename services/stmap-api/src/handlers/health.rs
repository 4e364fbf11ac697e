//! Health and metrics handlers.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::metrics::update_cache_gauges;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub data_path: String,
}

/// GET /health - Basic health check
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /ready - Readiness check (the data root is readable)
pub async fn ready_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    let ready = state.config.data_path.is_dir();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = ReadyResponse {
        ready,
        data_path: state.config.data_path.display().to_string(),
    };
    (status, Json(body)).into_response()
}

/// GET /metrics - Prometheus metrics
pub async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    let Some(handle) = &state.prometheus else {
        return (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response();
    };
    update_cache_gauges(state.cache.stats());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "ok");
    }
}
