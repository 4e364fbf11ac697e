//! Running calls and shaping their HTTP responses.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use stmap_common::{StmapError, StmapResult};
use stmap_core::Call;
use tracing::{info, warn};

use crate::metrics;
use crate::state::AppState;

/// Run `work` on the blocking pool, giving up after `timeout`.
///
/// On timeout the task keeps running until it finishes on its own; its
/// result is discarded.
pub async fn run_blocking<T, F>(timeout: Duration, work: F) -> StmapResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StmapResult<T> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(work);
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(StmapError::InternalError(format!(
            "request worker failed: {}",
            join_error
        ))),
        Err(_) => Err(StmapError::Timeout(timeout.as_secs())),
    }
}

/// Serve `call` from the cache or the pipeline.
pub async fn execute(state: Arc<AppState>, call: Call) -> Response {
    let start = Instant::now();
    let operation = call.operation_name().unwrap_or_else(|_| "unknown".to_string());
    metrics::record_request(&operation);

    let key = call.cache_key();
    if let Some((body, content_type)) = state.cache.get(&key).await {
        metrics::record_cache_hit();
        metrics::record_duration(&operation, start.elapsed());
        return body_response(body, content_type);
    }
    metrics::record_cache_miss();

    let dispatcher = state.dispatcher.clone();
    let result = run_blocking(state.config.default_timeout, move || {
        dispatcher.dispatch(&call)?.into_encoded()
    })
    .await;
    metrics::record_duration(&operation, start.elapsed());

    match result {
        Ok((body, content_type)) => {
            let body = Bytes::from(body);
            info!(
                operation = %operation,
                bytes = body.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "request served"
            );
            state.cache.put(key, body.clone(), content_type).await;
            body_response(body, content_type)
        }
        Err(err) => error_response(&err),
    }
}

pub fn body_response(body: Bytes, content_type: &'static str) -> Response {
    ([(header::CONTENT_TYPE, content_type)], body).into_response()
}

/// The error payload with its mapped status code.
pub fn error_response(err: &StmapError) -> Response {
    metrics::record_error(err.kind());
    let status = StatusCode::from_u16(err.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        warn!(kind = err.kind(), error = %err, "request failed");
    } else {
        info!(kind = err.kind(), error = %err, "request rejected");
    }
    (status, axum::Json(err.payload())).into_response()
}
