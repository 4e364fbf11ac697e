//! The `/api` call endpoint.
//!
//! A call is a flat set of parameters naming an `operation`. It can come
//! from the query string, a form body or a JSON body; keys are
//! case-insensitive.

use std::sync::Arc;

use axum::{
    extract::{Extension, FromRequest, Query, Request},
    http::header,
    response::Response,
    Form, Json,
};
use serde_json::Value;
use stmap_common::StmapError;
use stmap_core::Call;

use crate::handlers::common::{error_response, execute};
use crate::state::AppState;

/// GET /api - call from the query string
pub async fn api_get_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    match Call::from_pairs(pairs) {
        Ok(call) => execute(state, call).await,
        Err(err) => error_response(&err),
    }
}

/// POST /api - call from a JSON or form body
pub async fn api_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    request: Request,
) -> Response {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    let call = if is_json {
        match Json::<Value>::from_request(request, &()).await {
            Ok(Json(value)) => Call::from_value(value),
            Err(rejection) => Err(StmapError::invalid_parameter("request", rejection.body_text())),
        }
    } else {
        match Form::<Vec<(String, String)>>::from_request(request, &()).await {
            Ok(Form(pairs)) => Call::from_pairs(pairs),
            Err(rejection) => Err(StmapError::invalid_parameter("request", rejection.body_text())),
        }
    };

    match call {
        Ok(call) => execute(state, call).await,
        Err(err) => error_response(&err),
    }
}
