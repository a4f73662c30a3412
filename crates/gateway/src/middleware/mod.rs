//! Request middleware

use axum::{
    extract::{MatchedPath, Request},
    http::header::CONTENT_LENGTH,
    middleware::Next,
    response::{IntoResponse, Response},
};
use medrag_common::{errors::AppError, metrics::RequestMetrics};

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Reject requests whose declared body exceeds `MAX_BODY_BYTES`
pub async fn content_length_limit(request: Request, next: Next) -> Response {
    let declared = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());

    if let Some(size) = declared.filter(|&size| size > MAX_BODY_BYTES) {
        return AppError::PayloadTooLarge {
            size,
            limit: MAX_BODY_BYTES,
        }
        .into_response();
    }

    next.run(request).await
}

/// Count and time every request by route
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let metrics = RequestMetrics::start(request.method().as_str(), &endpoint);

    let response = next.run(request).await;
    metrics.finish(response.status().as_u16());
    response
}
