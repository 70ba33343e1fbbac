//! Compatibility layer for clients of the original service, which echoed the
//! status code inside every successful body (`[<body>, 200]`), answered a
//! missing id with the bare string `"404"` and sent no body on writes.

use anyhow::Context;
use axum::{
    Json,
    body::Body,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::error::AppResult;

pub async fn original_shapes(request: Request, next: Next) -> AppResult<Response> {
    let response = next.run(request).await;

    let reshaped = match response.status() {
        StatusCode::OK => {
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .context("buffering response body")?;
            let value: Value = serde_json::from_slice(&bytes).context("decoding response body")?;
            (StatusCode::OK, Json(json!([value, 200]))).into_response()
        }
        StatusCode::NOT_FOUND => (StatusCode::NOT_FOUND, Json("404")).into_response(),
        status @ (StatusCode::CREATED | StatusCode::NO_CONTENT) => {
            (status, Body::empty()).into_response()
        }
        _ => response,
    };

    Ok(reshaped)
}
