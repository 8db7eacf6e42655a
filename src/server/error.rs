use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::dispatch::ProxyResponse;
use crate::error::{RuntimeError, StoreError};

/// Failure of an instance endpoint.
#[derive(Debug)]
pub enum ApiError {
    NotFound,
    Store(StoreError),
    Runtime(RuntimeError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl From<RuntimeError> for ApiError {
    fn from(err: RuntimeError) -> Self {
        ApiError::Runtime(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ApiError::Store(err) => {
                tracing::error!(label = err.as_label(), error = %err, "store failure");
                let status = if err.is_integrity() {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, Json(json!({ "error": err.to_string() }))).into_response()
            }
            ApiError::Runtime(err) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response(),
        }
    }
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}
