use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use bytes::Bytes;
use serde_json::{Value, json};

use crate::dispatch::{Dispatcher, ProxyResponse};
use crate::model::{CourseId, EnrollmentRequest};

/// Routes of the edge proxy under `/lb`.
pub fn edge_router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/lb/enroll", post(enroll))
        .route("/lb/courses", get(courses))
        .route("/lb/courses/{id}", get(course))
        .route("/lb/queue/status", get(queue_status))
        .route("/lb/servers", get(servers))
        .with_state(dispatcher)
}

async fn enroll(
    State(d): State<Arc<Dispatcher>>,
    Json(request): Json<EnrollmentRequest>,
) -> ProxyResponse {
    tracing::debug!(?request, "edge received enrollment");
    match serde_json::to_vec(&request) {
        Ok(body) => d.forward("/api/enroll", Some(Bytes::from(body))).await,
        Err(err) => ProxyResponse::unavailable(err),
    }
}

async fn courses(State(d): State<Arc<Dispatcher>>) -> ProxyResponse {
    d.forward("/api/courses", None).await
}

async fn course(State(d): State<Arc<Dispatcher>>, Path(id): Path<CourseId>) -> ProxyResponse {
    d.forward(&format!("/api/courses/{id}"), None).await
}

async fn queue_status(State(d): State<Arc<Dispatcher>>) -> ProxyResponse {
    d.forward("/api/queue/status", None).await
}

async fn servers(State(d): State<Arc<Dispatcher>>) -> Json<Value> {
    Json(json!({ "servers": d.targets() }))
}
