use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::admission::QueueStatus;
use crate::model::{Course, CourseId, Enrollment, EnrollmentRequest, UserId};
use crate::pipeline::Pipeline;
use crate::store::EnrollmentStore;

use super::ApiError;

/// Shared state of one backend instance.
#[derive(Clone)]
pub struct InstanceState {
    pub pipeline: Arc<Pipeline>,
    pub port: u16,
}

/// Routes of one backend instance under `/api`.
pub fn instance_router(state: InstanceState) -> Router {
    Router::new()
        .route("/api/enroll", post(enroll))
        .route("/api/courses", get(list_courses).post(create_course))
        .route("/api/courses/{id}", get(get_course))
        .route("/api/enrollments/user/{user_id}", get(user_enrollments))
        .route("/api/queue/status", get(queue_status))
        .route("/api/queue/max-concurrent", post(set_max_concurrent))
        .route("/api/health", get(health))
        .with_state(state)
}

async fn enroll(
    State(state): State<InstanceState>,
    Json(request): Json<EnrollmentRequest>,
) -> Result<Json<Value>, ApiError> {
    tracing::debug!(port = state.port, ?request, "enrollment request received");
    state.pipeline.submit(request)?;
    Ok(Json(json!({
        "status": "queued",
        "message": "Request added to queue",
        "serverPort": state.port,
    })))
}

async fn list_courses(State(state): State<InstanceState>) -> Result<Json<Vec<Course>>, ApiError> {
    Ok(Json(state.pipeline.store().courses().await?))
}

async fn get_course(
    State(state): State<InstanceState>,
    Path(id): Path<CourseId>,
) -> Result<Json<Course>, ApiError> {
    state
        .pipeline
        .store()
        .course(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

#[derive(Deserialize)]
struct NewCourse {
    name: String,
    capacity: u32,
}

async fn create_course(
    State(state): State<InstanceState>,
    Json(body): Json<NewCourse>,
) -> Result<Json<Course>, ApiError> {
    let course = state
        .pipeline
        .store()
        .insert_course(&body.name, body.capacity)
        .await?;
    tracing::info!(id = course.id(), name = course.name(), capacity = course.capacity(), "course created");
    Ok(Json(course))
}

async fn user_enrollments(
    State(state): State<InstanceState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<Enrollment>>, ApiError> {
    Ok(Json(
        state.pipeline.store().enrollments_for_user(user_id).await?,
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    #[serde(flatten)]
    status: QueueStatus,
    server_port: u16,
}

async fn queue_status(State(state): State<InstanceState>) -> Json<StatusBody> {
    Json(StatusBody {
        status: state.pipeline.status(),
        server_port: state.port,
    })
}

fn default_max() -> usize {
    10
}

#[derive(Deserialize)]
struct MaxConcurrent {
    #[serde(default = "default_max")]
    max: usize,
}

async fn set_max_concurrent(
    State(state): State<InstanceState>,
    Json(body): Json<MaxConcurrent>,
) -> Json<Value> {
    state.pipeline.set_limit(body.max);
    Json(json!({
        "maxConcurrentRequests": body.max,
        "message": "Max concurrent requests updated",
    }))
}

async fn health(State(state): State<InstanceState>) -> Json<Value> {
    Json(json!({ "status": "UP", "serverPort": state.port }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn app() -> (Arc<Pipeline>, Router) {
        let store = MemoryStore::new();
        store.insert_course("Java Programming", 100).await.unwrap();
        let pipeline = Pipeline::builder(Config::default())
            .with_store(Arc::new(store))
            .build();
        let router = instance_router(InstanceState {
            pipeline: pipeline.clone(),
            port: 8081,
        });
        (pipeline, router)
    }

    async fn call(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_enroll_is_queued_and_processed() {
        let (pipeline, router) = app().await;
        let (status, body) = call(
            &router,
            post_json("/api/enroll", r#"{"userId":1,"courseId":1,"priority":5}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "queued");
        assert_eq!(body["message"], "Request added to queue");
        assert_eq!(body["serverPort"], 8081);

        pipeline.wait_idle().await;
        let (_, course) = call(&router, get_req("/api/courses/1")).await;
        assert_eq!(course["currentEnrollment"], 1);
        let (_, mine) = call(&router, get_req("/api/enrollments/user/1")).await;
        assert_eq!(mine[0]["status"], "SUCCESS");
        assert!(mine[0]["enrolledAt"].as_str().is_some_and(|t| t.contains('T')));
        pipeline.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_course_crud() {
        let (pipeline, router) = app().await;
        let (status, _) = call(&router, get_req("/api/courses/99")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, created) = call(
            &router,
            post_json("/api/courses", r#"{"name":"Spring Boot","capacity":50}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["id"], 2);
        assert_eq!(created["currentEnrollment"], 0);

        let (_, all) = call(&router, get_req("/api/courses")).await;
        assert_eq!(all.as_array().unwrap().len(), 2);
        pipeline.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_queue_endpoints() {
        let (pipeline, router) = app().await;
        let (_, status) = call(&router, get_req("/api/queue/status")).await;
        assert_eq!(status["maxConcurrentRequests"], 20);
        assert_eq!(status["queueSize"], 0);
        assert_eq!(status["serverPort"], 8081);

        let (_, body) = call(&router, post_json("/api/queue/max-concurrent", "{}")).await;
        assert_eq!(body["maxConcurrentRequests"], 10);
        assert_eq!(pipeline.status().max_concurrent_requests, 10);

        call(&router, post_json("/api/queue/max-concurrent", r#"{"max":300}"#)).await;
        assert_eq!(pipeline.status().max_concurrent_requests, 300);

        let (_, health) = call(&router, get_req("/api/health")).await;
        assert_eq!(health, json!({ "status": "UP", "serverPort": 8081 }));
        pipeline.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_enroll_after_shutdown_is_unavailable() {
        let (pipeline, router) = app().await;
        pipeline.shutdown().await.unwrap();
        let (status, body) = call(
            &router,
            post_json("/api/enroll", r#"{"userId":1,"courseId":1,"priority":0}"#),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "pipeline is shut down");
    }
}
