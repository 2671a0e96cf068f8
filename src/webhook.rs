//! Webhook receiver for asynchronous transcription backends.
//!
//! Vendors deliver finished transcripts here out-of-band; the handler writes
//! them into the shared [`JobStore`] under the normalized id the submission
//! returned, where the submitting run's poll loop picks them up.

use crate::backend::JobStore;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Build the webhook router.
pub fn router(jobs: Arc<JobStore>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/jobs", get(jobs_list))
        .route("/webhooks/transcription", post(deliver))
        .layer(cors)
        .with_state(jobs)
}

/// Bind the webhook listener on `host:port` and serve it in the background.
///
/// Returns once the socket is bound, so callers can submit jobs knowing the
/// callback target is reachable.
pub async fn spawn_listener(
    host: &str,
    port: u16,
    jobs: Arc<JobStore>,
) -> crate::error::Result<tokio::task::JoinHandle<()>> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Webhook receiver listening on http://{}", addr);

    let app = router(jobs);
    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!("Webhook receiver stopped: {}", e);
        }
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn jobs_list(State(jobs): State<Arc<JobStore>>) -> impl IntoResponse {
    Json(jobs.snapshot().await)
}

/// Accept one delivered result.
///
/// The job id is taken from `metadata.request_id` (Deepgram's shape) with a
/// top-level `request_id` fallback. Deliveries carrying an `error` field mark
/// the job failed instead of completed.
async fn deliver(
    State(jobs): State<Arc<JobStore>>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    let job_id = payload["metadata"]["request_id"]
        .as_str()
        .or_else(|| payload["request_id"].as_str())
        .map(|id| id.to_string());

    let Some(job_id) = job_id else {
        warn!("Webhook delivery without a request id, dropping");
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "missing request_id" })),
        );
    };

    if let Some(reason) = payload["error"].as_str() {
        info!("Webhook delivery failed job {}: {}", job_id, reason);
        jobs.fail(&job_id, reason).await;
    } else {
        info!("Webhook delivery completed job {}", job_id);
        jobs.complete(&job_id, payload).await;
    }

    (StatusCode::OK, Json(json!({ "status": "accepted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::JobState;
    use serde_json::json;

    #[tokio::test]
    async fn test_delivery_completes_job_under_normalized_id() {
        let jobs = Arc::new(JobStore::new());
        jobs.create("abc-123").await;

        let payload = json!({
            "metadata": { "request_id": "ABC-123" },
            "results": {}
        });

        deliver(State(Arc::clone(&jobs)), Json(payload)).await;

        assert!(matches!(
            jobs.state("abc-123").await,
            Some(JobState::Completed(_))
        ));
    }

    #[tokio::test]
    async fn test_error_delivery_fails_job() {
        let jobs = Arc::new(JobStore::new());
        jobs.create("abc").await;

        let payload = json!({ "request_id": "abc", "error": "media unreadable" });
        deliver(State(Arc::clone(&jobs)), Json(payload)).await;

        match jobs.state("abc").await {
            Some(JobState::Failed(reason)) => assert_eq!(reason, "media unreadable"),
            other => panic!("unexpected state: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delivery_without_id_changes_nothing() {
        let jobs = Arc::new(JobStore::new());
        jobs.create("abc").await;

        deliver(State(Arc::clone(&jobs)), Json(json!({ "results": {} }))).await;

        assert!(matches!(jobs.state("abc").await, Some(JobState::Pending)));
        assert_eq!(jobs.len().await, 1);
    }
}
