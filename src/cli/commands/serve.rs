//! Serve command - transcription service with webhook receiver.
//!
//! Hosts the webhook endpoint async backends deliver to, plus a small REST
//! surface for submitting transcription runs. The job store is shared across
//! all concurrent runs in the process and swept periodically.

use crate::backend::{BackendKind, JobStore};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::{MediaSource, Pipeline, RunConfig};
use crate::webhook;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state.
struct AppState {
    settings: Settings,
    jobs: Arc<JobStore>,
}

/// Run the HTTP service.
pub async fn run_serve(
    host: Option<&str>,
    port: Option<u16>,
    settings: Settings,
) -> anyhow::Result<()> {
    let host = host.unwrap_or(&settings.webhook.host).to_string();
    let port = port.unwrap_or(settings.webhook.port);

    let jobs = Arc::new(JobStore::new());
    jobs.spawn_eviction_sweep(
        Duration::from_secs(settings.webhook.sweep_interval_seconds),
        Duration::from_secs(settings.webhook.job_ttl_seconds),
    );

    let state = Arc::new(AppState {
        settings,
        jobs: Arc::clone(&jobs),
    });

    let app = Router::new()
        .route("/transcribe", post(transcribe))
        .with_state(state)
        .merge(webhook::router(jobs));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Saum Service");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Transcribe", "POST /transcribe");
    Output::kv("Webhook", "POST /webhooks/transcription");
    println!();
    Output::info("Press Ctrl+C to stop the service.");

    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Deserialize)]
struct TranscribeRequest {
    /// Local file path or direct media URL.
    input: String,
    /// Provider override (whisper, gpt4o, deepgram).
    provider: Option<String>,
    /// Language hint override.
    language: Option<String>,
    /// Force chunking below the duration threshold.
    #[serde(default)]
    chunk: bool,
    /// Run the correction pass.
    #[serde(default)]
    correct: bool,
    /// Extract keyterms as accuracy hints.
    #[serde(default)]
    keyterms: bool,
}

async fn transcribe(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TranscribeRequest>,
) -> impl IntoResponse {
    let mut settings = state.settings.clone();

    if let Some(provider) = &request.provider {
        match provider.parse::<BackendKind>() {
            Ok(kind) => settings.transcription.provider = kind,
            Err(e) => {
                return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "error": e })));
            }
        }
    }
    if let Some(language) = &request.language {
        settings.transcription.language = Some(language.clone());
    }
    settings.correction.enabled |= request.correct;
    settings.transcription.keyterms |= request.keyterms;

    let source = match MediaSource::parse(&request.input) {
        Ok(source) => source,
        Err(e) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };

    let pipeline = match Pipeline::with_job_store(settings.clone(), Arc::clone(&state.jobs)) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };

    let mut config = RunConfig::from_settings(&settings);
    config.force_chunking = request.chunk;

    match pipeline.run(source, config).await {
        Ok(result) => (
            StatusCode::OK,
            Json(serde_json::to_value(result).unwrap_or_else(|e| json!({ "error": e.to_string() }))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}
