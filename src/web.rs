//! REST + SSE boundary for the job system.
//!
//! Request validation lives here, not in the registry: the boundary rejects
//! bad subjects synchronously, the core never stores validation failures.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::ValidationError;
use crate::events::Event;
use crate::registry::{JobRecord, JobRegistry, JobState};
use crate::runner::{self, Workload};
use crate::stream::stream_job;

/// Maximum subject length accepted at the boundary.
pub const MAX_SUBJECT_LEN: usize = 100;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<JobRegistry>,
    pub workload: Arc<dyn Workload>,
    pub config: AppConfig,
}

/// Build the axum router.
pub fn job_routes(
    registry: Arc<JobRegistry>,
    workload: Arc<dyn Workload>,
    config: AppConfig,
) -> Router {
    let state = AppState {
        registry,
        workload,
        config,
    };

    Router::new()
        .route("/health", get(health))
        .route("/research", post(start_research))
        .route("/api/jobs/{id}", get(job_status))
        .route("/api/jobs/{id}/events", get(job_events))
        .route("/stream/{id}", get(stream_handler))
        .route("/report/{id}", get(get_report))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Validate a subject at the boundary. The registry itself never validates.
pub fn validate_subject(subject: &str) -> Result<String, ValidationError> {
    let subject = subject.trim();
    if subject.is_empty() {
        return Err(ValidationError::EmptySubject);
    }
    if subject.len() > MAX_SUBJECT_LEN {
        return Err(ValidationError::SubjectTooLong {
            length: subject.len(),
            max: MAX_SUBJECT_LEN,
        });
    }
    Ok(subject.to_string())
}

fn error_response(status: StatusCode, message: impl std::fmt::Display) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.to_string() })),
    )
        .into_response()
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "jobstream"
    }))
}

// ── Job creation ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ResearchRequest {
    pub subject: String,
}

#[derive(Debug, Serialize)]
pub struct ResearchResponse {
    pub job_id: Uuid,
    pub subject: String,
}

async fn start_research(
    State(state): State<AppState>,
    Json(req): Json<ResearchRequest>,
) -> Response {
    let subject = match validate_subject(&req.subject) {
        Ok(subject) => subject,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };

    let job_id = state.registry.create(subject.clone()).await;
    runner::spawn_job(
        Arc::clone(&state.registry),
        Arc::clone(&state.workload),
        subject.clone(),
        job_id,
        state.config.output_dir.clone(),
    );

    info!(job_id = %job_id, subject = %subject, "Research job accepted");
    (
        StatusCode::ACCEPTED,
        Json(ResearchResponse { job_id, subject }),
    )
        .into_response()
}

// ── Job status ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub id: Uuid,
    pub subject: String,
    pub state: JobState,
    pub logs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<String>,
}

impl From<JobRecord> for JobStatusResponse {
    fn from(job: JobRecord) -> Self {
        Self {
            id: job.id,
            subject: job.subject,
            state: job.state,
            logs: job.logs,
            error_message: job.error_message,
            result_path: job.result_path,
        }
    }
}

async fn job_status(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.registry.get(id).await {
        Some(job) => Json(JobStatusResponse::from(job)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, ValidationError::JobNotFound { id }),
    }
}

#[derive(Debug, Serialize)]
pub struct JobEventsResponse {
    pub id: Uuid,
    pub events: Vec<Event>,
}

async fn job_events(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.registry.get(id).await {
        Some(job) => Json(JobEventsResponse {
            id,
            events: job.events,
        })
        .into_response(),
        None => error_response(StatusCode::NOT_FOUND, ValidationError::JobNotFound { id }),
    }
}

// ── Streaming ───────────────────────────────────────────────────────────

async fn stream_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    info!(job_id = %id, "Stream client connected");
    let updates = stream_job(Arc::clone(&state.registry), id, state.config.poll_interval);
    let events = updates.map(|update| {
        Ok::<_, Infallible>(
            SseEvent::default()
                .event(update.event_name())
                .data(update.payload()),
        )
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

// ── Report fetch ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub subject: String,
    pub markdown: String,
}

async fn get_report(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let Some(job) = state.registry.get(id).await else {
        return error_response(StatusCode::NOT_FOUND, ValidationError::JobNotFound { id });
    };

    if job.state != JobState::Completed {
        return error_response(
            StatusCode::BAD_REQUEST,
            ValidationError::JobNotCompleted { id },
        );
    }

    let Some(result_path) = job.result_path else {
        return error_response(
            StatusCode::NOT_FOUND,
            ValidationError::ReportUnavailable { id },
        );
    };

    match tokio::fs::read_to_string(&result_path).await {
        Ok(markdown) => Json(ReportResponse {
            subject: job.subject,
            markdown,
        })
        .into_response(),
        Err(_) => error_response(
            StatusCode::NOT_FOUND,
            ValidationError::ReportUnavailable { id },
        ),
    }
}
