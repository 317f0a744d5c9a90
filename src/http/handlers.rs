use crate::error::JobError;
use crate::jobs::types::{JobRequest, JobSummary};
use crate::node::NodeContext;
use crate::ring::Identifier;

use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Serialize;
use std::sync::Arc;

const DASHBOARD_HTML: &str = include_str!("dashboard.html");

pub fn router(ctx: Arc<NodeContext>) -> Router {
    Router::new()
        .route("/", get(handle_dashboard))
        .route("/status", get(handle_status))
        .route("/finger", get(handle_finger))
        .route("/buckets", get(handle_buckets))
        .route("/add_job", post(handle_add_job))
        .route("/job_status/:job_id", get(handle_job_status))
        .route("/jobs", get(handle_local_jobs))
        .route("/all_jobs", get(handle_all_jobs))
        .layer(Extension(ctx))
}

async fn handle_dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    chord: &'static str,
    minio: &'static str,
    #[serde(rename = "minioAddress")]
    minio_address: String,
}

async fn handle_status(Extension(ctx): Extension<Arc<NodeContext>>) -> Json<StatusResponse> {
    let chord = if ctx.chord.is_online().await {
        "online"
    } else {
        "offline"
    };
    let minio = match ctx.object_store.list_buckets().await {
        Ok(_) => "online",
        Err(_) => "offline",
    };
    Json(StatusResponse {
        chord,
        minio,
        minio_address: ctx.config.object_store_endpoint.clone(),
    })
}

#[derive(Debug, Serialize)]
struct FingerResponse {
    finger: Vec<String>,
}

async fn handle_finger(Extension(ctx): Extension<Arc<NodeContext>>) -> Json<FingerResponse> {
    let finger = ctx
        .chord
        .finger_ids()
        .await
        .into_iter()
        .map(|id| id.to_string())
        .collect();
    Json(FingerResponse { finger })
}

#[derive(Debug, Serialize)]
struct BucketsResponse {
    buckets: Vec<String>,
}

async fn handle_buckets(
    Extension(ctx): Extension<Arc<NodeContext>>,
) -> Result<Json<BucketsResponse>, (StatusCode, String)> {
    match ctx.object_store.list_buckets().await {
        Ok(buckets) => Ok(Json(BucketsResponse { buckets })),
        Err(e) => Err((StatusCode::BAD_GATEWAY, e.to_string())),
    }
}

#[derive(Debug, Serialize)]
struct AddJobResponse {
    job_id: String,
}

async fn handle_add_job(
    Extension(ctx): Extension<Arc<NodeContext>>,
    Json(request): Json<JobRequest>,
) -> Result<Json<AddJobResponse>, (StatusCode, String)> {
    match ctx.jobs.submit(request).await {
        Ok((job_id, _state)) => Ok(Json(AddJobResponse {
            job_id: job_id.to_string(),
        })),
        Err(e) => Err((job_error_status(&e), e.to_string())),
    }
}

#[derive(Debug, Serialize)]
struct JobStatusResponse {
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn handle_job_status(
    Extension(ctx): Extension<Arc<NodeContext>>,
    axum::extract::Path(job_id): axum::extract::Path<String>,
) -> Result<Json<JobStatusResponse>, (StatusCode, String)> {
    let job_id: Identifier = job_id
        .parse()
        .map_err(|_| (StatusCode::BAD_REQUEST, "malformed job id".to_string()))?;

    match ctx.jobs.status(job_id).await {
        Ok(view) => Ok(Json(JobStatusResponse {
            state: view.state.name(),
            progress: view.state.progress(),
            result: view.result,
            error: view.error,
        })),
        Err(e) => Err((job_error_status(&e), e.to_string())),
    }
}

#[derive(Debug, Serialize)]
struct JobListResponse {
    jobs: Vec<JobSummaryResponse>,
}

#[derive(Debug, Serialize)]
struct JobSummaryResponse {
    job_id: String,
    task: String,
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<u8>,
    submitted_at: u64,
}

impl From<JobSummary> for JobSummaryResponse {
    fn from(job: JobSummary) -> Self {
        Self {
            job_id: job.job_id.to_string(),
            task: job.task.to_string(),
            state: job.state.name(),
            progress: job.state.progress(),
            submitted_at: job.submitted_at,
        }
    }
}

async fn handle_local_jobs(Extension(ctx): Extension<Arc<NodeContext>>) -> Json<JobListResponse> {
    let jobs = ctx
        .jobs
        .list_local_jobs()
        .into_iter()
        .map(JobSummaryResponse::from)
        .collect();
    Json(JobListResponse { jobs })
}

async fn handle_all_jobs(Extension(ctx): Extension<Arc<NodeContext>>) -> Json<JobListResponse> {
    let jobs = ctx
        .jobs
        .all_jobs()
        .await
        .into_iter()
        .map(JobSummaryResponse::from)
        .collect();
    Json(JobListResponse { jobs })
}

fn job_error_status(e: &JobError) -> StatusCode {
    match e {
        JobError::UnknownTask(_) => StatusCode::BAD_REQUEST,
        JobError::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
        JobError::Routing(_) | JobError::Transport(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
