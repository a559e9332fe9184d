//! Pipeline-run endpoints: on-demand full runs and run history.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use pressroom_db::PipelineRunRow;
use pressroom_pipeline::{
    run_full, Diagnosis, FullRunDeps, FullRunOutcome, Phase, RunStep, StagingPublisher,
};

use crate::middleware::RequestId;
use super::{
    map_db_error, map_pipeline_error, normalize_limit, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub site: String,
    pub keyword: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResult {
    pub run_public_id: Uuid,
    pub draft_public_id: Option<Uuid>,
    pub outcome: &'static str,
    /// Terminal or paused phase, when the pipeline got that far.
    pub phase: Option<String>,
    pub diagnosis: Option<Diagnosis>,
    pub steps: Vec<RunStep>,
}

pub async fn generate(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<ApiResponse<GenerateResult>>, ApiError> {
    let publisher = StagingPublisher;
    let deps = FullRunDeps {
        generator: state.generator.as_ref(),
        publisher: &publisher,
        indexer: state.indexer.as_deref(),
    };

    let report = run_full(
        &state.pool,
        &state.sites,
        &deps,
        &state.config,
        &request.site,
        request.keyword.as_deref(),
        "api",
    )
    .await
    .map_err(|e| map_pipeline_error(req_id.0.clone(), &e, Phase::Research))?;

    let (outcome, phase, diagnosis) = match report.outcome {
        FullRunOutcome::Completed { phase } => ("completed", Some(phase.to_string()), None),
        FullRunOutcome::Paused { phase } => ("paused", Some(phase.to_string()), None),
        FullRunOutcome::Failed { diagnosis } => ("failed", None, Some(diagnosis)),
    };

    Ok(Json(ApiResponse {
        data: GenerateResult {
            run_public_id: report.run_public_id,
            draft_public_id: report.draft_public_id,
            outcome,
            phase,
            diagnosis,
            steps: report.steps,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub struct RunListQuery {
    pub site: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RunItem {
    pub public_id: Uuid,
    pub site_slug: String,
    pub run_type: String,
    pub trigger_source: String,
    pub status: String,
    pub steps: Option<Value>,
    pub result_summary: Option<String>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<PipelineRunRow> for RunItem {
    fn from(row: PipelineRunRow) -> Self {
        Self {
            public_id: row.public_id,
            site_slug: row.site_slug,
            run_type: row.run_type,
            trigger_source: row.trigger_source,
            status: row.status,
            steps: row.steps,
            result_summary: row.result_summary,
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
        }
    }
}

pub async fn list_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RunListQuery>,
) -> Result<Json<ApiResponse<Vec<RunItem>>>, ApiError> {
    let rows = pressroom_db::list_pipeline_runs(
        &state.pool,
        query.site.as_deref(),
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(RunItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub async fn get_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(public_id): Path<Uuid>,
) -> Result<Json<ApiResponse<RunItem>>, ApiError> {
    let row = pressroom_db::get_pipeline_run_by_public_id(&state.pool, public_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: RunItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}
