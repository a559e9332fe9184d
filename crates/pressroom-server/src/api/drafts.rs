//! Draft endpoints: listing, detail, on-demand enhancement.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use pressroom_db::DraftRow;
use pressroom_pipeline::Phase;

use crate::middleware::RequestId;
use super::{
    map_db_error, map_pipeline_error, normalize_limit, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

#[derive(Debug, Deserialize)]
pub struct DraftListQuery {
    pub site: Option<String>,
    pub phase: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DraftSummary {
    pub public_id: Uuid,
    pub site_slug: String,
    pub keyword: String,
    pub locale: String,
    pub phase: String,
    pub sections_completed: i32,
    pub sections_total: i32,
    pub score: Option<i32>,
    pub phase_attempts: i32,
    pub last_error: Option<String>,
    pub rejection_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DraftDetail {
    #[serde(flatten)]
    pub summary: DraftSummary,
    pub research: Option<Value>,
    pub outline: Option<Value>,
    pub body_html: Option<String>,
    pub body_html_alt: Option<String>,
    pub seo: Option<Value>,
    pub readability: Option<f32>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&DraftRow> for DraftSummary {
    fn from(row: &DraftRow) -> Self {
        Self {
            public_id: row.public_id,
            site_slug: row.site_slug.clone(),
            keyword: row.keyword.clone(),
            locale: row.locale.clone(),
            phase: row.phase.clone(),
            sections_completed: row.sections_completed,
            sections_total: row.sections_total,
            score: row.score,
            phase_attempts: row.phase_attempts,
            last_error: row.last_error.clone(),
            rejection_reason: row.rejection_reason.clone(),
            updated_at: row.updated_at,
        }
    }
}

impl From<DraftRow> for DraftDetail {
    fn from(row: DraftRow) -> Self {
        Self {
            summary: DraftSummary::from(&row),
            research: row.research,
            outline: row.outline,
            body_html: row.body_html,
            body_html_alt: row.body_html_alt,
            seo: row.seo,
            readability: row.readability,
            created_at: row.created_at,
            completed_at: row.completed_at,
        }
    }
}

pub async fn list_drafts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<DraftListQuery>,
) -> Result<Json<ApiResponse<Vec<DraftSummary>>>, ApiError> {
    let rows = pressroom_db::list_drafts(
        &state.pool,
        query.site.as_deref(),
        query.phase.as_deref(),
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.iter().map(DraftSummary::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub async fn get_draft(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(public_id): Path<Uuid>,
) -> Result<Json<ApiResponse<DraftDetail>>, ApiError> {
    let row = pressroom_db::get_draft_by_public_id(&state.pool, public_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: DraftDetail::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Serialize)]
pub struct EnhanceResult {
    pub public_id: Uuid,
    pub old_score: i32,
    pub new_score: i32,
    pub promoted: bool,
    pub weaknesses: Vec<String>,
}

pub async fn enhance_draft(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(public_id): Path<Uuid>,
) -> Result<Json<ApiResponse<EnhanceResult>>, ApiError> {
    let report = pressroom_pipeline::enhance_draft(
        &state.pool,
        &state.sites,
        state.generator.as_ref(),
        state.search.as_deref(),
        &state.config,
        public_id,
    )
    .await
    .map_err(|e| map_pipeline_error(req_id.0.clone(), &e, Phase::Reservoir))?;

    Ok(Json(ApiResponse {
        data: EnhanceResult {
            public_id: report.public_id,
            old_score: report.old_score,
            new_score: report.new_score,
            promoted: report.promoted,
            weaknesses: report.weaknesses,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
