//! Performance telemetry ingest and analyst guidance readout.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use pressroom_db::{NewPerformanceRecord, PerformanceRecordRow};

use crate::middleware::RequestId;
use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub struct PerformanceListQuery {
    pub site: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub site: String,
    /// Attributes the record to a pipeline run, when known.
    pub run_public_id: Option<Uuid>,
    pub channel: String,
    pub format: String,
    pub posted_at: DateTime<Utc>,
    pub impressions: i64,
    pub engagements: i64,
}

#[derive(Debug, Serialize)]
pub struct PerformanceItem {
    pub site_slug: String,
    pub channel: String,
    pub format: String,
    pub posted_at: DateTime<Utc>,
    pub impressions: i64,
    pub engagements: i64,
    pub engagement_rate: f32,
    pub grade: Option<String>,
}

impl From<PerformanceRecordRow> for PerformanceItem {
    fn from(row: PerformanceRecordRow) -> Self {
        Self {
            site_slug: row.site_slug,
            channel: row.channel,
            format: row.format,
            posted_at: row.posted_at,
            impressions: row.impressions,
            engagements: row.engagements,
            engagement_rate: row.engagement_rate,
            grade: row.grade,
        }
    }
}

pub async fn list_performance(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<PerformanceListQuery>,
) -> Result<Json<ApiResponse<Vec<PerformanceItem>>>, ApiError> {
    let rows = pressroom_db::list_performance_history(
        &state.pool,
        &query.site,
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(PerformanceItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub async fn ingest_performance(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<ApiResponse<PerformanceItem>>, ApiError> {
    if state.sites.by_slug(&request.site).is_none() {
        return Err(ApiError::new(
            req_id.0,
            "bad_request",
            format!("unknown site '{}'", request.site),
        ));
    }
    if request.impressions < 0 || request.engagements < 0 {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "impressions and engagements must be non-negative",
        ));
    }

    let pipeline_run_id = match request.run_public_id {
        Some(public_id) => {
            let run = pressroom_db::get_pipeline_run_by_public_id(&state.pool, public_id)
                .await
                .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
            Some(run.id)
        }
        None => None,
    };

    let record = NewPerformanceRecord {
        site_slug: request.site,
        pipeline_run_id,
        channel: request.channel,
        format: request.format,
        posted_at: request.posted_at,
        impressions: request.impressions,
        engagements: request.engagements,
    };
    let row = pressroom_db::insert_performance_record(&state.pool, &record)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: PerformanceItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub struct GuidanceQuery {
    pub site: String,
}

#[derive(Debug, Serialize)]
pub struct GuidanceData {
    pub site_slug: String,
    /// `null` until the analyst has completed at least one run.
    pub guidance: Option<Value>,
}

pub async fn get_guidance(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<GuidanceQuery>,
) -> Result<Json<ApiResponse<GuidanceData>>, ApiError> {
    let guidance = pressroom_db::latest_guidance(&state.pool, &query.site)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: GuidanceData {
            site_slug: query.site,
            guidance,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
