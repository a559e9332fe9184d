//! Topic intake endpoints.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pressroom_db::TopicRow;

use crate::middleware::RequestId;
use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub struct TopicListQuery {
    pub site: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTopicRequest {
    pub site: String,
    pub keyword: String,
}

#[derive(Debug, Serialize)]
pub struct TopicItem {
    pub public_id: Uuid,
    pub site_slug: String,
    pub keyword: String,
    pub status: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TopicRow> for TopicItem {
    fn from(row: TopicRow) -> Self {
        Self {
            public_id: row.public_id,
            site_slug: row.site_slug,
            keyword: row.keyword,
            status: row.status,
            source: row.source,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub async fn list_topics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<TopicListQuery>,
) -> Result<Json<ApiResponse<Vec<TopicItem>>>, ApiError> {
    let rows = pressroom_db::list_topics(
        &state.pool,
        query.site.as_deref(),
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(TopicItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub async fn create_topic(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<CreateTopicRequest>,
) -> Result<Json<ApiResponse<TopicItem>>, ApiError> {
    let keyword = request.keyword.trim();
    if keyword.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "keyword must not be empty",
        ));
    }
    if state.sites.by_slug(&request.site).is_none() {
        return Err(ApiError::new(
            req_id.0,
            "bad_request",
            format!("unknown site '{}'", request.site),
        ));
    }

    let row = pressroom_db::create_topic(&state.pool, &request.site, keyword, "ready", "api")
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                ApiError::new(
                    req_id.0.clone(),
                    "conflict",
                    format!("topic '{keyword}' already exists for this site"),
                )
            } else {
                map_db_error(req_id.0.clone(), &e)
            }
        })?;

    Ok(Json(ApiResponse {
        data: TopicItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}
