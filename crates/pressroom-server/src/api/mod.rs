mod drafts;
mod performance;
mod runs;
mod topics;

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderName, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use pressroom_ai::{IndexingClient, ProviderChain, SearchClient};
use pressroom_core::{AppConfig, SitesFile};
use pressroom_pipeline::{diagnose, Phase, PipelineError};

use crate::middleware::{request_id, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub sites: Arc<SitesFile>,
    pub generator: Arc<ProviderChain>,
    pub search: Option<Arc<SearchClient>>,
    pub indexer: Option<Arc<IndexingClient>>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn map_db_error(request_id: String, error: &pressroom_db::DbError) -> ApiError {
    if matches!(error, pressroom_db::DbError::NotFound) {
        return ApiError::new(request_id, "not_found", "record not found");
    }
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

/// Maps a pipeline error to the API envelope. `phase` is the caller's
/// best knowledge of where the draft was; phase failures are run
/// through the diagnoser so raw provider and database text never
/// reaches the response body.
pub(super) fn map_pipeline_error(
    request_id: String,
    error: &PipelineError,
    phase: Phase,
) -> ApiError {
    match error {
        PipelineError::Db(db) => map_db_error(request_id, db),
        PipelineError::UnknownSite(slug) => ApiError::new(
            request_id,
            "bad_request",
            format!("unknown site '{slug}'"),
        ),
        PipelineError::NotEnhanceable(message) => {
            ApiError::new(request_id, "conflict", message.clone())
        }
        PipelineError::Phase(failure) => {
            tracing::error!(error = %failure, "pipeline failure surfaced to API");
            let diagnosis = diagnose(phase, &failure.message);
            ApiError::new(
                request_id,
                "internal_error",
                format!("{}; fix: {}", diagnosis.summary, diagnosis.fix),
            )
        }
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/drafts", get(drafts::list_drafts))
        .route("/api/drafts/{public_id}", get(drafts::get_draft))
        .route("/api/drafts/{public_id}/enhance", post(drafts::enhance_draft))
        .route("/api/generate", post(runs::generate))
        .route("/api/runs", get(runs::list_runs))
        .route("/api/runs/{public_id}", get(runs::get_run))
        .route("/api/topics", get(topics::list_topics).post(topics::create_topic))
        .route(
            "/api/performance",
            get(performance::list_performance).post(performance::ingest_performance),
        )
        .route("/api/guidance", get(performance::get_guidance))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match pressroom_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_limit_clamps_to_bounds() {
        assert_eq!(normalize_limit(None), 50);
        assert_eq!(normalize_limit(Some(0)), 1);
        assert_eq!(normalize_limit(Some(10_000)), 200);
        assert_eq!(normalize_limit(Some(25)), 25);
    }

    #[test]
    fn unknown_site_maps_to_bad_request() {
        let err = map_pipeline_error(
            "req".to_string(),
            &PipelineError::UnknownSite("ghost-site".to_string()),
            Phase::Research,
        );
        assert_eq!(err.error.code, "bad_request");
        assert!(err.error.message.contains("ghost-site"));
    }

    #[test]
    fn not_found_maps_through() {
        let err = map_db_error("req".to_string(), &pressroom_db::DbError::NotFound);
        assert_eq!(err.error.code, "not_found");
    }

    #[test]
    fn not_enhanceable_maps_to_conflict() {
        let err = map_pipeline_error(
            "req".to_string(),
            &PipelineError::NotEnhanceable("outside the band".to_string()),
            Phase::Reservoir,
        );
        assert_eq!(err.error.code, "conflict");
    }

    #[test]
    fn phase_failure_is_diagnosed_before_surfacing() {
        use pressroom_pipeline::PhaseFailure;

        let failure = PhaseFailure::new(
            "error returned from database: duplicate key value violates \
             unique constraint \"drafts_pkey\"",
        );
        let err = map_pipeline_error(
            "req".to_string(),
            &PipelineError::Phase(failure),
            Phase::Reservoir,
        );
        assert_eq!(err.error.code, "internal_error");
        assert!(
            !err.error.message.contains("duplicate key value"),
            "raw database text must not reach the response body: {}",
            err.error.message
        );
        assert!(err.error.message.contains("collided"));
        assert!(err.error.message.contains("fix:"));
    }
}
