//! Offline unit tests for pressroom-db pool configuration and row types.
//! These tests do not require a live database connection.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use pressroom_core::{AppConfig, Environment};
use pressroom_db::{DraftPatch, DraftRow, PipelineRunRow, PoolConfig, TopicRow};

fn app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        sites_path: PathBuf::from("./config/sites.yaml"),
        ai_base_url: "https://api.openai.com/v1".to_string(),
        ai_api_key: None,
        ai_model: "gpt-4o-mini".to_string(),
        ai_fallback_base_url: None,
        ai_fallback_model: None,
        search_api_key: None,
        indexing_endpoint: None,
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        ai_request_timeout_secs: 60,
        ai_max_retries: 2,
        ai_retry_backoff_base_ms: 1000,
        step_budget_secs: 45,
        full_run_budget_secs: 540,
        phase_safety_margin_secs: 20,
        soft_lock_secs: 120,
        gate_threshold: 50,
        promote_threshold: 70,
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn site_config_is_reachable_from_db_tests() {
    let mut voice = BTreeMap::new();
    voice.insert("en".to_string(), "voice".to_string());
    let site = pressroom_core::SiteConfig {
        name: "Coastal Escapes".to_string(),
        destination: "example.com".to_string(),
        primary_locale: "en".to_string(),
        alternate_locale: None,
        voice,
        keyword_templates: vec!["t {year}".to_string()],
        keywords: None,
        reservoir_capacity: Some(3),
    };
    assert_eq!(site.slug(), "coastal-escapes");
    assert_eq!(site.reservoir_capacity(), 3);
}

/// Compile-time smoke test: confirm that [`DraftRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn draft_row_has_expected_fields() {
    use chrono::Utc;
    use uuid::Uuid;

    let row = DraftRow {
        id: 1_i64,
        public_id: Uuid::new_v4(),
        site_slug: "coastal-escapes".to_string(),
        keyword: "quiet beach towns".to_string(),
        locale: "en".to_string(),
        phase: "research".to_string(),
        sections_total: 0_i32,
        sections_completed: 0_i32,
        research: None,
        outline: None,
        sections: None,
        body_html: None,
        body_html_alt: None,
        seo: None,
        score: None,
        readability: None,
        phase_attempts: 0_i32,
        last_error: None,
        rejection_reason: None,
        paired_draft_id: None,
        topic_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        phase_started_at: None,
        completed_at: None,
    };

    assert_eq!(row.phase, "research");
    assert_eq!(row.phase_attempts, 0);
    assert!(row.score.is_none());
    assert!(row.paired_draft_id.is_none());
}

#[test]
fn draft_patch_default_is_all_none() {
    let patch = DraftPatch::default();
    assert!(patch.sections_total.is_none());
    assert!(patch.research.is_none());
    assert!(patch.body_html.is_none());
    assert!(patch.score.is_none());
}

/// Compile-time smoke test for [`TopicRow`].
#[test]
fn topic_row_has_expected_fields() {
    use chrono::Utc;
    use uuid::Uuid;

    let row = TopicRow {
        id: 7_i64,
        public_id: Uuid::new_v4(),
        site_slug: "coastal-escapes".to_string(),
        keyword: "hidden beaches".to_string(),
        status: "ready".to_string(),
        source: "discovery".to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    assert_eq!(row.status, "ready");
    assert_eq!(row.source, "discovery");
}

/// Compile-time smoke test for [`PipelineRunRow`].
#[test]
fn pipeline_run_row_has_expected_fields() {
    use chrono::Utc;
    use uuid::Uuid;

    let row = PipelineRunRow {
        id: 3_i64,
        public_id: Uuid::new_v4(),
        site_slug: "coastal-escapes".to_string(),
        run_type: "full".to_string(),
        trigger_source: "api".to_string(),
        status: "queued".to_string(),
        draft_id: None,
        steps: None,
        result_summary: None,
        error_message: None,
        started_at: None,
        completed_at: None,
        created_at: Utc::now(),
    };

    assert_eq!(row.run_type, "full");
    assert_eq!(row.status, "queued");
    assert!(row.steps.is_none());
}
