//! The analyst run: grade, aggregate, augment, persist guidance.

use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use pressroom_ai::TextGenerator;
use pressroom_db::{analyst_runs, performance, PerformanceRecordRow};

use crate::aggregate::{aggregate, Aggregates};
use crate::grading::grade_rate;
use crate::patterns::{propose_patterns, PatternSet};
use crate::AnalystError;

/// Historical window the percentile grading runs against.
pub const HISTORY_LIMIT: i64 = 200;

#[derive(Debug)]
pub struct AnalystReport {
    pub run_public_id: Uuid,
    pub graded: usize,
    pub aggregates: Aggregates,
    pub patterns: Option<PatternSet>,
    pub guidance: Value,
}

/// Runs one analysis for a site.
///
/// With `pipeline_run_id` given, the rows attributed to that run are
/// graded; otherwise every still-ungraded row in the window is. The AI
/// augmentation runs only when a generator is supplied and degrades to
/// data-only output on any failure.
///
/// # Errors
///
/// Returns [`AnalystError`] on database failure; the analyst run row is
/// marked failed first.
pub async fn run_analysis(
    pool: &PgPool,
    generator: Option<&dyn TextGenerator>,
    site_slug: &str,
    pipeline_run_id: Option<i64>,
) -> Result<AnalystReport, AnalystError> {
    let run = analyst_runs::create_analyst_run(pool, site_slug).await?;

    match analyze(pool, generator, site_slug, pipeline_run_id, run.id, run.public_id).await {
        Ok(report) => Ok(report),
        Err(e) => {
            if let Err(mark) =
                analyst_runs::fail_analyst_run(pool, run.id, &e.to_string()).await
            {
                tracing::warn!(run_id = run.id, error = %mark, "could not mark analyst run failed");
            }
            Err(e)
        }
    }
}

async fn analyze(
    pool: &PgPool,
    generator: Option<&dyn TextGenerator>,
    site_slug: &str,
    pipeline_run_id: Option<i64>,
    run_id: i64,
    run_public_id: Uuid,
) -> Result<AnalystReport, AnalystError> {
    let history = performance::list_performance_history(pool, site_slug, HISTORY_LIMIT).await?;

    let targets: Vec<PerformanceRecordRow> = match pipeline_run_id {
        Some(id) => performance::list_run_performance(pool, id).await?,
        None => history.iter().filter(|r| r.grade.is_none()).cloned().collect(),
    };

    // The graded rows must not rank against themselves.
    let target_ids: Vec<i64> = targets.iter().map(|r| r.id).collect();
    let historical_rates: Vec<f32> = history
        .iter()
        .filter(|r| !target_ids.contains(&r.id))
        .map(|r| r.engagement_rate)
        .collect();

    let mut graded_entries = Vec::with_capacity(targets.len());
    for row in &targets {
        let grade = grade_rate(row.engagement_rate, &historical_rates);
        performance::grade_performance_record(pool, row.id, grade.as_str()).await?;
        graded_entries.push(json!({
            "record_id": row.id,
            "channel": row.channel,
            "format": row.format,
            "engagement_rate": row.engagement_rate,
            "grade": grade.as_str(),
        }));
    }
    let grades = Value::Array(graded_entries);

    let aggregates = aggregate(&history);

    let patterns = match generator {
        Some(generator) if !history.is_empty() => {
            propose_patterns(generator, site_slug, &aggregates, &grades).await
        }
        _ => None,
    };

    let guidance = build_guidance(&aggregates, patterns.as_ref());
    let summary = format!(
        "graded {} rows against {} historical rates; best channel: {}",
        targets.len(),
        historical_rates.len(),
        aggregates.best_channel.as_deref().unwrap_or("n/a"),
    );

    let patterns_value = patterns
        .as_ref()
        .and_then(|p| serde_json::to_value(p).ok())
        .unwrap_or(Value::Null);
    let recommendations_value = patterns
        .as_ref()
        .map(|p| json!(p.recommendations))
        .unwrap_or(Value::Null);

    analyst_runs::complete_analyst_run(
        pool,
        run_id,
        &summary,
        &grades,
        &patterns_value,
        &recommendations_value,
        &guidance,
    )
    .await?;

    tracing::info!(
        site = site_slug,
        graded = targets.len(),
        augmented = patterns.is_some(),
        "analysis complete"
    );

    Ok(AnalystReport {
        run_public_id,
        graded: targets.len(),
        aggregates,
        patterns,
        guidance,
    })
}

/// Feed-forward guidance the next generation cycle reads.
#[must_use]
pub fn build_guidance(aggregates: &Aggregates, patterns: Option<&PatternSet>) -> Value {
    let avoid: Vec<&str> = patterns
        .map(|p| p.avoid.iter().map(|pat| pat.name.as_str()).collect())
        .unwrap_or_default();
    let double_down: Vec<&str> = patterns
        .map(|p| p.double_down.iter().map(|pat| pat.name.as_str()).collect())
        .unwrap_or_default();

    json!({
        "preferred_formats": aggregates.preferred_formats,
        "best_channel": aggregates.best_channel,
        "best_posting_windows": aggregates
            .best_posting_window
            .as_ref()
            .map(|w| vec![w.clone()])
            .unwrap_or_default(),
        "avoid": avoid,
        "double_down": double_down,
        "audience_notes": patterns.map(|p| p.audience_notes.clone()).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::Pattern;

    #[test]
    fn guidance_from_data_only_has_empty_pattern_lists() {
        let aggregates = Aggregates {
            best_channel: Some("newsletter".to_string()),
            best_format: Some("guide".to_string()),
            best_posting_window: Some("09:00-09:59".to_string()),
            preferred_formats: [("newsletter".to_string(), "guide".to_string())]
                .into_iter()
                .collect(),
        };
        let guidance = build_guidance(&aggregates, None);
        assert_eq!(guidance["best_channel"], "newsletter");
        assert_eq!(guidance["best_posting_windows"][0], "09:00-09:59");
        assert_eq!(guidance["avoid"].as_array().unwrap().len(), 0);
        assert_eq!(guidance["audience_notes"], "");
    }

    #[test]
    fn guidance_carries_pattern_names() {
        let patterns = PatternSet {
            avoid: vec![Pattern {
                name: "late-night posts".to_string(),
                commentary: String::new(),
            }],
            double_down: vec![Pattern {
                name: "morning newsletters".to_string(),
                commentary: String::new(),
            }],
            recommendations: vec!["post earlier".to_string()],
            audience_notes: "mornings work".to_string(),
        };
        let guidance = build_guidance(&Aggregates::default(), Some(&patterns));
        assert_eq!(guidance["avoid"][0], "late-night posts");
        assert_eq!(guidance["double_down"][0], "morning newsletters");
        assert_eq!(guidance["audience_notes"], "mornings work");
    }
}
