//! Analyst command handler.

use sqlx::PgPool;

use pressroom_ai::ProviderChain;

pub(crate) async fn run_analyze(
    pool: &PgPool,
    generator: &ProviderChain,
    site: &str,
) -> anyhow::Result<()> {
    let report = pressroom_analyst::run_analysis(pool, Some(generator), site, None).await?;

    println!("analyst run {}", report.run_public_id);
    println!("graded {} performance records", report.graded);

    if let Some(best) = &report.aggregates.best_channel {
        println!("best channel: {best}");
    }
    if let Some(best) = &report.aggregates.best_format {
        println!("best format: {best}");
    }
    if let Some(window) = &report.aggregates.best_posting_window {
        println!("best posting window: {window}");
    }

    match &report.patterns {
        Some(patterns) => {
            for pattern in &patterns.double_down {
                println!("double down: {}: {}", pattern.name, pattern.commentary);
            }
            for pattern in &patterns.avoid {
                println!("avoid: {}: {}", pattern.name, pattern.commentary);
            }
            for recommendation in &patterns.recommendations {
                println!("recommend: {recommendation}");
            }
        }
        None => println!("no validated patterns this run"),
    }

    println!("guidance:\n{}", serde_json::to_string_pretty(&report.guidance)?);

    Ok(())
}
