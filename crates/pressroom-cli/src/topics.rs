//! Topic queue command handlers.

use clap::Subcommand;
use sqlx::PgPool;

use pressroom_core::SitesFile;

#[derive(Debug, Subcommand)]
pub(crate) enum TopicsCommand {
    /// List recent topics, newest first.
    List {
        /// Restrict to one site.
        #[arg(long)]
        site: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Seed a directly claimable topic.
    Add {
        site: String,
        keyword: String,
    },
    /// Register a site's configured seed keywords as ready topics.
    Seed {
        site: String,
    },
}

pub(crate) async fn run(
    pool: &PgPool,
    sites: &SitesFile,
    command: TopicsCommand,
) -> anyhow::Result<()> {
    match command {
        TopicsCommand::List { site, limit } => {
            let rows = pressroom_db::list_topics(pool, site.as_deref(), limit).await?;
            if rows.is_empty() {
                println!("no topics");
                return Ok(());
            }
            for row in rows {
                println!(
                    "{}  {:<12} {:<10} {} ({})",
                    row.public_id, row.status, row.source, row.keyword, row.site_slug
                );
            }
        }
        TopicsCommand::Add { site, keyword } => {
            let keyword = keyword.trim();
            if keyword.is_empty() {
                anyhow::bail!("keyword must not be empty");
            }
            if sites.by_slug(&site).is_none() {
                anyhow::bail!("site '{site}' is not configured");
            }
            let row = pressroom_db::create_topic(pool, &site, keyword, "ready", "cli")
                .await
                .map_err(|e| {
                    if e.is_unique_violation() {
                        anyhow::anyhow!("topic '{keyword}' already exists for '{site}'")
                    } else {
                        anyhow::Error::from(e)
                    }
                })?;
            println!("created topic {} ({} / {})", row.public_id, row.site_slug, row.keyword);
        }
        TopicsCommand::Seed { site } => {
            let Some(config) = sites.by_slug(&site) else {
                anyhow::bail!("site '{site}' is not configured");
            };
            let keywords = config.keywords.clone().unwrap_or_default();
            if keywords.is_empty() {
                println!("site '{site}' has no seed keywords configured");
                return Ok(());
            }

            let mut created = 0;
            for keyword in &keywords {
                match pressroom_db::create_topic(pool, &site, keyword, "ready", "seed").await {
                    Ok(_) => created += 1,
                    Err(e) if e.is_unique_violation() => {
                        tracing::debug!(keyword, "seed topic already exists");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            println!("seeded {created} of {} keywords for '{site}'", keywords.len());
        }
    }

    Ok(())
}
