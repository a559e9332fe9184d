mod analyze;
mod generate;
mod topics;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use pressroom_ai::{OpenAiClient, ProviderChain, SearchClient, TextGenerator};
use pressroom_core::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "pressroom-cli")]
#[command(about = "Pressroom content pipeline command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the full pipeline for one keyword, end to end.
    Generate {
        /// Site slug to generate for.
        site: String,
        /// Keyword to write about; omit to claim the next ready topic.
        #[arg(long)]
        keyword: Option<String>,
    },
    /// Advance one draft by one phase, as the scheduler tick would.
    Step,
    /// Re-run the revision loop over marginal reservoir drafts.
    Enhance {
        /// Enhance one specific draft instead of the marginal batch.
        #[arg(long)]
        draft: Option<Uuid>,
        /// Batch size when no draft is named.
        #[arg(long, default_value_t = 5)]
        limit: i64,
    },
    /// Grade recent performance and refresh feed-forward guidance.
    Analyze {
        /// Site slug to analyse.
        site: String,
    },
    /// Inspect or seed the topic queue.
    Topics {
        #[command(subcommand)]
        command: topics::TopicsCommand,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = pressroom_core::load_app_config()?;
    let pool_config = pressroom_db::PoolConfig::from_app_config(&config);
    let pool = pressroom_db::connect_pool(&config.database_url, pool_config).await?;
    pressroom_db::run_migrations(&pool).await?;
    let sites = pressroom_core::load_sites(&config.sites_path)?;

    match cli.command {
        Commands::Generate { site, keyword } => {
            let generator = build_generator(&config)?;
            generate::run_generate(&pool, &sites, &generator, &config, &site, keyword.as_deref())
                .await
        }
        Commands::Step => {
            let generator = build_generator(&config)?;
            generate::run_step(&pool, &sites, &generator, &config).await
        }
        Commands::Enhance { draft, limit } => {
            let generator = build_generator(&config)?;
            let search = build_search(&config)?;
            generate::run_enhance(
                &pool,
                &sites,
                &generator,
                search.as_ref(),
                &config,
                draft,
                limit,
            )
            .await
        }
        Commands::Analyze { site } => {
            let generator = build_generator(&config)?;
            analyze::run_analyze(&pool, &generator, &site).await
        }
        Commands::Topics { command } => topics::run(&pool, &sites, command).await,
    }
}

/// Primary model first, optional fallback endpoint second.
fn build_generator(config: &AppConfig) -> anyhow::Result<ProviderChain> {
    let mut providers: Vec<Box<dyn TextGenerator>> = vec![Box::new(OpenAiClient::with_base_url(
        config.ai_api_key.clone(),
        &config.ai_model,
        config.ai_request_timeout_secs,
        &config.ai_base_url,
    )?)];

    if let (Some(base_url), Some(model)) = (&config.ai_fallback_base_url, &config.ai_fallback_model)
    {
        providers.push(Box::new(OpenAiClient::with_base_url(
            config.ai_api_key.clone(),
            model,
            config.ai_request_timeout_secs,
            base_url,
        )?));
    }

    Ok(ProviderChain::with_retry(
        providers,
        config.ai_max_retries,
        config.ai_retry_backoff_base_ms,
    ))
}

fn build_search(config: &AppConfig) -> anyhow::Result<Option<SearchClient>> {
    let Some(key) = &config.search_api_key else {
        return Ok(None);
    };
    Ok(Some(SearchClient::new(
        Some(key.clone()),
        config.ai_request_timeout_secs,
    )?))
}
