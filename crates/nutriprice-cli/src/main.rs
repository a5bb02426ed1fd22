mod commands;

use clap::{Parser, Subcommand};
use nutriprice_scraper::{ExtractorConfig, HttpPriceExtractor};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "nutriprice-cli")]
#[command(about = "Supplement price catalog operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Run the configured price extractor against one product page
    Probe {
        /// Product page URL
        url: String,
    },
    /// Re-scrape every supplement and persist changed prices
    Refresh,
    /// Print stored supplements as JSON
    List {
        /// Only supplements of this type
        #[arg(long = "type")]
        kind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = nutriprice_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let extractor = || HttpPriceExtractor::new(ExtractorConfig::from_app_config(&config));

    match cli.command {
        Commands::Migrate => {
            let store = connect_store(&config).await?;
            let applied = nutriprice_db::run_migrations(store.pool()).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::Probe { url } => commands::run_probe(&extractor()?, &url).await,
        Commands::Refresh => {
            let store = connect_store(&config).await?;
            let summary = commands::run_refresh(&store, &extractor()?).await?;
            println!("{summary}");
        }
        Commands::List { kind } => {
            let store = connect_store(&config).await?;
            commands::run_list(&store, kind).await?;
        }
    }

    Ok(())
}

async fn connect_store(
    config: &nutriprice_core::AppConfig,
) -> anyhow::Result<nutriprice_db::PgSupplementStore> {
    let pool_config = nutriprice_db::PoolConfig::from_app_config(config);
    let pool = nutriprice_db::connect_pool(&config.database_url, pool_config).await?;
    Ok(nutriprice_db::PgSupplementStore::new(pool))
}
