use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use rust_decimal::Decimal;
use tracing::{info, warn};

use pricewatch::config::AppConfig;
use pricewatch::fetch::FetchClient;
use pricewatch::models::SearchFilters;
use pricewatch::notify::LogNotifier;
use pricewatch::orchestrator::ScrapeOrchestrator;
use pricewatch::rate::RateGovernor;
use pricewatch::robots::{AllowAll, RobotsCache, RobotsPolicy};
use pricewatch::schedule::{run_jobs, should_alert, SearchJob};
use pricewatch::sites::AdapterRegistry;
use pricewatch::store::MemoryStore;

#[derive(Parser, Debug)]
#[command(name = "pricewatch", about = "Scrape marketplace searches and report price changes")]
struct Cli {
    /// Site to scrape (mercadolivre, ebay). Omit to run configured jobs.
    #[arg(long)]
    site: Option<String>,

    /// Search term. Required together with --site.
    #[arg(long)]
    search: Option<String>,

    #[arg(long)]
    min_price: Option<Decimal>,

    #[arg(long)]
    max_price: Option<Decimal>,

    #[arg(long)]
    max_results: Option<usize>,

    /// Buy-it-now listings only (sites that support it).
    #[arg(long)]
    buy_it_now: bool,

    /// Debug-level logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("pricewatch={}", default_level).parse()?),
        )
        .init();

    let config = AppConfig::from_env()?;

    let governor = Arc::new(RateGovernor::new(&config.scraper));
    let robots: Arc<dyn RobotsPolicy> = if config.scraper.respect_robots {
        Arc::new(RobotsCache::new(
            reqwest::Client::new(),
            Duration::from_secs(config.scraper.robots_ttl_secs),
        ))
    } else {
        warn!("robots.txt checking disabled by configuration");
        Arc::new(AllowAll)
    };
    let fetch = FetchClient::new(&config.scraper, governor, robots)?;

    let registry = AdapterRegistry::with_default_sites();
    let store = Arc::new(MemoryStore::new());
    let orchestrator = ScrapeOrchestrator::new(&config, registry, fetch, store)
        .with_notifier(Arc::new(LogNotifier));

    let jobs = match (&cli.site, &cli.search) {
        (Some(site), Some(search)) => vec![SearchJob {
            site: site.clone(),
            term: search.clone(),
            filters: SearchFilters {
                min_price: cli.min_price,
                max_price: cli.max_price,
                max_results: cli.max_results,
                buy_it_now_only: cli.buy_it_now,
            },
        }],
        (None, None) => config.jobs.iter().map(SearchJob::from).collect(),
        _ => {
            anyhow::bail!("--site and --search must be given together");
        }
    };

    if jobs.is_empty() {
        anyhow::bail!("nothing to do: pass --site/--search or configure [[jobs]]");
    }

    let results = run_jobs(&orchestrator, &jobs).await;
    let alerts = results.iter().filter(|r| should_alert(r)).count();
    info!(runs = results.len(), alerts, "all jobs finished");

    for result in &results {
        println!(
            "{} {:<14} {:<30} products={:<4} events={:<4} degraded={}",
            result.run_id,
            result.site,
            result.search_term,
            result.products.len(),
            result.events.iter().filter(|e| e.is_notable()).count(),
            result.degraded,
        );
    }

    Ok(())
}
