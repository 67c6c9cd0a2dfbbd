use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use adwatch_common::Config;
use adwatch_engine::analysis::CompliancePipeline;
use adwatch_engine::fetcher::{BrowserlessFetcher, HttpFetcher, PageFetcher};
use adwatch_engine::judge::AiJudge;
use adwatch_engine::monitor::DomainMonitor;
use adwatch_engine::orchestrator::PollConfig;
use adwatch_store::{migrate, ComplianceStore, PgStore};
use apify_client::ApifyClient;

#[derive(Parser)]
#[command(name = "adwatch", about = "Ad compliance monitoring engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a scrape-and-analyze run for a domain and wait for it
    Start {
        domain: String,
        /// Mark this as a seed run (placeholder data, purge-guarded)
        #[arg(long)]
        seed: bool,
    },
    /// Pause a domain's active run
    Pause { domain: String },
    /// Resume a paused domain
    Resume { domain: String },
    /// Cancel a domain's active run, keeping collected ads
    Cancel { domain: String },
    /// Force a stuck domain to COMPLETED
    ForceComplete { domain: String },
    /// Show a domain's processing state
    Status { domain: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("adwatch=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = Config::from_env();
    config.log_redacted();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    migrate(&pool).await?;

    let store: Arc<dyn ComplianceStore> = Arc::new(PgStore::new(pool));
    let jobs = Arc::new(ApifyClient::new(config.apify_token.clone()));

    let fetcher: Arc<dyn PageFetcher> = match &config.browserless_url {
        Some(url) => Arc::new(BrowserlessFetcher::new(
            url,
            config.browserless_token.as_deref(),
        )),
        None => Arc::new(HttpFetcher::new()),
    };

    let judge = Arc::new(AiJudge::new(&config.anthropic_api_key, &config.judge_model));
    let pipeline = Arc::new(CompliancePipeline::new(store.clone(), judge, fetcher));
    let monitor = DomainMonitor::new(store.clone(), jobs, pipeline, PollConfig::default());

    match cli.command {
        Command::Start { domain, seed } => {
            let outcome = monitor.start(&domain, seed).await?;
            info!(domain, status = %outcome.status, "{}", outcome.message);
            wait_for_completion(store.as_ref(), &domain).await?;
        }
        Command::Pause { domain } => {
            let outcome = monitor.pause(&domain).await?;
            println!("{}: {} ({})", domain, outcome.status, outcome.message);
        }
        Command::Resume { domain } => {
            let outcome = monitor.resume(&domain).await?;
            info!(domain, status = %outcome.status, "{}", outcome.message);
            wait_for_completion(store.as_ref(), &domain).await?;
        }
        Command::Cancel { domain } => {
            let outcome = monitor.cancel(&domain).await?;
            println!("{}: {} ({})", domain, outcome.status, outcome.message);
        }
        Command::ForceComplete { domain } => {
            let outcome = monitor.force_complete(&domain).await?;
            println!("{}: {} ({})", domain, outcome.status, outcome.message);
        }
        Command::Status { domain } => {
            match store.find_domain(&domain).await? {
                Some(d) => {
                    println!(
                        "{}: {} ({}) score={}",
                        d.name,
                        d.processing_status,
                        d.processing_message,
                        d.compliance_score
                            .map(|s| format!("{s:.0}"))
                            .unwrap_or_else(|| "n/a".to_string()),
                    );
                }
                None => println!("{domain}: not found"),
            }
        }
    }

    Ok(())
}

/// Block until the domain's run leaves its active states. The background
/// task does the work; this just keeps the process alive for it.
async fn wait_for_completion(store: &dyn ComplianceStore, domain: &str) -> Result<()> {
    loop {
        tokio::time::sleep(Duration::from_secs(2)).await;
        let Some(d) = store.find_domain(domain).await? else {
            anyhow::bail!("Domain disappeared while waiting: {domain}");
        };
        if !d.processing_status.is_active() {
            println!(
                "{}: {} ({})",
                d.name, d.processing_status, d.processing_message
            );
            return Ok(());
        }
    }
}
