use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use inference_client::InferenceClient;
use newsline_collector::enrich::Enricher;
use newsline_collector::pipeline::Pipeline;
use newsline_collector::scraper::FeedScraper;
use newsline_collector::traits::HttpFetcher;
use newsline_common::{Config, NewslineError};
use newsline_store::NewsStore;

#[derive(Parser)]
#[command(name = "newsline-collector", about = "News feed collection service")]
struct Args {
    /// Run a single collection cycle and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("newsline=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env();

    let store = NewsStore::connect(&config.database_url).await?;
    store.migrate().await?;

    let inference = Arc::new(InferenceClient::new(&config.inference_url));
    let scraper = FeedScraper::new(
        Arc::new(HttpFetcher::new()),
        inference.clone(),
        &config.feed_base_url,
    );
    let pipeline = Pipeline::new(Arc::new(store), scraper, Enricher::new(inference));

    if args.once {
        let summary = pipeline.run_once().await?;
        info!(
            total_items = summary.total_items,
            sources_failed = summary.sources_failed,
            "Single cycle finished"
        );
        return Ok(());
    }

    info!(
        interval_secs = config.collect_interval_secs,
        "Collector started"
    );
    let mut ticker =
        tokio::time::interval(std::time::Duration::from_secs(config.collect_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match pipeline.run_once().await {
            Ok(summary) => info!(
                total_items = summary.total_items,
                sources_failed = summary.sources_failed,
                "Cycle finished"
            ),
            Err(NewslineError::RunInProgress) => {
                warn!("Previous cycle still running, skipping this tick");
            }
            Err(e) => error!(error = %e, "Cycle failed"),
        }
    }
}
