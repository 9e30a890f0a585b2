//! Backfill embeddings for news rows whose vector write was deferred.

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use inference_client::{InferenceClient, InferenceService};
use newsline_common::Config;
use newsline_store::NewsStore;

#[derive(Parser)]
#[command(name = "backfill", about = "Embed news rows that are missing vectors")]
struct Args {
    /// Rows per embedding batch.
    #[arg(long, default_value_t = 256)]
    batch_size: i64,
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
    let inference = InferenceClient::new(&config.inference_url);

    let mut backfilled = 0usize;
    loop {
        let rows = store.missing_embeddings(args.batch_size).await?;
        if rows.is_empty() {
            break;
        }

        let texts: Vec<String> = rows.iter().map(|r| r.body.clone()).collect();
        let embeddings = inference.embed_batch(&texts).await?;
        anyhow::ensure!(
            embeddings.len() == rows.len(),
            "Embedding batch returned {} results for {} inputs",
            embeddings.len(),
            rows.len()
        );

        let mut written = 0usize;
        for (row, embedding) in rows.iter().zip(embeddings) {
            match store
                .insert_embedding(&row.url, row.published_at, &embedding)
                .await
            {
                Ok(()) => written += 1,
                Err(e) => warn!(url = %row.url, error = %e, "Embedding write failed"),
            }
        }
        backfilled += written;
        info!(batch = rows.len(), written, backfilled, "Backfill batch done");

        // Rows that keep failing would make the loop spin on the same
        // batch forever.
        if written == 0 {
            warn!("No progress in this batch, stopping");
            break;
        }
        if (rows.len() as i64) < args.batch_size {
            break;
        }
    }

    info!(backfilled, "Backfill complete");
    Ok(())
}
