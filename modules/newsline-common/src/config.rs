use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Inference service (embeddings, categories, summaries, headlines)
    pub inference_url: String,

    // Feed scraping
    pub feed_base_url: String,

    // Collection cadence
    pub collect_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            inference_url: required_env("INFERENCE_URL"),
            feed_base_url: env::var("FEED_BASE_URL")
                .unwrap_or_else(|_| "https://t.me/s".to_string()),
            collect_interval_secs: env::var("COLLECT_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .expect("COLLECT_INTERVAL_SECS must be a number"),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
