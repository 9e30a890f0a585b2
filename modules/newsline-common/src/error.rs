use thiserror::Error;

#[derive(Error, Debug)]
pub enum NewslineError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Scraping error: {0}")]
    Scraping(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Collection run already in progress")]
    RunInProgress,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
