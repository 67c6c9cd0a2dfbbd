use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdWatchError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Scraping error: {0}")]
    Scraping(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Domain not found: {0}")]
    DomainNotFound(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
