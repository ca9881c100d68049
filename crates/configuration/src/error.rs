use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),

    #[error("No database URI configured. Set PAYMENTS__DATABASE__URI or DATABASE_URL.")]
    MissingDatabaseUri,

    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}
