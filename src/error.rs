use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Source setup error: {0}")]
    Source(#[from] crate::sources::SourceError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Prediction set for draw {0} already exists (use --force to regenerate)")]
    PredictionExists(u64),

    #[error("Not enough history: {0}")]
    InsufficientHistory(String),

    #[error("Draw number {0} does not fit the store's integer key")]
    DrawNumberOutOfRange(u64),

    #[error("Corrupt stored row: {0}")]
    CorruptRow(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
