use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqlaskError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("translation failed: {0}")]
    Translation(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("insert repair failed: {0}")]
    Repair(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("no pending result sets")]
    NoPendingResults,

    #[error("tracing initialization failed: {0}")]
    Tracing(String),
}

pub type Result<T> = std::result::Result<T, SqlaskError>;
