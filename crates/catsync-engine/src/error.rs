use thiserror::Error;

/// Errors surfaced by the replication engine, event processor, and feed
/// generator.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] catsync_store::StoreError),
    #[error(transparent)]
    Ads(#[from] catsync_ads::AdsError),
    #[error(transparent)]
    Db(#[from] catsync_db::DbError),
    #[error("item serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),
    #[error("feed I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
