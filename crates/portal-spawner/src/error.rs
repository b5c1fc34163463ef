use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpawnerError {
    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error(transparent)]
    Executor(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SpawnerError>;
