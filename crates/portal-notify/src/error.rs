use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, NotifyError>;
