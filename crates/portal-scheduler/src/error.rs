use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),
    #[error("registry error: {0}")]
    Registry(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
