use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("agent not found: {0}")]
    NotFound(String),

    #[error("access denied for caller {caller} to agent {agent}")]
    AccessDenied { caller: String, agent: String },

    #[error("invalid field {0:?}")]
    InvalidField(String),

    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
