// SPDX-License-Identifier: MIT
use thiserror::Error;

/// Transient storage errors propagate; decryption failures never do — a
/// decryption failure degrades to `None`, not an error, and is logged at
/// the call site instead.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("no encryption key configured for key id {0:?}")]
    MissingKey(String),

    #[error("invalid key material for key id {0:?}: {1}")]
    InvalidKey(String, String),
}

pub type Result<T> = std::result::Result<T, VaultError>;
