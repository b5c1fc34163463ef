// SPDX-License-Identifier: MIT
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool server {server} unreachable: {source}")]
    Connect { server: String, source: anyhow::Error },

    #[error("tool call failed: {0}")]
    CallFailed(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
