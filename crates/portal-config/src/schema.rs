// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_poll_interval() -> u64 {
    60
}

fn default_agents_dir() -> PathBuf {
    PathBuf::from("agents")
}

fn default_system_agents_dir() -> PathBuf {
    PathBuf::from("system-agents")
}

/// Top-level operator configuration consumed by the gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperatorConfig {
    #[serde(default)]
    pub database_url: String,

    #[serde(default)]
    pub encryption: EncryptionConfig,

    #[serde(default)]
    pub tool_servers: Vec<ToolServerConfig>,

    /// Static `server_name -> (credential_service, header_name)` mapping
    /// used by the tool bridge to inject per-user credentials.
    #[serde(default)]
    pub credential_mapping: Vec<CredentialMappingEntry>,

    #[serde(default = "default_poll_interval")]
    pub scheduler_poll_interval_secs: u64,

    /// Address for the reference notification websocket listener. `None`
    /// disables it (useful in tests and for operators supplying their own
    /// front-end transport).
    #[serde(default)]
    pub bind_addr: Option<SocketAddr>,

    #[serde(default = "default_agents_dir")]
    pub agents_dir: PathBuf,

    #[serde(default = "default_system_agents_dir")]
    pub system_agents_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// The key id used for new writes. `None` means plaintext mode — every
    /// write and read skips AEAD entirely.
    #[serde(default)]
    pub current_key_id: Option<String>,

    /// Every key material the operator has configured, keyed by id, so that
    /// rows written under an older key can still be decrypted during
    /// rotation. Values are base64-encoded 32-byte AES-256 keys.
    #[serde(default)]
    pub keys: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolServerConfig {
    pub name: String,
    #[serde(flatten)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum TransportConfig {
    Stdio { command: String, #[serde(default)] args: Vec<String> },
    Http { url: String },
}

/// One formatter rule for how a decrypted credential becomes a header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderFormat {
    Bearer,
    Json,
    ApiKey,
    Generic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialMappingEntry {
    pub server_name: String,
    pub credential_service: String,
    pub header_name: String,
    pub format: HeaderFormat,
}
