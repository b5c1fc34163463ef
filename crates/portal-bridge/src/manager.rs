// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use portal_config::{HeaderFormat, OperatorConfig};
use portal_vault::CredentialVault;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::bridge::{Bridge, ServerSpec};

/// Owns one cached [`Bridge`] per user, keyed by `user_id`. Rebuilds a
/// bridge whenever the cached one reports itself disconnected.
pub struct BridgeManager {
    config: OperatorConfig,
    vault: Arc<CredentialVault>,
    cache: Mutex<HashMap<Uuid, Arc<Bridge>>>,
}

impl BridgeManager {
    pub fn new(config: OperatorConfig, vault: Arc<CredentialVault>) -> Self {
        Self { config, vault, cache: Mutex::new(HashMap::new()) }
    }

    /// Returns the cached bridge for `user_id` if it is still connected,
    /// otherwise builds a fresh one (provisioning per-user credentials into
    /// each configured server's headers) and replaces the cache entry.
    pub async fn get_bridge(&self, user_id: Uuid) -> Arc<Bridge> {
        {
            let cache = self.cache.lock().await;
            if let Some(bridge) = cache.get(&user_id) {
                if bridge.is_connected().await {
                    return bridge.clone();
                }
            }
        }

        let specs = self.build_specs(user_id).await;
        let bridge = Arc::new(Bridge::connect(specs).await);

        let mut cache = self.cache.lock().await;
        cache.insert(user_id, bridge.clone());
        bridge
    }

    /// Removes and drops the cached bridge for `user_id`, if any.
    pub async fn invalidate(&self, user_id: Uuid) {
        self.cache.lock().await.remove(&user_id);
    }

    /// Drops every cached bridge.
    pub async fn cleanup(&self) {
        self.cache.lock().await.clear();
    }

    async fn build_specs(&self, user_id: Uuid) -> Vec<ServerSpec> {
        let mut specs = Vec::with_capacity(self.config.tool_servers.len());
        for server in &self.config.tool_servers {
            let mut headers = server.headers.clone();

            if let Some(mapping) = self
                .config
                .credential_mapping
                .iter()
                .find(|m| m.server_name == server.name)
            {
                match self.vault.get(user_id, &mapping.credential_service).await {
                    Ok(Some(credential)) => {
                        if let Some(value) = format_header(mapping.format, &credential.token_data) {
                            headers.insert(mapping.header_name.clone(), value);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(user_id = %user_id, server = %server.name, error = %e, "credential lookup failed, connecting without it");
                    }
                }
            }

            specs.push(ServerSpec {
                name: server.name.clone(),
                transport: server.transport.clone(),
                headers,
            });
        }
        specs
    }
}

/// Turn a decrypted credential's token data into a header value per the
/// server's configured format.
fn format_header(format: HeaderFormat, token_data: &Value) -> Option<String> {
    match format {
        HeaderFormat::Bearer => {
            let token = token_data
                .as_str()
                .or_else(|| token_data.get("access_token")?.as_str())
                .or_else(|| token_data.get("token")?.as_str())?;
            Some(format!("Bearer {token}"))
        }
        HeaderFormat::Json => Some(token_data.to_string()),
        HeaderFormat::ApiKey => token_data.as_str().map(str::to_string),
        HeaderFormat::Generic => token_data
            .get("api_key")
            .or_else(|| token_data.get("token"))
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bearer_formats_plain_string() {
        assert_eq!(format_header(HeaderFormat::Bearer, &json!("abc123")), Some("Bearer abc123".to_string()));
    }

    #[test]
    fn bearer_formats_nested_token_field() {
        assert_eq!(
            format_header(HeaderFormat::Bearer, &json!({"token": "abc123"})),
            Some("Bearer abc123".to_string())
        );
    }

    #[test]
    fn bearer_formats_nested_access_token_field() {
        assert_eq!(
            format_header(HeaderFormat::Bearer, &json!({"access_token": "TA"})),
            Some("Bearer TA".to_string())
        );
    }

    #[test]
    fn json_formats_whole_value() {
        let v = json!({"a": 1});
        assert_eq!(format_header(HeaderFormat::Json, &v), Some(v.to_string()));
    }

    #[test]
    fn api_key_requires_string() {
        assert_eq!(format_header(HeaderFormat::ApiKey, &json!("key")), Some("key".to_string()));
        assert_eq!(format_header(HeaderFormat::ApiKey, &json!({"key": "x"})), None);
    }

    #[test]
    fn generic_looks_up_known_fields() {
        assert_eq!(format_header(HeaderFormat::Generic, &json!({"api_key": "k"})), Some("k".to_string()));
        assert_eq!(format_header(HeaderFormat::Generic, &json!({"token": "t"})), Some("t".to_string()));
        assert_eq!(format_header(HeaderFormat::Generic, &json!({"other": "x"})), None);
    }
}
