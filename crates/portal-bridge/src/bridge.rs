// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::catalog::ToolCatalogEntry;
use crate::error::{BridgeError, Result};
use crate::transport::{StdioTransport, Transport};
use crate::wire::{parse_call_result, parse_tool_list, RpcRequest};
use portal_config::TransportConfig;

pub const INTERNAL_SERVER: &str = "_internal";

type InternalHandler =
    Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<String>> + Send>> + Send + Sync>;

struct InternalTool {
    entry: ToolCatalogEntry,
    handler: InternalHandler,
}

struct ConnectedServer {
    name: String,
    transport: Box<dyn Transport>,
    tools: Vec<ToolCatalogEntry>,
}

#[derive(Clone)]
enum Resolution {
    Server { server: usize, raw_name: String },
    Internal { index: usize },
}

/// Everything one user's agents need to discover and call tools: a set of
/// live connections to configured tool servers plus any in-process tools
/// registered against the `_internal` pseudo-server.
pub struct Bridge {
    servers: Vec<ConnectedServer>,
    internal: Vec<InternalTool>,
    resolution: HashMap<String, Resolution>,
    next_call_id: std::sync::atomic::AtomicU64,
}

/// One configured tool server plus whatever per-user headers the manager
/// has already formatted for it.
pub struct ServerSpec {
    pub name: String,
    pub transport: TransportConfig,
    pub headers: HashMap<String, String>,
}

impl Bridge {
    /// Connect to every configured server, collecting catalogs. A server
    /// that fails to connect is logged and skipped — the bridge still
    /// becomes usable with whatever did connect.
    pub async fn connect(specs: Vec<ServerSpec>) -> Self {
        let mut servers = Vec::new();
        let mut resolution = HashMap::new();

        for spec in specs {
            let transport: Box<dyn Transport> = match &spec.transport {
                TransportConfig::Stdio { command, args } => {
                    match StdioTransport::spawn(&spec.name, command, args).await {
                        Ok(t) => Box::new(t),
                        Err(e) => {
                            tracing::warn!(server = %spec.name, error = %e, "tool server connection failed, skipping");
                            continue;
                        }
                    }
                }
                TransportConfig::Http { url } => {
                    Box::new(crate::transport::HttpTransport::new(url, spec.headers.clone()))
                }
            };

            let list_request = serde_json::to_value(RpcRequest::list_tools(0)).expect("RpcRequest always serializes");
            let tools = match transport.request(list_request).await {
                Ok(result) => parse_tool_list(&result),
                Err(e) => {
                    tracing::warn!(server = %spec.name, error = %e, "tool server catalog fetch failed, skipping");
                    continue;
                }
            };

            let server_idx = servers.len();
            for tool in &tools {
                let key = if resolution.contains_key(&tool.name) {
                    let renamed = format!("{}_{}", spec.name, tool.name);
                    tracing::warn!(tool = %tool.name, server = %spec.name, renamed = %renamed, "tool name collision, renaming");
                    renamed
                } else {
                    tool.name.clone()
                };
                resolution.insert(
                    key,
                    Resolution::Server { server: server_idx, raw_name: tool.name.clone() },
                );
            }

            servers.push(ConnectedServer { name: spec.name, transport, tools });
        }

        Self {
            servers,
            internal: Vec::new(),
            resolution,
            next_call_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    /// Register an in-process tool under the `_internal` server. Later
    /// registrations win name collisions with earlier internal tools (there
    /// is no cross-server renaming for internal tools — the caller owns
    /// the whole namespace).
    pub fn register_internal<F, Fut>(&mut self, entry: ToolCatalogEntry, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        let index = self.internal.len();
        let name = entry.name.clone();
        self.internal.push(InternalTool {
            entry,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        });
        self.resolution.insert(name, Resolution::Internal { index });
    }

    /// True while every stdio-backed server is still alive. A dead
    /// transport means the cache entry is stale and `BridgeManager` should
    /// rebuild it.
    pub async fn is_connected(&self) -> bool {
        for server in &self.servers {
            if !server.transport.is_alive().await {
                return false;
            }
        }
        true
    }

    fn entries_for(&self, allowed_servers: Option<&[String]>) -> Vec<ToolCatalogEntry> {
        let mut out = Vec::new();
        for (idx, server) in self.servers.iter().enumerate() {
            if let Some(allowed) = allowed_servers {
                if !allowed.iter().any(|a| a == &server.name) {
                    continue;
                }
            }
            for tool in &server.tools {
                let resolved_name = self
                    .resolution
                    .iter()
                    .find(|(_, r)| matches!(r, Resolution::Server { server: s, raw_name } if *s == idx && raw_name == &tool.name))
                    .map(|(k, _)| k.clone())
                    .unwrap_or_else(|| tool.name.clone());
                out.push(ToolCatalogEntry {
                    name: resolved_name,
                    description: tool.description.clone(),
                    input_schema: tool.input_schema.clone(),
                });
            }
        }
        let internal_allowed = allowed_servers.map_or(true, |a| a.iter().any(|s| s == INTERNAL_SERVER));
        if internal_allowed {
            out.extend(self.internal.iter().map(|t| t.entry.clone()));
        }
        out
    }

    /// Full catalog across every connected server plus internal tools.
    pub fn raw_catalog(&self) -> Value {
        crate::catalog::raw_projection(&self.entries_for(None))
    }

    pub fn openai_catalog(&self) -> Value {
        crate::catalog::openai_projection(&self.entries_for(None))
    }

    /// Catalog restricted to `allowed_servers`; `_internal` is always
    /// included regardless of the allow-list.
    pub fn filtered_catalog(&self, allowed_servers: &[String]) -> Value {
        let mut allowed = allowed_servers.to_vec();
        if !allowed.iter().any(|s| s == INTERNAL_SERVER) {
            allowed.push(INTERNAL_SERVER.to_string());
        }
        crate::catalog::raw_projection(&self.entries_for(Some(&allowed)))
    }

    /// Invoke a tool by its resolved name. Unknown names fail with
    /// [`BridgeError::UnknownTool`]; errors from the tool server or
    /// internal handler propagate verbatim.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<String> {
        match self.resolution.get(name) {
            Some(Resolution::Internal { index }) => {
                let tool = &self.internal[*index];
                (tool.handler)(arguments).await
            }
            Some(Resolution::Server { server, raw_name }) => {
                let server = &self.servers[*server];
                let id = self.next_call_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                let request = RpcRequest::call_tool(id, raw_name, arguments);
                let body = serde_json::to_value(&request).map_err(|e| BridgeError::CallFailed(e.to_string()))?;
                let result = server.transport.request(body).await?;
                Ok(parse_call_result(&result))
            }
            None => Err(BridgeError::UnknownTool(name.to_string())),
        }
    }
}
