// SPDX-License-Identifier: MIT
//! Transports a tool server can be reached over: a child process speaking
//! line-delimited JSON-RPC on stdio, or an HTTP endpoint taking one POSTed
//! JSON-RPC request per call.

use std::collections::HashMap;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use crate::error::{BridgeError, Result};
use crate::wire::RpcResponse;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, body: Value) -> Result<Value>;

    /// Whether the underlying connection is still usable. HTTP transports
    /// have no persistent connection to go stale, so they report alive
    /// unconditionally; stdio transports check the child process.
    async fn is_alive(&self) -> bool {
        true
    }
}

/// Speaks newline-delimited JSON-RPC over a child process's stdin/stdout.
/// The process is spawned once and kept alive for the lifetime of the
/// transport; each call writes one line and reads one line back.
pub struct StdioTransport {
    server_name: String,
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<BufReader<ChildStdout>>,
}

impl StdioTransport {
    pub async fn spawn(server_name: &str, command: &str, args: &[String]) -> Result<Self> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| BridgeError::Connect {
                server: server_name.to_string(),
                source: e.into(),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| BridgeError::Connect {
            server: server_name.to_string(),
            source: anyhow::anyhow!("child process has no stdin handle"),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| BridgeError::Connect {
            server: server_name.to_string(),
            source: anyhow::anyhow!("child process has no stdout handle"),
        })?;

        Ok(Self {
            server_name: server_name.to_string(),
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
        })
    }

}

#[async_trait]
impl Transport for StdioTransport {
    async fn is_alive(&self) -> bool {
        let mut child = self.child.lock().await;
        matches!(child.try_wait(), Ok(None))
    }

    async fn request(&self, body: Value) -> Result<Value> {
        let mut line = serde_json::to_string(&body).map_err(|e| BridgeError::CallFailed(e.to_string()))?;
        line.push('\n');

        {
            let mut stdin = self.stdin.lock().await;
            stdin
                .write_all(line.as_bytes())
                .await
                .map_err(|e| BridgeError::Connect {
                    server: self.server_name.clone(),
                    source: e.into(),
                })?;
            stdin.flush().await.map_err(|e| BridgeError::Connect {
                server: self.server_name.clone(),
                source: e.into(),
            })?;
        }

        let mut reply = String::new();
        {
            let mut stdout = self.stdout.lock().await;
            let n = stdout
                .read_line(&mut reply)
                .await
                .map_err(|e| BridgeError::Connect {
                    server: self.server_name.clone(),
                    source: e.into(),
                })?;
            if n == 0 {
                return Err(BridgeError::Connect {
                    server: self.server_name.clone(),
                    source: anyhow::anyhow!("tool server closed stdout"),
                });
            }
        }

        let response: RpcResponse =
            serde_json::from_str(reply.trim_end()).map_err(|e| BridgeError::CallFailed(e.to_string()))?;
        to_result(response)
    }
}

/// Speaks request/response JSON-RPC over HTTP: one POST per call, with
/// per-user headers (credential injection) attached by the caller.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
}

impl HttpTransport {
    pub fn new(url: &str, headers: HashMap<String, String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            headers,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, body: Value) -> Result<Value> {
        let mut req = self.client.post(&self.url).json(&body);
        for (k, v) in &self.headers {
            req = req.header(k, v);
        }
        let resp = req.send().await.map_err(|e| BridgeError::Connect {
            server: self.url.clone(),
            source: e.into(),
        })?;
        let response: RpcResponse = resp
            .json()
            .await
            .map_err(|e| BridgeError::CallFailed(e.to_string()))?;
        to_result(response)
    }
}

fn to_result(response: RpcResponse) -> Result<Value> {
    if let Some(err) = response.error {
        return Err(BridgeError::CallFailed(err.message));
    }
    Ok(response.result.unwrap_or(Value::Null))
}
