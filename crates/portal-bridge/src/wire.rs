// SPDX-License-Identifier: MIT
//! Request/response envelopes for the JSON-RPC-style tool protocol spoken
//! with tool servers. These are pure, stateless conversions between portal's
//! internal [`ToolCatalogEntry`](crate::catalog::ToolCatalogEntry) shape and
//! the wire format — a client-side counterpart to the conversion functions
//! a tool-serving process would run on the other end.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::ToolCatalogEntry;

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

impl<'a> RpcRequest<'a> {
    pub fn list_tools(id: u64) -> Self {
        Self { jsonrpc: "2.0", id, method: "tools/list", params: Value::Null }
    }

    pub fn call_tool(id: u64, name: &'a str, arguments: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: "tools/call",
            params: serde_json::json!({ "name": name, "arguments": arguments }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct RawTool {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_schema")]
    input_schema: Value,
}

fn default_schema() -> Value {
    serde_json::json!({ "type": "object" })
}

/// Parse a `tools/list` result payload (`{"tools": [...]}`) into catalog
/// entries. Malformed or missing entries are skipped rather than failing
/// the whole list — one bad tool on a remote server shouldn't take down the
/// rest of its catalog.
pub fn parse_tool_list(result: &Value) -> Vec<ToolCatalogEntry> {
    let Some(tools) = result.get("tools").and_then(Value::as_array) else {
        return Vec::new();
    };
    tools
        .iter()
        .filter_map(|t| serde_json::from_value::<RawTool>(t.clone()).ok())
        .map(|t| ToolCatalogEntry {
            name: t.name,
            description: t.description,
            input_schema: t.input_schema,
        })
        .collect()
}

/// Extract the textual content from a `tools/call` result payload. MCP-style
/// results carry `{"content":[{"type":"text","text":"..."}]}`; this
/// concatenates every text part, which is all the bridge's `call` contract
/// promises its callers.
pub fn parse_call_result(result: &Value) -> String {
    let Some(parts) = result.get("content").and_then(Value::as_array) else {
        return result.to_string();
    };
    parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_tool_list_extracts_entries() {
        let result = json!({"tools": [
            {"name": "read_file", "description": "reads", "input_schema": {"type": "object"}}
        ]});
        let entries = parse_tool_list(&result);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "read_file");
    }

    #[test]
    fn parse_tool_list_skips_malformed_entries() {
        let result = json!({"tools": [{"description": "missing name"}]});
        assert!(parse_tool_list(&result).is_empty());
    }

    #[test]
    fn parse_tool_list_missing_field_is_empty() {
        assert!(parse_tool_list(&json!({})).is_empty());
    }

    #[test]
    fn parse_call_result_joins_text_parts() {
        let result = json!({"content": [{"type":"text","text":"hello "}, {"type":"text","text":"world"}]});
        assert_eq!(parse_call_result(&result), "hello world");
    }

    #[test]
    fn parse_call_result_falls_back_to_raw_json() {
        let result = json!({"unexpected": true});
        assert_eq!(parse_call_result(&result), result.to_string());
    }
}
