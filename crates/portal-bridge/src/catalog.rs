// SPDX-License-Identifier: MIT
//! Tool catalog entry and its two client-facing projections.
//!
//! `input_schema` mirrors the common `name`/`description`/`parameters`
//! tool-schema shape, plus the provider-specific function-call envelope
//! that an LLM graph executor expects.

use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolCatalogEntry {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// `{name, description, input_schema}` projection — the native shape.
pub fn raw_projection(entries: &[ToolCatalogEntry]) -> Value {
    json!(entries)
}

/// `{type:"function", function:{name, description, parameters}}` projection,
/// the shape OpenAI-style chat completion APIs expect for tool definitions.
pub fn openai_projection(entries: &[ToolCatalogEntry]) -> Value {
    let items: Vec<Value> = entries
        .iter()
        .map(|e| {
            json!({
                "type": "function",
                "function": {
                    "name": e.name,
                    "description": e.description,
                    "parameters": e.input_schema,
                }
            })
        })
        .collect();
    Value::Array(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> ToolCatalogEntry {
        ToolCatalogEntry {
            name: "read_file".into(),
            description: "reads a file".into(),
            input_schema: json!({"type": "object"}),
        }
    }

    #[test]
    fn raw_projection_round_trips_fields() {
        let v = raw_projection(&[entry()]);
        assert_eq!(v[0]["name"], "read_file");
        assert_eq!(v[0]["input_schema"]["type"], "object");
    }

    #[test]
    fn openai_projection_wraps_as_function() {
        let v = openai_projection(&[entry()]);
        assert_eq!(v[0]["type"], "function");
        assert_eq!(v[0]["function"]["name"], "read_file");
        assert_eq!(v[0]["function"]["parameters"]["type"], "object");
    }
}
