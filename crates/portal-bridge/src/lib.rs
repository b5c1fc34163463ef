// SPDX-License-Identifier: MIT
//! Per-user tool bridge: each user gets a cached [`Bridge`] connected to the
//! operator's configured tool servers, with credentials injected from that
//! user's vault entries. [`BridgeManager`] owns the cache.

mod bridge;
mod catalog;
mod error;
mod manager;
mod transport;
mod wire;

pub use bridge::{Bridge, ServerSpec, INTERNAL_SERVER};
pub use catalog::{openai_projection, raw_projection, ToolCatalogEntry};
pub use error::{BridgeError, Result};
pub use manager::BridgeManager;
pub use transport::{HttpTransport, StdioTransport, Transport};
