//! Agent spawner: three ways to run an agent turn against a user's bridge
//! and the graph executor. Inline tasks return text directly; background
//! runs write an artifact and post a notification; foreground runs hand
//! back a persistent thread id the caller keeps talking to.

mod error;
mod message;
mod spawner;
mod thread_manager;

pub use error::{Result, SpawnerError};
pub use message::{build_task_message, title_case, truncate_preview};
pub use spawner::{ModelSelection, Spawner};
pub use thread_manager::ThreadManager;
