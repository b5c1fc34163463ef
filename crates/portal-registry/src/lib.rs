//! Agent registry: on-disk templates are seeded into `agent_templates`,
//! then resolved per user through three tiers — an existing instance, a
//! freshly materialized template instance, or a system agent read straight
//! off disk.

mod error;
mod frontmatter;
mod loader;
mod model;
mod seeder;
mod system;

pub use error::{RegistryError, Result};
pub use frontmatter::{ScheduleSpec, TriggerSpec};
pub use loader::Registry;
pub use model::{AgentSummary, InstanceSource, ResolvedAgent, SYSTEM_SENTINEL};
pub use seeder::{sync, SyncOutcome};
pub use system::CallerProfile;
