//! Cron scheduler: a polling loop over a persisted schedule table. Every
//! due row is advanced to its next firing before its callback runs, so a
//! crash between advancement and dispatch can never cause a double-fire.

mod cron_util;
mod error;
mod model;
mod scheduler;

pub use cron_util::next_cron_firing;
pub use error::{Result, SchedulerError};
pub use model::{ScheduleEntry, SyncCounts};
pub use scheduler::{OnDue, Scheduler};
