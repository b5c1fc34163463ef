// SPDX-License-Identifier: MIT
mod loader;
mod schema;

pub use loader::load;
pub use schema::*;
