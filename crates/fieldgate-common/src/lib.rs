#![doc = "Common types shared across the fieldgate workspace."]

pub mod config;
pub mod error;

pub use config::*;
pub use error::*;

/// Upper bound on the number of slaves tracked by the bus master.
pub const MAX_SLAVES: usize = 256;

/// Upper bound on the operator client table capacity. The effective limit is
/// `security.max_clients`, clamped to this value.
pub const MAX_CLIENTS: usize = 32;
