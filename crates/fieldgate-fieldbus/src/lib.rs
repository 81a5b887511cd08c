//! Fieldbus master plane for the gateway.
//!
//! This crate provides:
//! - [`Transport`] trait abstracting the bus backend (stub, simulated, hardware)
//! - [`BusMaster`] owning the bus lifecycle and the process images
//! - [`SharedMaster`] bridging the cyclic thread and the request path
//! - [`stats`] with atomic timing and error counters

pub mod master;
pub mod slave;
pub mod stats;
pub mod transport;

pub use master::*;
pub use slave::*;
pub use stats::*;
pub use transport::*;
