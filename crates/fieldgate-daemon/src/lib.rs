//! Gateway service kernel.
//!
//! Owns the three scheduled activities and the state they share:
//! - [`network`] - datagram receive/dispatch/send loop
//! - [`cyclic`] - fixed-period fieldbus exchange at real-time priority
//! - [`management`] - periodic housekeeping and status emission
//!
//! [`service::Service`] ties them together with the client table, the
//! reserved process-data ring, and the cooperative shutdown flags.

pub mod clients;
pub mod commands;
pub mod cyclic;
pub mod management;
pub mod network;
pub mod ring;
pub mod rt;
pub mod service;
pub mod signals;
