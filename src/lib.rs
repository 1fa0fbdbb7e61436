//! `fleetctl` - Ground-side mission controller for a UAV fleet
//!
//! This library accepts a fixed number of agents over a byte-stream
//! transport and drives them through barrier-synchronized mission phases
//! (CONNECT, TARGET, ACK, READY, and optionally RTL and LAND). Each phase
//! waits on every participant at once and advances only when all of them
//! have answered.

pub mod agent;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod mission;
pub mod observability;
pub mod participant;
pub mod phase;
pub mod transport;
