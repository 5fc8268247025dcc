//! The per-node Multi-Paxos state machine: a pure consensus core for a replicated
//! log. No network transport, no durable journal implementation, no host command
//! interpreter — those are external collaborators ([`storage::Storage`],
//! [`clock::Clock`], [`clock::Random`]) injected into [`core::PaxosCore`].
//!
//! Mirrors the `omnipaxos` / `omnipaxos_storage` split: this crate holds the wire
//! types, the journal contract, and the dispatcher; concrete `Storage`
//! implementations live in the sibling `paxos-storage` crate.

pub mod ballot;
pub mod clock;
pub mod config;
pub mod core;
pub mod error;
pub mod ids;
pub mod messages;
pub mod role;
pub mod state;
pub mod storage;

#[cfg(feature = "logging")]
pub mod logger;

mod handlers;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use core::{ClientOutcome, Delivery, Effects, PaxosCore};
pub use error::{Error, Result};
pub use role::Role;
