//! Runtime core: sessions, routing and lifecycle.
//!
//! The public API from this module is [`Bus`], [`BusBuilder`], [`BusConfig`]
//! and the [`run`] shortcut.
//!
//! Internal modules:
//! - [`session`]: the orchestrator; startup, barrier, routing, teardown;
//! - [`participant`]: one behavior with its inbox, outbox and exit signal;
//! - [`pump`]: per-participant relay from outbox to the bus channel;
//! - [`registry`]: type-keyed subscription index with capability expansion.

mod builder;
mod bus;
mod config;
mod participant;
mod pump;
mod registry;
mod session;

pub use builder::BusBuilder;
pub use bus::{Bus, run};
pub use config::BusConfig;

pub(crate) use participant::{ParticipantId, ReadySignal};
