//! # Behaviors: what participants run and how they reach the bus.
//!
//! - [`Behavior`] the trait a participant implements ([`BehaviorRef`] is the owned handle)
//! - [`BehaviorFn`] a closure-backed behavior
//! - [`Ingest`] a stream-backed behavior that publishes external input
//! - [`Context`] the per-participant handle with its [`Inbox`] and [`Outbox`]

mod behavior;
mod behavior_fn;
mod context;
mod ingest;

pub use behavior::{Behavior, BehaviorRef};
pub use behavior_fn::BehaviorFn;
pub use context::{Context, Inbox, Outbox};
pub use ingest::Ingest;
