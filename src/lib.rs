//! # taskbus
//!
//! **Taskbus** is an in-process, typed message bus for a cohort of
//! cooperating async tasks.
//!
//! A fixed set of behaviors is run together as one session. Each behavior
//! declares which message types it wants, signals that it is ready, and then
//! publishes and receives messages. The session ends when every behavior has
//! returned, or at the first error, caller cancellation, or deadline; in all
//! cases only after every behavior has returned.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   Behavior   │   │   Behavior   │   │   Behavior   │
//!     │   (ingest)   │   │   (worker)   │   │  (listener)  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ Context          │ Context          │ Context
//!            │ send ▼ ▲ recv    │ send ▼ ▲ recv    │ send ▼ ▲ recv
//!     ┌──────┴───────┐   ┌──────┴───────┐   ┌──────┴───────┐
//!     │outbox │inbox │   │outbox │inbox │   │outbox │inbox │
//!     └──┬────┴──▲───┘   └──┬────┴──▲───┘   └──┬────┴──▲───┘
//!        ▼       │          ▼       │          ▼       │
//!     ┌──────┐   │       ┌──────┐   │       ┌──────┐   │
//!     │ Pump │   │       │ Pump │   │       │ Pump │   │   unbounded FIFO per sender,
//!     └──┬───┘   │       └──┬───┘   │       └──┬───┘   │   stamps sequence numbers
//!        ▼       │          ▼       │          ▼       │
//! ┌──────────────┴──────────────────┴──────────────────┴──────────────┐
//! │  Session (orchestrator, single writer)                            │
//! │  - Registry (type key → subscribers, capability expansion)        │
//! │  - fan-out: every subscriber except the sender, in parallel       │
//! │  - eviction on return, first-error latch, teardown                │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! Bus::run(token, behaviors)
//!   ├─► spawn every behavior with its Context
//!   ├─► wait: each participant ready() or returned
//!   ├─► open barrier (sends start flowing), start pumps
//!   ├─► route until no participant remains
//!   │     ├─ behavior returns Ok   → evict
//!   │     ├─ behavior returns Err  → fail (first error wins)
//!   │     └─ token / deadline      → fail
//!   └─► teardown: cancel, close inboxes, join behaviors and pumps
//! ```
//!
//! ## Features
//! | Area             | Description                                                 | Key types                              |
//! |------------------|-------------------------------------------------------------|----------------------------------------|
//! | **Sessions**     | Run a cohort of behaviors to completion.                    | [`Bus`], [`run`]                       |
//! | **Behaviors**    | Define participants as trait impls, closures or streams.    | [`Behavior`], [`BehaviorFn`], [`Ingest`] |
//! | **Messaging**    | Subscribe by type or capability, send and receive.          | [`Context`], [`Inbox`], [`Outbox`], [`Message`] |
//! | **Typing**       | Runtime type identity and declared capabilities.            | [`TypeKey`], [`BusBuilder::implements`] |
//! | **Errors**       | Typed errors for the session and for behaviors.             | [`BusError`], [`BehaviorError`]        |
//! | **Configuration**| Session deadline.                                           | [`BusConfig`]                          |
//!
//! ## Example
//! ```rust
//! use std::fmt::Display;
//! use tokio_util::sync::CancellationToken;
//! use taskbus::{BehaviorFn, Bus, BusConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = Bus::builder(BusConfig::default())
//!         .implements::<String, dyn Display + Send + Sync>(|s| s)
//!         .build();
//!
//!     let hello = BehaviorFn::boxed("hello", |mut ctx| async move {
//!         ctx.ready().await;
//!         ctx.send(String::from("hello, world")).await
//!     });
//!
//!     let printer = BehaviorFn::boxed("printer", |mut ctx| async move {
//!         ctx.subscribe_capability::<dyn Display + Send + Sync>();
//!         ctx.ready().await;
//!         let msg = ctx.recv().await?;
//!         if let Some(text) = msg.view::<dyn Display + Send + Sync>() {
//!             println!("{} says: {text}", msg.sender());
//!         }
//!         Ok(())
//!     });
//!
//!     bus.run(&CancellationToken::new(), vec![hello, printer]).await?;
//!     Ok(())
//! }
//! ```

mod behaviors;
mod core;
mod error;
mod messages;

// ---- Public re-exports ----

pub use behaviors::{Behavior, BehaviorFn, BehaviorRef, Context, Inbox, Ingest, Outbox};
pub use core::{Bus, BusBuilder, BusConfig, run};
pub use error::{BehaviorError, BusError};
pub use messages::{Capabilities, Message, TypeKey, TypeKind};
