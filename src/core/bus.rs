//! # Bus: public entry point for running a set of behaviors.
//!
//! A [`Bus`] is immutable once built (configuration plus frozen capability
//! declarations) and may run any number of sessions, sequentially or
//! concurrently. Each [`Bus::run`] call is an independent session with its
//! own participants, registry and sequence numbers.
//!
//! ## Example
//! ```rust
//! use taskbus::{BehaviorFn, Bus, BusConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), taskbus::BusError> {
//!     let bus = Bus::new(BusConfig::default());
//!
//!     let greeter = BehaviorFn::boxed("greeter", |mut ctx| async move {
//!         ctx.ready().await;
//!         ctx.send(String::from("hello")).await
//!     });
//!     let listener = BehaviorFn::boxed("listener", |mut ctx| async move {
//!         ctx.subscribe::<String>();
//!         ctx.ready().await;
//!         let msg = ctx.recv().await?;
//!         assert_eq!(msg.downcast_ref::<String>().map(String::as_str), Some("hello"));
//!         Ok(())
//!     });
//!
//!     bus.run(&CancellationToken::new(), vec![greeter, listener]).await
//! }
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::behaviors::BehaviorRef;
use crate::core::builder::BusBuilder;
use crate::core::config::BusConfig;
use crate::core::session::{Interrupt, Session};
use crate::error::BusError;
use crate::messages::{Capabilities, CapabilitiesRef};

/// Runs cohorts of behaviors that exchange typed messages.
#[derive(Clone, Debug)]
pub struct Bus {
    cfg: BusConfig,
    capabilities: CapabilitiesRef,
}

impl Bus {
    /// Creates a bus with no capability declarations.
    pub fn new(cfg: BusConfig) -> Self {
        Self::from_parts(cfg, Arc::new(Capabilities::new()))
    }

    /// Returns a builder for declaring capabilities.
    pub fn builder(cfg: BusConfig) -> BusBuilder {
        BusBuilder::new(cfg)
    }

    pub(crate) fn from_parts(cfg: BusConfig, capabilities: CapabilitiesRef) -> Self {
        Self { cfg, capabilities }
    }

    /// The configuration every session uses.
    pub fn config(&self) -> &BusConfig {
        &self.cfg
    }

    /// The frozen capability declarations.
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Runs `behaviors` as one session and returns once every one has returned.
    ///
    /// Returns `Ok(())` if all behaviors returned `Ok`. Otherwise returns the
    /// first error observed: a behavior's error or panic, cancellation of
    /// `token`, or the configured deadline. In every case the result is
    /// delivered only after all behaviors have returned.
    ///
    /// An empty `behaviors` list returns `Ok(())` immediately.
    pub async fn run(
        &self,
        token: &CancellationToken,
        behaviors: Vec<BehaviorRef>,
    ) -> Result<(), BusError> {
        if behaviors.is_empty() {
            return Ok(());
        }

        let participants = behaviors.len();
        info!(participants, deadline = ?self.cfg.deadline(), "session starting");

        let session = Session::new(token, Arc::clone(&self.capabilities), behaviors);
        let result = session
            .run(Interrupt::new(token.clone(), self.cfg.deadline()))
            .await;

        match &result {
            Ok(()) => info!(participants, "session completed"),
            Err(err) => warn!(participants, error = %err, label = err.as_label(), "session failed"),
        }
        result
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

/// Runs `behaviors` on a default [`Bus`] (no capabilities, no deadline).
///
/// See [`Bus::run`].
pub async fn run(token: &CancellationToken, behaviors: Vec<BehaviorRef>) -> Result<(), BusError> {
    Bus::default().run(token, behaviors).await
}
