//! # Behavior abstraction.
//!
//! A [`Behavior`] is one participant's logic. The bus calls [`Behavior::run`]
//! exactly once per session, handing it a [`Context`] through which it
//! subscribes, signals readiness, and exchanges messages.
//!
//! The common handle type is [`BehaviorRef`], a `Box<dyn Behavior>`: behaviors
//! are consumed by the run, so they are owned rather than shared.

use async_trait::async_trait;

use crate::behaviors::Context;
use crate::error::BehaviorError;

/// # One participant of a messaging session.
///
/// A behavior typically:
/// 1. declares its subscriptions with [`Context::subscribe`] and friends;
/// 2. calls [`Context::ready`] (publishing is held until everyone is ready);
/// 3. sends and receives until its work is done or the context is cancelled.
///
/// Returning `Err` ends the whole session: every other participant is
/// cancelled and the error is reported by [`Bus::run`](crate::Bus::run).
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use taskbus::{Behavior, BehaviorError, Context};
///
/// struct Echo;
///
/// #[async_trait]
/// impl Behavior for Echo {
///     fn name(&self) -> &str { "echo" }
///
///     async fn run(self: Box<Self>, mut ctx: Context) -> Result<(), BehaviorError> {
///         ctx.subscribe::<String>();
///         ctx.ready().await;
///         while let Some(msg) = ctx.inbox().recv().await {
///             if let Some(text) = msg.downcast_ref::<String>() {
///                 ctx.send(text.len()).await?;
///             }
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Behavior: Send + 'static {
    /// Returns a stable, human-readable name used in logs and errors.
    fn name(&self) -> &str;

    /// Runs the behavior to completion.
    ///
    /// Implementations should return promptly once `ctx` is cancelled.
    async fn run(self: Box<Self>, ctx: Context) -> Result<(), BehaviorError>;
}

/// Owned handle to a behavior, as accepted by [`Bus::run`](crate::Bus::run).
pub type BehaviorRef = Box<dyn Behavior>;
