//! # Function-backed behavior (`BehaviorFn`)
//!
//! [`BehaviorFn`] wraps a closure `F: FnOnce(Context) -> Fut`. A behavior runs
//! once per session, so the closure may move its captured state into the
//! future freely.
//!
//! ## Example
//! ```rust
//! use taskbus::{BehaviorFn, BehaviorRef};
//!
//! let b: BehaviorRef = BehaviorFn::boxed("pinger", |mut ctx| async move {
//!     ctx.ready().await;
//!     ctx.send("ping").await
//! });
//!
//! assert_eq!(b.name(), "pinger");
//! ```

use std::borrow::Cow;
use std::future::Future;

use async_trait::async_trait;

use crate::behaviors::{Behavior, BehaviorRef, Context};
use crate::error::BehaviorError;

/// Function-backed behavior implementation.
#[derive(Debug)]
pub struct BehaviorFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> BehaviorFn<F> {
    /// Creates a new function-backed behavior.
    ///
    /// Prefer [`BehaviorFn::boxed`] when you immediately need a [`BehaviorRef`].
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the behavior and returns it as an owned handle (`Box<dyn Behavior>`).
    pub fn boxed<Fut>(name: impl Into<Cow<'static, str>>, f: F) -> BehaviorRef
    where
        F: FnOnce(Context) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BehaviorError>> + Send + 'static,
    {
        Box::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Behavior for BehaviorFn<F>
where
    F: FnOnce(Context) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), BehaviorError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(self: Box<Self>, ctx: Context) -> Result<(), BehaviorError> {
        let Self { f, .. } = *self;
        f(ctx).await
    }
}
