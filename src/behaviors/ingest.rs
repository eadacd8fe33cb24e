//! # Ingest: publish an external stream onto the bus.
//!
//! [`Ingest`] adapts any [`Stream`] into a behavior: it subscribes to nothing,
//! signals ready immediately, then publishes every item it pulls from the
//! stream. It returns `Ok(())` when the stream ends and
//! [`BehaviorError::Canceled`] if the session is cancelled first.
//!
//! ## Example
//! ```rust
//! use futures::stream;
//! use taskbus::{BehaviorRef, Ingest};
//!
//! let source: BehaviorRef = Ingest::boxed("numbers", stream::iter(1..=3_u32));
//! assert_eq!(source.name(), "numbers");
//! ```

use std::any::Any;
use std::borrow::Cow;

use async_trait::async_trait;
use futures::{Stream, StreamExt, stream};
use tokio::sync::mpsc;
use tracing::debug;

use crate::behaviors::{Behavior, BehaviorRef, Context};
use crate::error::BehaviorError;

/// Stream-backed behavior that relays items onto the bus.
pub struct Ingest<S> {
    name: Cow<'static, str>,
    source: S,
}

impl<S> Ingest<S> {
    /// Creates an ingest behavior reading from `source`.
    pub fn new(name: impl Into<Cow<'static, str>>, source: S) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    /// Creates the behavior and returns it as an owned handle.
    pub fn boxed(name: impl Into<Cow<'static, str>>, source: S) -> BehaviorRef
    where
        S: Stream + Send + 'static,
        S::Item: Any + Send + Sync,
    {
        Box::new(Self::new(name, source))
    }
}

impl<T: Any + Send + Sync> Ingest<mpsc::Receiver<T>> {
    /// Creates an ingest behavior that relays everything sent on `rx`.
    ///
    /// The behavior returns once every sender of the channel is dropped.
    pub fn channel(name: impl Into<Cow<'static, str>>, rx: mpsc::Receiver<T>) -> BehaviorRef {
        let source = stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) });
        Ingest::boxed(name, source)
    }
}

#[async_trait]
impl<S> Behavior for Ingest<S>
where
    S: Stream + Send + 'static,
    S::Item: Any + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(self: Box<Self>, mut ctx: Context) -> Result<(), BehaviorError> {
        ctx.ready().await;

        let source = self.source;
        tokio::pin!(source);
        let mut relayed = 0_u64;

        loop {
            let item = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(BehaviorError::Canceled),
                item = source.next() => item,
            };
            let Some(item) = item else {
                debug!(participant = %ctx.name(), relayed, "ingest source exhausted");
                return Ok(());
            };
            ctx.send(item).await?;
            relayed += 1;
        }
    }
}
