//! # Behavior context: the participant's handle to its session.
//!
//! Every behavior receives exactly one [`Context`]. It carries:
//! - the participant's name and cancellation token,
//! - the subscription declarations (accepted only before [`Context::ready`]),
//! - the [`Inbox`] (messages routed to this participant),
//! - the [`Outbox`] (messages this participant publishes).
//!
//! ## Startup protocol
//! ```text
//! subscribe::<A>()          ─┐
//! subscribe_capability::<C>()├─ collected locally
//! subscribe_any()           ─┘
//! ready().await             ──► orchestrator merges subscriptions, acks
//!                               (publishing stays held until every
//!                                participant is ready or has returned)
//! ```
//!
//! ## Rules
//! - Subscribing after `ready` is a programming error and panics.
//! - `ready` is idempotent and never fails; on cancellation it returns early.
//! - `send`/`recv` return [`BehaviorError::Canceled`] once the session is
//!   cancelled or torn down.

use std::any::Any;
use std::collections::HashSet;
use std::mem;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::core::{ParticipantId, ReadySignal};
use crate::error::BehaviorError;
use crate::messages::{Message, Payload, TypeKey};

/// Receiving side of a participant: messages routed to it, in arrival order.
#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::Receiver<Message>,
}

impl Inbox {
    pub(crate) fn new(rx: mpsc::Receiver<Message>) -> Self {
        Self { rx }
    }

    /// Waits for the next message.
    ///
    /// Returns `None` once the session has closed this inbox (the participant
    /// was evicted or the session is tearing down).
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Returns a message if one is already waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}

/// Publishing side of a participant. Cheap to clone.
///
/// Sends block until the session barrier opens, i.e. until every participant
/// has either signalled ready or returned. After that the sender's pump
/// accepts everything without waiting on recipients.
///
/// The barrier may never open (startup can end on an error, a cancel or the
/// deadline), so every wait also races the participant's token.
#[derive(Clone, Debug)]
pub struct Outbox {
    tx: mpsc::Sender<Payload>,
    barrier: watch::Receiver<bool>,
    token: CancellationToken,
}

impl Outbox {
    pub(crate) fn new(
        tx: mpsc::Sender<Payload>,
        barrier: watch::Receiver<bool>,
        token: CancellationToken,
    ) -> Self {
        Self { tx, barrier, token }
    }

    /// Publishes `value` to every subscriber of its type (and of any capability
    /// it was declared to implement), except this participant.
    ///
    /// Returns [`BehaviorError::Canceled`] if the session ends before the
    /// message is accepted.
    pub async fn send<T: Any + Send + Sync>(&self, value: T) -> Result<(), BehaviorError> {
        let mut barrier = self.barrier.clone();
        let accepted = async {
            barrier.wait_for(|open| *open).await.map_err(|_| ())?;
            self.tx.send(Payload::new(value)).await.map_err(|_| ())
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(BehaviorError::Canceled),
            res = accepted => res.map_err(|_| BehaviorError::Canceled),
        }
    }
}

/// A participant's handle to its session.
pub struct Context {
    id: ParticipantId,
    name: Arc<str>,
    token: CancellationToken,
    subscriptions: HashSet<TypeKey>,
    ready: Option<mpsc::Sender<ReadySignal>>,
    inbox: Inbox,
    outbox: Outbox,
}

impl Context {
    pub(crate) fn new(
        id: ParticipantId,
        name: Arc<str>,
        token: CancellationToken,
        ready: mpsc::Sender<ReadySignal>,
        inbox: Inbox,
        outbox: Outbox,
    ) -> Self {
        Self {
            id,
            name,
            token,
            subscriptions: HashSet::new(),
            ready: Some(ready),
            inbox,
            outbox,
        }
    }

    /// Name of the behavior this context belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Session cancellation token (a child; cancelling it does not affect others).
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// True once the session has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the session is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Subscribes to messages whose concrete type is `T`.
    ///
    /// # Panics
    /// If called after [`Context::ready`].
    pub fn subscribe<T: Any + Send + Sync>(&mut self) -> &mut Self {
        self.declare(TypeKey::of::<T>())
    }

    /// Subscribes to messages whose concrete type was declared to implement `C`
    /// (see [`BusBuilder::implements`](crate::BusBuilder::implements)).
    ///
    /// # Panics
    /// If called after [`Context::ready`].
    pub fn subscribe_capability<C: ?Sized + 'static>(&mut self) -> &mut Self {
        self.declare(TypeKey::capability::<C>())
    }

    /// Subscribes to every message.
    ///
    /// # Panics
    /// If called after [`Context::ready`].
    pub fn subscribe_any(&mut self) -> &mut Self {
        self.declare(TypeKey::any())
    }

    /// Hands the subscriptions to the session and waits until they are in effect.
    ///
    /// Idempotent: later calls return immediately. Returns early, without
    /// error, if the session is cancelled meanwhile.
    pub async fn ready(&mut self) {
        let Some(ready) = self.ready.take() else {
            return;
        };

        let (ack, acked) = oneshot::channel();
        let signal = ReadySignal {
            id: self.id,
            subscriptions: mem::take(&mut self.subscriptions),
            ack,
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => {}
            _ = async {
                if ready.send(signal).await.is_ok() {
                    let _ = acked.await;
                }
            } => {
                trace!(participant = %self.name, "ready acknowledged");
            }
        }
    }

    /// True once [`Context::ready`] has been called.
    pub fn is_ready(&self) -> bool {
        self.ready.is_none()
    }

    /// Messages routed to this participant.
    pub fn inbox(&mut self) -> &mut Inbox {
        &mut self.inbox
    }

    /// A handle for publishing, e.g. from a helper task.
    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    /// Publishes `value`, racing cancellation of the session.
    pub async fn send<T: Any + Send + Sync>(&self, value: T) -> Result<(), BehaviorError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(BehaviorError::Canceled),
            res = self.outbox.send(value) => res,
        }
    }

    /// Receives the next message, or [`BehaviorError::Canceled`] if the session
    /// is cancelled or the inbox has been closed.
    pub async fn recv(&mut self) -> Result<Message, BehaviorError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(BehaviorError::Canceled),
            msg = self.inbox.recv() => msg.ok_or(BehaviorError::Canceled),
        }
    }

    fn declare(&mut self, key: TypeKey) -> &mut Self {
        assert!(
            self.ready.is_some(),
            "taskbus: {}: subscribe must not be called after ready()",
            self.name
        );
        trace!(participant = %self.name, subscription = %key, "subscribed");
        self.subscriptions.insert(key);
        self
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.name)
            .field("ready", &self.is_ready())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rig {
        ctx: Context,
        ready: mpsc::Receiver<ReadySignal>,
        barrier: watch::Sender<bool>,
        inbox: mpsc::Sender<Message>,
        outbox: mpsc::Receiver<Payload>,
    }

    fn rig() -> Rig {
        let (ready_tx, ready) = mpsc::channel(1);
        let (barrier, barrier_rx) = watch::channel(false);
        let (inbox, inbox_rx) = mpsc::channel(1);
        let (outbox_tx, outbox) = mpsc::channel(1);
        let token = CancellationToken::new();
        let ctx = Context::new(
            ParticipantId(1),
            Arc::from("ctx-test"),
            token.clone(),
            ready_tx,
            Inbox::new(inbox_rx),
            Outbox::new(outbox_tx, barrier_rx, token),
        );
        Rig {
            ctx,
            ready,
            barrier,
            inbox,
            outbox,
        }
    }

    #[tokio::test]
    async fn ready_hands_over_subscriptions_once() {
        let mut rig = rig();
        rig.ctx.subscribe::<String>().subscribe_any();

        let mut ready = rig.ready;
        let orchestrator = tokio::spawn(async move {
            let signal = ready.recv().await.expect("ready signal");
            assert_eq!(signal.id, ParticipantId(1));
            assert_eq!(signal.subscriptions.len(), 2);
            assert!(signal.subscriptions.contains(&TypeKey::any()));
            signal.ack.send(()).expect("ack");
            ready
        });

        rig.ctx.ready().await;
        assert!(rig.ctx.is_ready());

        // Second call is a no-op; the orchestrator sees nothing more.
        rig.ctx.ready().await;
        let mut ready = orchestrator.await.expect("orchestrator");
        assert!(ready.try_recv().is_err());
    }

    #[tokio::test]
    #[should_panic(expected = "subscribe must not be called after ready()")]
    async fn subscribe_after_ready_panics() {
        let mut rig = rig();
        rig.ctx.token.cancel();
        rig.ctx.ready().await;
        rig.ctx.subscribe::<u8>();
    }

    #[tokio::test]
    async fn send_waits_for_barrier() {
        let mut rig = rig();
        let outbox = rig.ctx.outbox();

        let send = tokio::spawn(async move { outbox.send(7_u32).await });
        tokio::task::yield_now().await;
        assert!(rig.outbox.try_recv().is_err());

        rig.barrier.send_replace(true);
        send.await.expect("join").expect("sent");
        let payload = rig.outbox.recv().await.expect("payload");
        assert_eq!(payload.key, TypeKey::of::<u32>());
    }

    #[tokio::test]
    async fn outbox_send_gives_up_on_cancel_while_barrier_closed() {
        let rig = rig();
        let outbox = rig.ctx.outbox();

        let send = tokio::spawn(async move { outbox.send(7_u32).await });
        tokio::task::yield_now().await;
        assert!(!send.is_finished());

        rig.ctx.token.cancel();
        assert_eq!(send.await.expect("join"), Err(BehaviorError::Canceled));
        assert!(!*rig.barrier.borrow());
    }

    #[tokio::test]
    async fn recv_reports_cancellation_and_closed_inbox() {
        let mut closed = rig();
        drop(closed.inbox);
        assert_eq!(closed.ctx.recv().await.unwrap_err(), BehaviorError::Canceled);

        let mut cancelled = rig();
        cancelled.ctx.token.cancel();
        assert_eq!(cancelled.ctx.recv().await.unwrap_err(), BehaviorError::Canceled);
        assert_eq!(cancelled.ctx.send(1_u8).await, Err(BehaviorError::Canceled));
    }
}
