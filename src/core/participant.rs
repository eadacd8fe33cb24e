//! # Participant: one behavior and its session-side plumbing.
//!
//! A [`Participant`] pairs a user [`Behavior`] with the channels the
//! orchestrator needs to drive it:
//!
//! ```text
//!                      ┌──────────────── Participant ────────────────┐
//!  orchestrator ──────►│ inbox tx  ──► [inbox]  ──► Context::recv()  │
//!  (deliver)           │                                             │
//!                      │ Context::send() ──► [outbox] ──► outbox rx  │──► Pump ──► bus
//!                      │                                             │
//!                      │ returned: CancellationToken (fired on exit) │
//!                      └─────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//! `Created` ──call()──► `Running` ──ready signal──► `Ready` ──behavior exits──► `Returned`
//!
//! ## Rules
//! - `call` runs the behavior **exactly once**; panics are caught and reported
//!   as [`Outcome::Panicked`].
//! - On exit the [`Context`] (and with it the outbox sender) is dropped
//!   **before** the `returned` token fires, and the token fires **before** the
//!   orchestrator observes the outcome.
//! - `deliver` never fails: a message for a participant that has returned is dropped.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::behaviors::{BehaviorRef, Context, Inbox, Outbox};
use crate::core::pump::Pump;
use crate::error::BehaviorError;
use crate::messages::{Envelope, Message, Payload, Sequence, TypeKey};

/// Inbox channel capacity. Fan-out waits for every recipient, so this only
/// lets one message sit ready for a recipient that is busy elsewhere.
const INBOX_CAPACITY: usize = 1;

/// Outbox channel capacity. The pump drains it continuously into its own
/// unbounded queue once the barrier opens.
const OUTBOX_CAPACITY: usize = 1;

/// Identity of a participant within one session (its position in the run list).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ParticipantId(pub(crate) usize);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Participant lifecycle state, as tracked by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Created,
    Running,
    Ready,
    Returned,
}

/// How a behavior finished.
#[derive(Debug)]
pub(crate) enum Outcome {
    Completed(Result<(), BehaviorError>),
    Panicked(String),
}

/// Sent by [`Context::ready`]; the orchestrator acknowledges on `ack` once the
/// subscriptions are merged into the registry.
pub(crate) struct ReadySignal {
    pub(crate) id: ParticipantId,
    pub(crate) subscriptions: HashSet<TypeKey>,
    pub(crate) ack: oneshot::Sender<()>,
}

/// Session-wide handles every participant's [`Context`] is built from.
pub(crate) struct Wiring {
    pub(crate) token: CancellationToken,
    pub(crate) ready: mpsc::Sender<ReadySignal>,
    pub(crate) barrier: watch::Receiver<bool>,
}

/// Behavior plus its context, held until `call` spawns them.
struct Launch {
    behavior: BehaviorRef,
    ctx: Context,
}

/// Orchestrator-side record of one participant.
pub(crate) struct Participant {
    pub(crate) id: ParticipantId,
    pub(crate) name: Arc<str>,
    pub(crate) state: State,
    inbox: Option<mpsc::Sender<Message>>,
    outbox: Option<mpsc::Receiver<Payload>>,
    returned: CancellationToken,
    launch: Option<Launch>,
}

impl Participant {
    /// Creates the participant and the [`Context`] its behavior will receive.
    pub(crate) fn new(id: ParticipantId, behavior: BehaviorRef, wiring: &Wiring) -> Self {
        let name: Arc<str> = Arc::from(behavior.name());
        let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
        let (outbox_tx, outbox_rx) = mpsc::channel(OUTBOX_CAPACITY);
        let token = wiring.token.child_token();

        let ctx = Context::new(
            id,
            Arc::clone(&name),
            token.clone(),
            wiring.ready.clone(),
            Inbox::new(inbox_rx),
            Outbox::new(outbox_tx, wiring.barrier.clone(), token),
        );

        Self {
            id,
            name,
            state: State::Created,
            inbox: Some(inbox_tx),
            outbox: Some(outbox_rx),
            returned: CancellationToken::new(),
            launch: Some(Launch { behavior, ctx }),
        }
    }

    /// Returns the future that runs the behavior once and reports its outcome.
    ///
    /// Yields `None` if the participant was already called.
    pub(crate) fn call(
        &mut self,
    ) -> Option<impl Future<Output = (ParticipantId, Outcome)> + Send + use<>> {
        let Launch { behavior, ctx } = self.launch.take()?;
        self.state = State::Running;

        let id = self.id;
        let name = Arc::clone(&self.name);
        let returned = self.returned.clone();

        Some(async move {
            debug!(participant = %name, "invoking behavior");

            let outcome = match AssertUnwindSafe(behavior.run(ctx)).catch_unwind().await {
                Ok(result) => Outcome::Completed(result),
                Err(panic) => Outcome::Panicked(panic_message(panic.as_ref())),
            };

            returned.cancel();
            (id, outcome)
        })
    }

    /// Hands the outbox receiver to a new [`Pump`].
    ///
    /// Yields `None` if the pump was already started.
    pub(crate) fn pump(&mut self, bus: mpsc::Sender<Envelope>, seq: Arc<Sequence>) -> Option<Pump> {
        let outbox = self.outbox.take()?;
        Some(Pump::new(
            self.id,
            Arc::clone(&self.name),
            outbox,
            self.returned.clone(),
            bus,
            seq,
        ))
    }

    /// Places `message` into the inbox.
    ///
    /// Races session cancellation against this participant's own exit against
    /// the inbox having room. Returns `true` if the message was accepted.
    pub(crate) async fn deliver(
        &self,
        token: &CancellationToken,
        envelope: &Envelope,
        message: Message,
    ) -> bool {
        let Some(inbox) = &self.inbox else {
            return false;
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => false,
            _ = self.returned.cancelled() => {
                debug!(
                    participant = %self.name,
                    message = %envelope.key,
                    seq = envelope.sequence,
                    "message not delivered, participant returned"
                );
                false
            }
            res = inbox.send(message) => {
                trace!(
                    participant = %self.name,
                    message = %envelope.key,
                    seq = envelope.sequence,
                    "message delivered"
                );
                res.is_ok()
            }
        }
    }

    /// Closes the inbox; a behavior blocked on receive wakes with `None`.
    pub(crate) fn close_inbox(&mut self) {
        self.inbox = None;
    }
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .finish()
    }
}

/// Renders a panic payload.
fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
