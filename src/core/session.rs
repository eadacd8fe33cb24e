//! # Session: one run of a set of behaviors.
//!
//! The [`Session`] is the orchestrator. It owns every participant record, the
//! subscription [`Registry`], the bus channel fed by the pumps, and the
//! session cancellation token. It is the single writer of all of them.
//!
//! ## Phases
//! ```text
//! Startup (phase A):
//!   spawn every behavior ──► wait until each participant has either
//!                              ├─ signalled ready   → merge subscriptions, ack
//!                              └─ returned          → evict, Err? → fail
//!
//! Barrier:
//!   barrier.send_replace(true) ──► outboxes start accepting
//!   spawn one Pump per remaining participant
//!
//! Exchange (phase B), until no participant remains:
//!   ├─ interrupt (caller cancel / deadline)  → fail
//!   ├─ behavior returned                     → evict, Err? → fail
//!   └─ envelope on bus                       → fan_out: deliver to every
//!                                               subscriber except the sender,
//!                                               concurrently, wait for all
//!
//! Teardown (always):
//!   cancel session token ──► close inboxes ──► join behaviors ──► join pumps
//! ```
//!
//! ## Rules
//! - **First error wins**: later failures are logged and discarded.
//! - **Eviction order**: unregister from the registry, then close the inbox.
//! - A participant is never a recipient of its own messages.
//! - The result is only returned after every behavior task has been joined.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::behaviors::BehaviorRef;
use crate::core::participant::{Outcome, Participant, ParticipantId, ReadySignal, State, Wiring};
use crate::core::registry::Registry;
use crate::error::BusError;
use crate::messages::{CapabilitiesRef, Envelope, Sequence};

/// Capacity of the pump → orchestrator channel.
const BUS_CAPACITY: usize = 1;

/// External reasons for a session to stop: caller cancellation or the deadline.
pub(crate) struct Interrupt {
    parent: CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

impl Interrupt {
    pub(crate) fn new(parent: CancellationToken, timeout: Option<Duration>) -> Self {
        Self {
            parent,
            deadline: timeout.map(|t| (Instant::now() + t, t)),
        }
    }

    /// Resolves once the session must stop, with the reason.
    async fn wait(&self) -> BusError {
        match self.deadline {
            Some((at, timeout)) => tokio::select! {
                biased;
                _ = self.parent.cancelled() => BusError::Canceled,
                _ = time::sleep_until(at) => BusError::DeadlineExceeded { timeout },
            },
            None => {
                self.parent.cancelled().await;
                BusError::Canceled
            }
        }
    }
}

/// Orchestrator state for one run.
pub(crate) struct Session {
    token: CancellationToken,
    participants: HashMap<ParticipantId, Participant>,
    registry: Registry,
    capabilities: CapabilitiesRef,
    calls: JoinSet<(ParticipantId, Outcome)>,
    pumps: JoinSet<()>,
    ready: mpsc::Receiver<ReadySignal>,
    bus_tx: mpsc::Sender<Envelope>,
    bus_rx: mpsc::Receiver<Envelope>,
    barrier: watch::Sender<bool>,
    sequence: Arc<Sequence>,
    failure: Option<BusError>,
}

impl Session {
    /// Wires up a participant for every behavior. Nothing runs yet.
    pub(crate) fn new(
        parent: &CancellationToken,
        capabilities: CapabilitiesRef,
        behaviors: Vec<BehaviorRef>,
    ) -> Self {
        let token = parent.child_token();
        let (ready_tx, ready) = mpsc::channel(behaviors.len().max(1));
        let (barrier, barrier_rx) = watch::channel(false);
        let (bus_tx, bus_rx) = mpsc::channel(BUS_CAPACITY);

        let wiring = Wiring {
            token: token.clone(),
            ready: ready_tx,
            barrier: barrier_rx,
        };

        let participants = behaviors
            .into_iter()
            .enumerate()
            .map(|(i, behavior)| {
                let id = ParticipantId(i);
                (id, Participant::new(id, behavior, &wiring))
            })
            .collect();

        Self {
            token,
            participants,
            registry: Registry::new(Arc::clone(&capabilities)),
            capabilities,
            calls: JoinSet::new(),
            pumps: JoinSet::new(),
            ready,
            bus_tx,
            bus_rx,
            barrier,
            sequence: Arc::new(Sequence::default()),
            failure: None,
        }
    }

    /// Runs the session to completion and returns the first error, if any.
    pub(crate) async fn run(mut self, interrupt: Interrupt) -> Result<(), BusError> {
        if self.participants.is_empty() {
            return Ok(());
        }

        let mut result = self.start(&interrupt).await;
        if result.is_ok() {
            result = self.exchange(&interrupt).await;
        }
        if let Err(err) = result {
            self.fail(err);
        }

        self.teardown().await;

        match self.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Phase A: invoke every behavior and wait for each to be ready or gone.
    async fn start(&mut self, interrupt: &Interrupt) -> Result<(), BusError> {
        for participant in self.participants.values_mut() {
            if let Some(call) = participant.call() {
                self.calls.spawn(call);
            }
        }

        let mut pending: HashSet<ParticipantId> = self.participants.keys().copied().collect();
        debug!(participants = pending.len(), "waiting for participants to be ready");

        while !pending.is_empty() && !self.calls.is_empty() {
            tokio::select! {
                biased;

                err = interrupt.wait() => return Err(err),

                Some(joined) = self.calls.join_next() => {
                    if let Some((id, outcome)) = Self::joined(joined) {
                        pending.remove(&id);
                        self.on_return(id, outcome)?;
                    }
                }

                Some(signal) = self.ready.recv() => {
                    if pending.remove(&signal.id) {
                        self.on_ready(signal);
                    }
                }
            }
        }

        Ok(())
    }

    /// Opens the barrier, starts the pumps, then routes until everyone has returned.
    async fn exchange(&mut self, interrupt: &Interrupt) -> Result<(), BusError> {
        self.barrier.send_replace(true);

        for participant in self.participants.values_mut() {
            let seq = Arc::clone(&self.sequence);
            if let Some(pump) = participant.pump(self.bus_tx.clone(), seq) {
                self.pumps.spawn(pump.run(self.token.clone()));
            }
        }
        info!(participants = self.participants.len(), "barrier open");

        while !self.participants.is_empty() && !self.calls.is_empty() {
            tokio::select! {
                biased;

                err = interrupt.wait() => return Err(err),

                Some(joined) = self.calls.join_next() => {
                    if let Some((id, outcome)) = Self::joined(joined) {
                        self.on_return(id, outcome)?;
                    }
                }

                Some(envelope) = self.bus_rx.recv() => {
                    // A recipient that neither reads nor returns must not outlive the deadline.
                    tokio::select! {
                        biased;
                        err = interrupt.wait() => return Err(err),
                        () = self.fan_out(envelope) => {}
                    }
                }
            }
        }

        Ok(())
    }

    /// Cancels the session and waits for every behavior and pump to finish.
    async fn teardown(&mut self) {
        self.token.cancel();
        for participant in self.participants.values_mut() {
            participant.close_inbox();
        }

        while let Some(joined) = self.calls.join_next().await {
            if let Some((id, outcome)) = Self::joined(joined) {
                if let Err(err) = self.on_return(id, outcome) {
                    self.fail(err);
                }
            }
        }

        while let Some(joined) = self.pumps.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "pump task failed");
            }
        }

        self.participants.clear();
        debug!("session torn down");
    }

    /// Merges a ready participant's subscriptions and releases it.
    fn on_ready(&mut self, signal: ReadySignal) {
        let Some(participant) = self.participants.get_mut(&signal.id) else {
            return;
        };

        for key in &signal.subscriptions {
            self.registry.register(participant.id, *key);
        }
        participant.state = State::Ready;

        debug!(
            participant = %participant.name,
            subscriptions = signal.subscriptions.len(),
            "participant ready"
        );
        let _ = signal.ack.send(());
    }

    /// Evicts a participant whose behavior has returned.
    fn on_return(&mut self, id: ParticipantId, outcome: Outcome) -> Result<(), BusError> {
        let memberships = self.registry.unregister(id);
        let Some(mut participant) = self.participants.remove(&id) else {
            return Ok(());
        };
        let from = participant.state;
        participant.state = State::Returned;
        participant.close_inbox();

        match outcome {
            Outcome::Completed(Ok(())) => {
                debug!(participant = %participant.name, ?from, memberships, "participant returned");
                Ok(())
            }
            Outcome::Completed(Err(source)) => {
                warn!(participant = %participant.name, ?from, error = %source, "participant failed");
                Err(BusError::Participant {
                    participant: participant.name.to_string(),
                    source,
                })
            }
            Outcome::Panicked(message) => {
                warn!(participant = %participant.name, ?from, panic = %message, "participant panicked");
                Err(BusError::Panicked {
                    participant: participant.name.to_string(),
                    message,
                })
            }
        }
    }

    /// Delivers one envelope to every current subscriber except its sender.
    async fn fan_out(&mut self, envelope: Envelope) {
        let recipients = self.registry.subscribers(envelope.key);

        let deliveries = recipients
            .iter()
            .filter(|id| **id != envelope.sender)
            .filter_map(|id| self.participants.get(id))
            .map(|p| p.deliver(&self.token, &envelope, envelope.to_message(&self.capabilities)));
        let delivered = join_all(deliveries).await.into_iter().filter(|ok| *ok).count();

        debug!(
            message = %envelope.key,
            seq = envelope.sequence,
            sender = %envelope.sender_name,
            delivered,
            "message routed"
        );
    }

    /// Latches the first error; later ones are only logged.
    fn fail(&mut self, err: BusError) {
        match &self.failure {
            None => {
                info!(error = %err, "session failing");
                self.failure = Some(err);
            }
            Some(first) => {
                debug!(error = %err, first = %first, "discarding error after first failure");
            }
        }
    }

    fn joined(
        joined: Result<(ParticipantId, Outcome), JoinError>,
    ) -> Option<(ParticipantId, Outcome)> {
        match joined {
            Ok(done) => Some(done),
            Err(err) => {
                warn!(error = %err, "behavior task did not complete");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviors::BehaviorFn;
    use crate::error::BehaviorError;
    use crate::messages::Capabilities;

    fn caps() -> CapabilitiesRef {
        Arc::new(Capabilities::new())
    }

    #[tokio::test]
    async fn empty_session_returns_immediately() {
        let token = CancellationToken::new();
        let session = Session::new(&token, caps(), Vec::new());
        assert_eq!(session.run(Interrupt::new(token, None)).await, Ok(()));
    }

    #[tokio::test]
    async fn first_error_is_latched() {
        let token = CancellationToken::new();
        let behaviors = vec![
            BehaviorFn::boxed("first", |_ctx| async { Err(BehaviorError::fail("one")) }),
            BehaviorFn::boxed("second", |ctx| async move {
                ctx.cancelled().await;
                Err(BehaviorError::fail("two"))
            }),
        ];
        let session = Session::new(&token, caps(), behaviors);

        let err = session
            .run(Interrupt::new(token, None))
            .await
            .expect_err("session fails");
        match err {
            BusError::Participant { participant, .. } => assert_eq!(participant, "first"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_session() {
        let token = CancellationToken::new();
        let behaviors = vec![BehaviorFn::boxed("sleeper", |mut ctx| async move {
            ctx.ready().await;
            ctx.cancelled().await;
            Ok(())
        })];
        let session = Session::new(&token, caps(), behaviors);

        let timeout = Duration::from_millis(50);
        let err = session
            .run(Interrupt::new(token, Some(timeout)))
            .await
            .expect_err("deadline hit");
        assert_eq!(err, BusError::DeadlineExceeded { timeout });
    }
}
