//! # Pump: per-participant relay from outbox to bus.
//!
//! Accepts everything its participant publishes into an unbounded FIFO, so a
//! publisher is never blocked by slow delivery, and forwards the FIFO to the
//! orchestrator's bus channel in order.
//!
//! ## Architecture
//! ```text
//! Context::send() ──► [outbox] ──► Pump ──► VecDeque<Envelope> ──► [bus] ──► orchestrator
//!                                   │
//!                                   └─ stamps sequence number on accept
//! ```
//!
//! ## Rules
//! - Envelopes leave in the order their payloads were accepted.
//! - Forwarding is preferred over accepting when both are possible.
//! - When the participant returns, the outbox is closed; already-accepted
//!   payloads are still drained and forwarded.
//! - Ends once the outbox is closed and the FIFO is empty, or on session cancel.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::core::participant::ParticipantId;
use crate::messages::{Envelope, Payload, Sequence};

/// Relay task for one participant's outbox.
pub(crate) struct Pump {
    sender: ParticipantId,
    name: Arc<str>,
    outbox: mpsc::Receiver<Payload>,
    returned: CancellationToken,
    bus: mpsc::Sender<Envelope>,
    seq: Arc<Sequence>,
    queue: VecDeque<Envelope>,
}

impl Pump {
    pub(crate) fn new(
        sender: ParticipantId,
        name: Arc<str>,
        outbox: mpsc::Receiver<Payload>,
        returned: CancellationToken,
        bus: mpsc::Sender<Envelope>,
        seq: Arc<Sequence>,
    ) -> Self {
        Self {
            sender,
            name,
            outbox,
            returned,
            bus,
            seq,
            queue: VecDeque::new(),
        }
    }

    /// Runs the relay loop until the outbox is drained or `token` is cancelled.
    pub(crate) async fn run(mut self, token: CancellationToken) {
        let mut open = true;
        let mut closing = false;
        let mut forwarded = 0_u64;

        while open || !self.queue.is_empty() {
            tokio::select! {
                biased;

                _ = token.cancelled() => break,

                _ = self.returned.cancelled(), if open && !closing => {
                    self.outbox.close();
                    closing = true;
                }

                permit = self.bus.reserve(), if !self.queue.is_empty() => {
                    let Ok(permit) = permit else { break };
                    if let Some(envelope) = self.queue.pop_front() {
                        trace!(sender = %self.name, seq = envelope.sequence, "forwarding");
                        permit.send(envelope);
                        forwarded += 1;
                    }
                }

                payload = self.outbox.recv(), if open => match payload {
                    Some(payload) => {
                        let envelope = Envelope::stamp(
                            self.sender,
                            Arc::clone(&self.name),
                            payload,
                            &self.seq,
                        );
                        self.queue.push_back(envelope);
                    }
                    None => open = false,
                },
            }
        }

        debug!(
            sender = %self.name,
            forwarded,
            pending = self.queue.len(),
            "pump stopped"
        );
    }
}
