//! # Envelope: internal routing record for one published message.
//!
//! Built by the sender's pump, consumed by the orchestrator's fan-out.
//! Immutable once constructed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::capability::{CapabilitiesRef, Value};
use super::key::TypeKey;
use super::message::{Message, Payload};
use crate::core::ParticipantId;

/// Per-session sequence source shared by every pump.
#[derive(Debug, Default)]
pub(crate) struct Sequence(AtomicU64);

impl Sequence {
    /// Returns the next sequence number (starting at 1).
    pub(crate) fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// A payload stamped with routing metadata.
pub(crate) struct Envelope {
    pub(crate) sender: ParticipantId,
    pub(crate) sender_name: Arc<str>,
    pub(crate) sequence: u64,
    pub(crate) key: TypeKey,
    value: Arc<Value>,
}

impl Envelope {
    /// Stamps `payload` with the next sequence number.
    pub(crate) fn stamp(
        sender: ParticipantId,
        sender_name: Arc<str>,
        payload: Payload,
        seq: &Sequence,
    ) -> Self {
        Self {
            sender,
            sender_name,
            sequence: seq.next(),
            key: payload.key,
            value: payload.value,
        }
    }

    /// Builds the recipient-facing message (shares the payload).
    pub(crate) fn to_message(&self, capabilities: &CapabilitiesRef) -> Message {
        Message::new(
            self.key,
            self.sequence,
            Arc::clone(&self.sender_name),
            Arc::clone(&self.value),
            Arc::clone(capabilities),
        )
    }
}
