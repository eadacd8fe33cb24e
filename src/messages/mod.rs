//! # Message typing and routing metadata.
//!
//! - [`TypeKey`] - runtime identity of a payload type or a capability
//! - [`Capabilities`] - declared `(concrete, capability)` pairs
//! - [`Message`] - a delivered, erased payload with metadata
//! - `Envelope` (internal) - a payload stamped by the sender's pump

mod capability;
mod envelope;
mod key;
mod message;

pub use capability::Capabilities;
pub use key::{TypeKey, TypeKind};
pub use message::Message;

pub(crate) use capability::CapabilitiesRef;
pub(crate) use envelope::{Envelope, Sequence};
pub(crate) use message::Payload;
