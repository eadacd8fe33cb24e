//! # Messages as seen by behaviors.
//!
//! A [`Message`] is what arrives in a participant's inbox: an erased payload
//! together with its concrete [`TypeKey`], the sequence number stamped by the
//! sender's pump, and the sender's name.
//!
//! Recipients get the payload back either by concrete type
//! ([`Message::downcast_ref`]) or through a declared capability
//! ([`Message::view`]).
//!
//! ## Example
//! ```rust
//! # async fn demo(mut ctx: taskbus::Context) -> Result<(), taskbus::BehaviorError> {
//! let msg = ctx.recv().await?;
//! if let Some(text) = msg.downcast_ref::<String>() {
//!     println!("#{} from {}: {text}", msg.sequence(), msg.sender());
//! }
//! # Ok(())
//! # }
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::capability::{CapabilitiesRef, Value};
use super::key::TypeKey;

/// A payload accepted from an outbox, before the pump stamps it.
///
/// The concrete key is captured here, at the last point where the static type
/// is still known.
pub(crate) struct Payload {
    pub(crate) key: TypeKey,
    pub(crate) value: Arc<Value>,
}

impl Payload {
    pub(crate) fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            key: TypeKey::of::<T>(),
            value: Arc::new(value),
        }
    }
}

/// A delivered message. Cheap to clone: the payload is shared.
#[derive(Clone)]
pub struct Message {
    key: TypeKey,
    sequence: u64,
    sender: Arc<str>,
    value: Arc<Value>,
    capabilities: CapabilitiesRef,
}

impl Message {
    pub(crate) fn new(
        key: TypeKey,
        sequence: u64,
        sender: Arc<str>,
        value: Arc<Value>,
        capabilities: CapabilitiesRef,
    ) -> Self {
        Self {
            key,
            sequence,
            sender,
            value,
            capabilities,
        }
    }

    /// Concrete type of the payload.
    pub fn type_key(&self) -> TypeKey {
        self.key
    }

    /// Session-unique, monotonically increasing publish sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Name of the behavior that published this message.
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// True if the payload's concrete type is `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Borrows the payload as its concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Borrows the payload through a capability declared with
    /// [`BusBuilder::implements`](crate::BusBuilder::implements).
    ///
    /// Returns `None` if the payload's concrete type did not declare `C`.
    pub fn view<C: ?Sized + 'static>(&self) -> Option<&C> {
        self.capabilities.view::<C>(self.key, self.value.as_ref())
    }

    /// Borrows the erased payload.
    pub fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self.value.as_ref()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("type", &self.key.name())
            .field("sequence", &self.sequence)
            .field("sender", &self.sender)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::capability::Capabilities;

    trait Loud {
        fn shout(&self) -> String;
    }

    struct Word(&'static str);
    impl Loud for Word {
        fn shout(&self) -> String {
            self.0.to_uppercase()
        }
    }

    fn message<T: Any + Send + Sync>(value: T, caps: Capabilities) -> Message {
        let payload = Payload::new(value);
        Message::new(payload.key, 7, Arc::from("sender"), payload.value, Arc::new(caps))
    }

    #[test]
    fn downcast_by_concrete_type() {
        let msg = message(String::from("hi"), Capabilities::new());
        assert!(msg.is::<String>());
        assert_eq!(msg.downcast_ref::<String>().map(String::as_str), Some("hi"));
        assert!(msg.downcast_ref::<&str>().is_none());
        assert_eq!(msg.type_key(), TypeKey::of::<String>());
        assert_eq!(msg.sequence(), 7);
        assert_eq!(msg.sender(), "sender");
    }

    #[test]
    fn view_through_declared_capability() {
        let mut caps = Capabilities::new();
        caps.insert::<Word, dyn Loud>(|w| w);

        let msg = message(Word("hey"), caps);
        assert_eq!(msg.view::<dyn Loud>().map(|l| l.shout()), Some("HEY".into()));

        let plain = message(42_u8, Capabilities::new());
        assert!(plain.view::<dyn Loud>().is_none());
    }

    #[test]
    fn unit_payload_is_a_real_message() {
        let msg = message((), Capabilities::new());
        assert!(msg.is::<()>());
    }
}
