//! # Capability table: which concrete types satisfy which capabilities.
//!
//! Rust has no runtime "does `T` implement trait `C`" query, so capabilities
//! are declared explicitly, once per `(concrete, capability)` pair, when the
//! [`Bus`](crate::Bus) is built:
//!
//! ```rust
//! use taskbus::{Bus, BusConfig};
//!
//! trait Greeter: Send + Sync { fn greet(&self) -> String; }
//!
//! struct English;
//! impl Greeter for English { fn greet(&self) -> String { "hello".into() } }
//!
//! let bus = Bus::builder(BusConfig::default())
//!     .implements::<English, dyn Greeter>(|e| e)
//!     .build();
//! ```
//!
//! The declaration stores an upcast function so that a recipient holding an
//! erased [`Message`](crate::Message) can borrow it as `&dyn Greeter`
//! (see [`Message::view`](crate::Message::view)).
//!
//! ## Rules
//! - Every concrete type satisfies [`TypeKey::any`] without a declaration.
//! - The table is immutable once the bus is built; it is shared by every
//!   session and every delivered message.
//! - The table is only consulted during the registry's lazy expansion step and
//!   by [`Message::view`](crate::Message::view), never per delivery.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use super::key::TypeKey;

/// Erased payload as stored in a message.
pub(crate) type Value = dyn Any + Send + Sync;

/// Upcast from an erased payload to the capability `C`.
trait Upcast<C: ?Sized>: Send + Sync {
    fn upcast<'a>(&self, value: &'a Value) -> Option<&'a C>;
}

/// Typed upcast: recovers `T` from the erased value, then applies the declared conversion.
struct Declared<T, C: ?Sized> {
    convert: fn(&T) -> &C,
}

impl<T, C> Upcast<C> for Declared<T, C>
where
    T: Any + Send + Sync,
    C: ?Sized + 'static,
{
    fn upcast<'a>(&self, value: &'a Value) -> Option<&'a C> {
        value.downcast_ref::<T>().map(self.convert)
    }
}

/// Registered capabilities of one concrete type, keyed by capability `TypeId`.
///
/// Each entry holds a boxed `Upcast<C>` behind `dyn Any`, so that the
/// capability type can be recovered with a downcast at lookup time.
#[derive(Default)]
struct Entry {
    keys: Vec<TypeKey>,
    upcasts: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

/// Immutable-after-build table of capability declarations.
#[derive(Default)]
pub struct Capabilities {
    by_concrete: HashMap<TypeId, Entry>,
}

impl Capabilities {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares that concrete type `T` satisfies capability `C`.
    ///
    /// Re-declaring the same pair replaces the previous conversion.
    pub fn insert<T, C>(&mut self, convert: fn(&T) -> &C)
    where
        T: Any + Send + Sync,
        C: ?Sized + 'static,
    {
        let key = TypeKey::capability::<C>();
        let upcast: Box<dyn Upcast<C>> = Box::new(Declared { convert });

        let entry = self.by_concrete.entry(TypeId::of::<T>()).or_default();
        if entry.upcasts.insert(key.id(), Box::new(upcast)).is_none() {
            entry.keys.push(key);
        }
    }

    /// True if a value of concrete type `concrete` should be delivered to
    /// subscribers of `capability`.
    pub fn satisfies(&self, concrete: TypeKey, capability: TypeKey) -> bool {
        if !capability.is_capability() || concrete.is_capability() {
            return false;
        }
        if capability.is_any() {
            return true;
        }
        self.by_concrete
            .get(&concrete.id())
            .is_some_and(|entry| entry.upcasts.contains_key(&capability.id()))
    }

    /// Declared capabilities of `concrete` (excluding the universal one).
    pub fn of(&self, concrete: TypeKey) -> &[TypeKey] {
        self.by_concrete
            .get(&concrete.id())
            .map(|entry| entry.keys.as_slice())
            .unwrap_or_default()
    }

    /// Number of declared `(concrete, capability)` pairs.
    pub fn len(&self) -> usize {
        self.by_concrete.values().map(|e| e.keys.len()).sum()
    }

    /// True if nothing was declared.
    pub fn is_empty(&self) -> bool {
        self.by_concrete.is_empty()
    }

    /// Borrows `value` (whose concrete key is `concrete`) as capability `C`.
    pub(crate) fn view<'a, C: ?Sized + 'static>(
        &self,
        concrete: TypeKey,
        value: &'a Value,
    ) -> Option<&'a C> {
        let upcast = self
            .by_concrete
            .get(&concrete.id())?
            .upcasts
            .get(&TypeId::of::<C>())?
            .downcast_ref::<Box<dyn Upcast<C>>>()?;
        upcast.upcast(value)
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("declared", &self.len())
            .finish()
    }
}

/// Shared handle to a built capability table.
pub(crate) type CapabilitiesRef = Arc<Capabilities>;

#[cfg(test)]
mod tests {
    use super::*;

    trait Named {
        fn name(&self) -> &str;
    }

    struct Cat(String);
    impl Named for Cat {
        fn name(&self) -> &str {
            &self.0
        }
    }

    struct Rock;

    fn table() -> Capabilities {
        let mut caps = Capabilities::new();
        caps.insert::<Cat, dyn Named>(|c| c);
        caps
    }

    #[test]
    fn declared_pairs_are_satisfied() {
        let caps = table();
        let named = TypeKey::capability::<dyn Named>();

        assert!(caps.satisfies(TypeKey::of::<Cat>(), named));
        assert!(!caps.satisfies(TypeKey::of::<Rock>(), named));
        assert_eq!(caps.of(TypeKey::of::<Cat>()), &[named]);
        assert!(caps.of(TypeKey::of::<Rock>()).is_empty());
    }

    #[test]
    fn any_is_satisfied_by_every_concrete_type() {
        let caps = Capabilities::new();
        assert!(caps.satisfies(TypeKey::of::<Rock>(), TypeKey::any()));
        assert!(caps.satisfies(TypeKey::of::<()>(), TypeKey::any()));
        // Concrete keys are never "satisfied", they match by equality only.
        assert!(!caps.satisfies(TypeKey::of::<Rock>(), TypeKey::of::<Rock>()));
    }

    #[test]
    fn view_upcasts_erased_value() {
        let caps = table();
        let value: Box<Value> = Box::new(Cat("tom".into()));

        let named = caps.view::<dyn Named>(TypeKey::of::<Cat>(), value.as_ref());
        assert_eq!(named.map(|n| n.name()), Some("tom"));

        let rock: Box<Value> = Box::new(Rock);
        assert!(caps.view::<dyn Named>(TypeKey::of::<Rock>(), rock.as_ref()).is_none());
    }

    #[test]
    fn redeclaring_does_not_duplicate() {
        let mut caps = table();
        caps.insert::<Cat, dyn Named>(|c| c);
        assert_eq!(caps.len(), 1);
    }
}
