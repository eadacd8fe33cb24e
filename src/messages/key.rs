//! # Runtime identity of message types.
//!
//! [`TypeKey`] identifies either a **concrete** payload type (the type a value
//! is actually published as) or a **capability**: a trait object type such as
//! `dyn Greeter` that concrete types may declare they satisfy.
//!
//! Routing always starts from the concrete key of a published value; capability
//! keys only ever appear as subscriptions.
//!
//! ## Example
//! ```rust
//! use taskbus::TypeKey;
//!
//! trait Greeter { fn greet(&self) -> String; }
//!
//! let concrete = TypeKey::of::<String>();
//! let capability = TypeKey::capability::<dyn Greeter>();
//!
//! assert!(!concrete.is_capability());
//! assert!(capability.is_capability());
//! assert_ne!(concrete, capability);
//! assert_eq!(TypeKey::any().to_string(), "any");
//! ```

use std::any::{Any, TypeId, type_name};
use std::fmt;

/// Whether a [`TypeKey`] names a concrete type or a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// A sized type that values are published as.
    Concrete,
    /// A trait object type that concrete types may satisfy.
    Capability,
}

/// Identity of a message type, usable as a hash-map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    id: TypeId,
    kind: TypeKind,
    name: &'static str,
}

impl TypeKey {
    /// Key of a concrete payload type.
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            kind: TypeKind::Concrete,
            name: type_name::<T>(),
        }
    }

    /// Key of a capability, usually a trait object type like `dyn Greeter`.
    pub fn capability<C: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<C>(),
            kind: TypeKind::Capability,
            name: type_name::<C>(),
        }
    }

    /// The universal capability: satisfied by every concrete type.
    pub fn any() -> Self {
        Self::capability::<dyn Any + Send + Sync>()
    }

    /// True if this key names a capability rather than a concrete type.
    pub fn is_capability(&self) -> bool {
        self.kind == TypeKind::Capability
    }

    /// True if this key is the universal capability.
    pub fn is_any(&self) -> bool {
        *self == Self::any()
    }

    /// Returns the kind of this key.
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Returns the underlying [`TypeId`].
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the Rust type name (as reported by [`std::any::type_name`]).
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            f.write_str("any")
        } else {
            f.write_str(self.name)
        }
    }
}
