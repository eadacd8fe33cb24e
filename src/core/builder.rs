use std::sync::Arc;

use crate::core::{BusConfig, bus::Bus};
use crate::messages::Capabilities;

/// Builder for constructing a [`Bus`] with capability declarations.
///
/// Capabilities are declared once, up front: a message whose concrete type is
/// `T` is delivered to subscribers of `C` only if `implements::<T, C>` was
/// called.
///
/// # Example
/// ```rust
/// use std::fmt::Display;
/// use taskbus::{Bus, BusConfig};
///
/// let bus = Bus::builder(BusConfig::default())
///     .implements::<String, dyn Display + Send + Sync>(|s| s)
///     .implements::<u64, dyn Display + Send + Sync>(|n| n)
///     .build();
/// assert_eq!(bus.capabilities().len(), 2);
/// ```
pub struct BusBuilder {
    cfg: BusConfig,
    capabilities: Capabilities,
}

impl BusBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: BusConfig) -> Self {
        Self {
            cfg,
            capabilities: Capabilities::new(),
        }
    }

    /// Declares that messages of concrete type `T` satisfy capability `C`.
    ///
    /// `convert` is the upcast from `&T` to `&C`; for a trait object it is
    /// simply `|t| t`.
    pub fn implements<T, C>(mut self, convert: fn(&T) -> &C) -> Self
    where
        T: std::any::Any + Send + Sync,
        C: ?Sized + 'static,
    {
        self.capabilities.insert::<T, C>(convert);
        self
    }

    /// Builds the bus. The declarations are frozen from here on.
    pub fn build(self) -> Bus {
        Bus::from_parts(self.cfg, Arc::new(self.capabilities))
    }
}
