//! # Subscription registry: message type → interested participants.
//!
//! Owned and mutated by the session orchestrator only (single writer), so it
//! needs no locking.
//!
//! ## Architecture
//! ```text
//! on_ready(p)      ──► register(p, key)   for each declared key
//! fan_out(env)     ──► subscribers(env.key)
//!                        └─ not finalized? expand: fold members of every
//!                           capability the concrete key satisfies, remember
//!                           the fold in p's memberships, mark finalized
//! on_return(p)     ──► unregister(p)      every set p is in, folded ones included
//! ```
//!
//! ## Rules
//! - Capability entries are finalized at creation: lookups always use
//!   concrete keys, so capability entries never need expansion.
//! - Expansion runs at most once per concrete key per session.
//! - All registrations happen before the barrier opens, so a finalized entry
//!   can only lose members afterwards, never gain them.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::core::participant::ParticipantId;
use crate::messages::{CapabilitiesRef, TypeKey};

/// Members of one type key.
#[derive(Debug)]
struct SubscriberSet {
    members: HashSet<ParticipantId>,
    /// Set once capability subscribers have been folded into a concrete entry.
    finalized: bool,
}

impl SubscriberSet {
    fn for_key(key: TypeKey) -> Self {
        Self {
            members: HashSet::new(),
            finalized: key.is_capability(),
        }
    }
}

/// Type-based subscription index with lazy capability expansion.
pub(crate) struct Registry {
    types: HashMap<TypeKey, SubscriberSet>,
    memberships: HashMap<ParticipantId, HashSet<TypeKey>>,
    capabilities: CapabilitiesRef,
}

impl Registry {
    /// Creates an empty registry that resolves capabilities against `capabilities`.
    pub(crate) fn new(capabilities: CapabilitiesRef) -> Self {
        Self {
            types: HashMap::new(),
            memberships: HashMap::new(),
            capabilities,
        }
    }

    /// Adds `participant` as a subscriber of `key`.
    pub(crate) fn register(&mut self, participant: ParticipantId, key: TypeKey) {
        self.entry(key).members.insert(participant);
        self.memberships.entry(participant).or_default().insert(key);
    }

    /// Returns the current recipients of a message whose concrete type is `key`,
    /// in ascending participant order.
    pub(crate) fn subscribers(&mut self, key: TypeKey) -> Vec<ParticipantId> {
        if !self.entry(key).finalized {
            self.expand(key);
        }

        let mut members: Vec<ParticipantId> = self
            .types
            .get(&key)
            .map(|set| set.members.iter().copied().collect())
            .unwrap_or_default();
        members.sort_unstable();
        members
    }

    /// Removes `participant` from every set it belongs to.
    ///
    /// Returns the number of type keys it was removed from.
    pub(crate) fn unregister(&mut self, participant: ParticipantId) -> usize {
        let Some(keys) = self.memberships.remove(&participant) else {
            return 0;
        };
        for key in &keys {
            if let Some(set) = self.types.get_mut(key) {
                set.members.remove(&participant);
            }
        }
        keys.len()
    }

    /// Type keys `participant` is currently a member of (folded ones included).
    #[cfg(test)]
    pub(crate) fn memberships(&self, participant: ParticipantId) -> usize {
        self.memberships.get(&participant).map_or(0, HashSet::len)
    }

    /// Folds capability subscribers into the concrete entry for `concrete`.
    fn expand(&mut self, concrete: TypeKey) {
        let mut folded = Vec::new();

        for (subscribed, set) in &self.types {
            if *subscribed == concrete || !self.capabilities.satisfies(concrete, *subscribed) {
                continue;
            }
            debug!(
                capability = %subscribed,
                concrete = %concrete,
                members = set.members.len(),
                "subscription index expanded to concrete type"
            );
            folded.extend(set.members.iter().copied());
        }

        for participant in folded {
            self.memberships
                .entry(participant)
                .or_default()
                .insert(concrete);
            self.entry(concrete).members.insert(participant);
        }

        self.entry(concrete).finalized = true;
    }

    /// Returns the set for `key`, creating it if necessary.
    fn entry(&mut self, key: TypeKey) -> &mut SubscriberSet {
        self.types
            .entry(key)
            .or_insert_with(|| SubscriberSet::for_key(key))
    }
}
