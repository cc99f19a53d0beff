//! The subscription index: which live tokens each system owns, and which
//! entities each system currently counts as group members.
//!
//! Only the executor mutates the index. Removal hands tokens back to the
//! caller instead of disposing them here, so the executor decides when
//! release actions run and can log what it released.

use std::collections::BTreeSet;

use reflex_component::Entity;
use slotmap::SecondaryMap;

use crate::system::{Role, SystemId};
use crate::token::SubscriptionToken;

/// A token together with the role that produced it.
#[derive(Debug)]
pub(crate) struct IndexedToken {
    pub role: Role,
    pub token: SubscriptionToken,
}

/// System → ordered live tokens, plus system → current members.
#[derive(Debug, Default)]
pub(crate) struct SubscriptionIndex {
    entries: SecondaryMap<SystemId, Vec<IndexedToken>>,
    members: SecondaryMap<SystemId, BTreeSet<Entity>>,
}

impl SubscriptionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty entry for `system` if it has none.
    pub fn ensure_entry(&mut self, system: SystemId) {
        if !self.entries.contains_key(system) {
            self.entries.insert(system, Vec::new());
        }
    }

    pub fn has_entry(&self, system: SystemId) -> bool {
        self.entries.contains_key(system)
    }

    /// Record a token, creating the entry on first use.
    pub fn insert(&mut self, system: SystemId, role: Role, token: SubscriptionToken) {
        self.ensure_entry(system);
        if let Some(tokens) = self.entries.get_mut(system) {
            tokens.push(IndexedToken { role, token });
        }
    }

    /// Returns `true` if `system` holds a token for `entity` from `role`.
    pub fn has_live(&self, system: SystemId, entity: Entity, role: Role) -> bool {
        self.entries.get(system).is_some_and(|tokens| {
            tokens
                .iter()
                .any(|indexed| indexed.role == role && indexed.token.is_for(entity))
        })
    }

    /// Returns `true` if `system` holds any token from `role`.
    pub fn has_role(&self, system: SystemId, role: Role) -> bool {
        self.entries
            .get(system)
            .is_some_and(|tokens| tokens.iter().any(|indexed| indexed.role == role))
    }

    /// Number of tokens `system` holds.
    pub fn len(&self, system: SystemId) -> usize {
        self.entries.get(system).map_or(0, Vec::len)
    }

    /// Number of tokens `system` holds for `entity`.
    pub fn count_for(&self, system: SystemId, entity: Entity) -> usize {
        self.entries.get(system).map_or(0, |tokens| {
            tokens
                .iter()
                .filter(|indexed| indexed.token.is_for(entity))
                .count()
        })
    }

    /// Number of tokens across every system.
    pub fn total(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Record `entity` as a member of `system`'s group.
    ///
    /// Returns `false` if it already was one.
    pub fn join(&mut self, system: SystemId, entity: Entity) -> bool {
        if !self.members.contains_key(system) {
            self.members.insert(system, BTreeSet::new());
        }
        self.members
            .get_mut(system)
            .is_some_and(|members| members.insert(entity))
    }

    /// Forget `entity` as a member of `system`'s group.
    ///
    /// Returns `false` if it was not one.
    pub fn leave(&mut self, system: SystemId, entity: Entity) -> bool {
        self.members
            .get_mut(system)
            .is_some_and(|members| members.remove(&entity))
    }

    pub fn is_member(&self, system: SystemId, entity: Entity) -> bool {
        self.members
            .get(system)
            .is_some_and(|members| members.contains(&entity))
    }

    /// Remove and return every token `system` holds for `entity`.
    ///
    /// The entry itself stays, even when emptied.
    pub fn take_for_entity(&mut self, system: SystemId, entity: Entity) -> Vec<SubscriptionToken> {
        let Some(tokens) = self.entries.get_mut(system) else {
            return Vec::new();
        };
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(tokens)
            .into_iter()
            .partition(|indexed| indexed.token.is_for(entity));
        *tokens = kept;
        taken.into_iter().map(|indexed| indexed.token).collect()
    }

    /// Drop the entry and members of `system`, returning its tokens if it
    /// had an entry.
    pub fn remove_system(&mut self, system: SystemId) -> Option<Vec<SubscriptionToken>> {
        self.members.remove(system);
        self.entries
            .remove(system)
            .map(|tokens| tokens.into_iter().map(|indexed| indexed.token).collect())
    }
}
