//! Capability handler contracts.
//!
//! The executor decides *when* a system gains or loses an entity; a handler
//! decides *how* that turns into a live binding. One handler exists per role.
//! Handlers that bind return a [`SubscriptionToken`] per binding and never
//! keep their own record of which tokens the executor holds.
//!
//! Handlers are called with the executor's [`SystemId`] so they can key any
//! state of their own on it.

use reflex_component::{Entity, TargetGroup};
use reflex_pool::Pool;

use crate::ledger::{BindingLedger, LedgerHandler};
use crate::system::{
    ErasedDataSystem, ReactToEntitySystem, ReactToGroupSystem, SetupSystem, SystemId,
};
use crate::token::SubscriptionToken;

/// Whole-system setup for [`SetupSystem`]s.
pub trait SetupSystemHandler {
    /// One-time hook run when the system is registered. Typically runs
    /// [`SetupSystem::setup`] for every entity already in the group.
    fn setup(&mut self, id: SystemId, system: &mut dyn SetupSystem, group: &TargetGroup, pool: &Pool);
}

/// Per-entity bindings for [`ReactToEntitySystem`]s.
pub trait ReactToEntitySystemHandler {
    /// Bind every entity currently in the group, one token per entity.
    fn setup(
        &mut self,
        id: SystemId,
        system: &mut dyn ReactToEntitySystem,
        group: &TargetGroup,
        pool: &Pool,
    ) -> Vec<SubscriptionToken>;

    /// Bind one entity that has just joined the group.
    fn process_entity(
        &mut self,
        id: SystemId,
        system: &mut dyn ReactToEntitySystem,
        entity: Entity,
    ) -> SubscriptionToken;
}

/// The single group-wide binding of a [`ReactToGroupSystem`].
pub trait ReactToGroupSystemHandler {
    fn setup(
        &mut self,
        id: SystemId,
        system: &mut dyn ReactToGroupSystem,
        group: &TargetGroup,
    ) -> SubscriptionToken;
}

/// Per-entity bindings for data-reactive systems, with the data type erased.
pub trait ReactToDataSystemHandler {
    /// Bind every entity currently in the group, one token per entity.
    fn setup_without_type(
        &mut self,
        id: SystemId,
        system: &mut dyn ErasedDataSystem,
        group: &TargetGroup,
        pool: &Pool,
    ) -> Vec<SubscriptionToken>;

    /// Bind one entity that has just joined the group.
    fn process_entity_without_type(
        &mut self,
        id: SystemId,
        system: &mut dyn ErasedDataSystem,
        entity: Entity,
    ) -> SubscriptionToken;
}

/// The four handlers an executor delegates to.
pub struct Handlers {
    pub setup: Box<dyn SetupSystemHandler>,
    pub react_to_entity: Box<dyn ReactToEntitySystemHandler>,
    pub react_to_group: Box<dyn ReactToGroupSystemHandler>,
    pub react_to_data: Box<dyn ReactToDataSystemHandler>,
}

impl Handlers {
    /// Use a [`LedgerHandler`] recording into `ledger` for every role.
    #[must_use]
    pub fn from_ledger(ledger: &BindingLedger) -> Self {
        let handler = LedgerHandler::new(ledger.clone());
        Self {
            setup: Box::new(handler.clone()),
            react_to_entity: Box::new(handler.clone()),
            react_to_group: Box::new(handler.clone()),
            react_to_data: Box::new(handler),
        }
    }
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handlers").finish_non_exhaustive()
    }
}
