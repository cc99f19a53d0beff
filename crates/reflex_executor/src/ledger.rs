//! Default capability handlers backed by a shared binding ledger.
//!
//! [`LedgerHandler`] implements all four handler contracts. Every binding it
//! creates is recorded in a [`BindingLedger`], and the token it hands back
//! removes that record when disposed. Anything holding a clone of the ledger
//! can list live bindings, or revoke one from outside the executor; the token
//! then finds nothing to release and does nothing.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use reflex_component::{Entity, TargetGroup};
use reflex_pool::Pool;
use tracing::{debug, trace};

use crate::handler::{
    ReactToDataSystemHandler, ReactToEntitySystemHandler, ReactToGroupSystemHandler,
    SetupSystemHandler,
};
use crate::system::{
    ErasedDataSystem, ReactToEntitySystem, ReactToGroupSystem, Role, SetupSystem, SystemId,
};
use crate::token::SubscriptionToken;

/// Identifies one binding in a [`BindingLedger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub u64);

/// One live reactive binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    /// The system the binding belongs to.
    pub system: SystemId,
    /// The bound entity, `None` for group-wide bindings.
    pub entity: Option<Entity>,
    /// The role that created the binding.
    pub role: Role,
}

#[derive(Debug, Default)]
struct LedgerState {
    next_id: u64,
    live: BTreeMap<BindingId, Binding>,
    released: u64,
    revoked: u64,
}

/// Shared record of live bindings. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct BindingLedger {
    state: Rc<RefCell<LedgerState>>,
}

impl BindingLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a binding and return the token that releases it.
    ///
    /// The token holds only a weak reference, so it outliving the ledger is
    /// harmless.
    pub fn bind(&self, system: SystemId, entity: Option<Entity>, role: Role) -> SubscriptionToken {
        let id = {
            let mut state = self.state.borrow_mut();
            state.next_id += 1;
            let id = BindingId(state.next_id);
            state.live.insert(id, Binding { system, entity, role });
            id
        };
        trace!(binding = id.0, %role, "binding recorded");

        let state: Weak<RefCell<LedgerState>> = Rc::downgrade(&self.state);
        SubscriptionToken::new(entity, move || {
            let Some(state) = state.upgrade() else {
                return;
            };
            let mut state = state.borrow_mut();
            if state.live.remove(&id).is_some() {
                state.released += 1;
                trace!(binding = id.0, "binding released");
            } else {
                trace!(binding = id.0, "binding already gone");
            }
        })
    }

    /// Tear down a binding from outside the executor.
    ///
    /// Returns `true` if the binding was live.
    pub fn revoke(&self, id: BindingId) -> bool {
        let mut state = self.state.borrow_mut();
        let revoked = state.live.remove(&id).is_some();
        if revoked {
            state.revoked += 1;
            debug!(binding = id.0, "binding revoked");
        }
        revoked
    }

    /// Returns `true` if the binding is live.
    #[must_use]
    pub fn is_live(&self, id: BindingId) -> bool {
        self.state.borrow().live.contains_key(&id)
    }

    /// Returns the number of live bindings.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.state.borrow().live.len()
    }

    /// Returns every live binding, oldest first.
    #[must_use]
    pub fn bindings(&self) -> Vec<(BindingId, Binding)> {
        self.state
            .borrow()
            .live
            .iter()
            .map(|(&id, &binding)| (id, binding))
            .collect()
    }

    /// Returns the live bindings of one system, oldest first.
    #[must_use]
    pub fn live_for(&self, system: SystemId) -> Vec<(BindingId, Binding)> {
        self.state
            .borrow()
            .live
            .iter()
            .filter(|(_, binding)| binding.system == system)
            .map(|(&id, &binding)| (id, binding))
            .collect()
    }

    /// Returns how many bindings were released by their tokens.
    #[must_use]
    pub fn released_count(&self) -> u64 {
        self.state.borrow().released
    }

    /// Returns how many bindings were revoked externally.
    #[must_use]
    pub fn revoked_count(&self) -> u64 {
        self.state.borrow().revoked
    }
}

/// Capability handler for every role, recording bindings in a [`BindingLedger`].
#[derive(Debug, Clone)]
pub struct LedgerHandler {
    ledger: BindingLedger,
}

impl LedgerHandler {
    #[must_use]
    pub fn new(ledger: BindingLedger) -> Self {
        Self { ledger }
    }

    /// The ledger this handler records into.
    #[must_use]
    pub fn ledger(&self) -> &BindingLedger {
        &self.ledger
    }
}

impl SetupSystemHandler for LedgerHandler {
    fn setup(&mut self, id: SystemId, system: &mut dyn SetupSystem, group: &TargetGroup, pool: &Pool) {
        let members = pool.matching(group);
        debug!(system = ?id, entities = members.len(), "running setup for existing members");
        for entity in members {
            system.setup(entity);
        }
    }
}

impl ReactToEntitySystemHandler for LedgerHandler {
    fn setup(
        &mut self,
        id: SystemId,
        _system: &mut dyn ReactToEntitySystem,
        group: &TargetGroup,
        pool: &Pool,
    ) -> Vec<SubscriptionToken> {
        pool.matching(group)
            .into_iter()
            .map(|entity| self.ledger.bind(id, Some(entity), Role::ReactToEntity))
            .collect()
    }

    fn process_entity(
        &mut self,
        id: SystemId,
        _system: &mut dyn ReactToEntitySystem,
        entity: Entity,
    ) -> SubscriptionToken {
        self.ledger.bind(id, Some(entity), Role::ReactToEntity)
    }
}

impl ReactToGroupSystemHandler for LedgerHandler {
    fn setup(
        &mut self,
        id: SystemId,
        _system: &mut dyn ReactToGroupSystem,
        _group: &TargetGroup,
    ) -> SubscriptionToken {
        self.ledger.bind(id, None, Role::ReactToGroup)
    }
}

impl ReactToDataSystemHandler for LedgerHandler {
    fn setup_without_type(
        &mut self,
        id: SystemId,
        system: &mut dyn ErasedDataSystem,
        group: &TargetGroup,
        pool: &Pool,
    ) -> Vec<SubscriptionToken> {
        trace!(system = ?id, data = system.data_type_name(), "binding data stream");
        pool.matching(group)
            .into_iter()
            .map(|entity| self.ledger.bind(id, Some(entity), Role::ReactToData))
            .collect()
    }

    fn process_entity_without_type(
        &mut self,
        id: SystemId,
        _system: &mut dyn ErasedDataSystem,
        entity: Entity,
    ) -> SubscriptionToken {
        self.ledger.bind(id, Some(entity), Role::ReactToData)
    }
}
