//! The system executor: registry, subscription index, and event router.
//!
//! The executor owns every registered system and every live subscription
//! token. Pool events drive membership changes:
//!
//! 1. Work out which systems the event can affect (group matcher).
//! 2. For each, decide whether the entity joined or left the group.
//! 3. Joining runs Setup and asks the entity/data handlers for tokens.
//! 4. Leaving disposes the tokens held for that entity.
//!
//! Component events only ever touch systems that target the changed type.
//! Removals are judged against the set the entity had *before* the removal,
//! rebuilt from the event, because the pool has already detached the
//! component by the time the event arrives.

use std::any::Any;

use reflex_component::{ComponentSet, ComponentTypeId, Entity, TargetGroup};
use reflex_pool::{Pool, PoolEvent, PoolSubscription};
use slotmap::SlotMap;
use tracing::{debug, info, trace, warn};

use crate::config::{DuplicatePolicy, ExecutorConfig};
use crate::error::{ExecutorError, ExecutorResult};
use crate::handler::Handlers;
use crate::index::SubscriptionIndex;
use crate::matcher;
use crate::system::{Capabilities, Role, System, SystemId};
use crate::token;

/// Direction of a component change.
#[derive(Debug, Clone, Copy)]
enum Change {
    Added,
    Removed,
}

/// A system together with what the executor learned about it at registration.
struct RegisteredSystem {
    system: Box<dyn System>,
    name: String,
    group: TargetGroup,
    capabilities: Capabilities,
}

/// Keeps registered systems bound to exactly the entities in their groups.
pub struct SystemExecutor {
    config: ExecutorConfig,
    handlers: Handlers,
    /// Registered systems.
    systems: SlotMap<SystemId, RegisteredSystem>,
    /// Registration order.
    order: Vec<SystemId>,
    /// Live tokens per system.
    index: SubscriptionIndex,
    /// Event feed from the pool, when attached.
    feed: Option<PoolSubscription>,
}

impl SystemExecutor {
    /// Create an executor that is not listening to any pool. Events must be
    /// routed in with [`SystemExecutor::handle_event`].
    #[must_use]
    pub fn new(handlers: Handlers, config: ExecutorConfig) -> Self {
        Self {
            config,
            handlers,
            systems: SlotMap::with_key(),
            order: Vec::new(),
            index: SubscriptionIndex::new(),
            feed: None,
        }
    }

    /// Create an executor subscribed to `pool`'s events.
    #[must_use]
    pub fn attach(pool: &mut Pool, handlers: Handlers, config: ExecutorConfig) -> Self {
        let feed = pool.subscribe();
        info!(listener = feed.id().0, "executor attached to pool");
        let mut executor = Self::new(handlers, config);
        executor.feed = Some(feed);
        executor
    }

    /// Stop listening to `pool` and remove every system, disposing all tokens.
    ///
    /// Events still queued are discarded. Returns the removed systems in
    /// registration order.
    pub fn detach(mut self, pool: &mut Pool) -> Vec<Box<dyn System>> {
        if let Some(feed) = self.feed.take() {
            pool.unsubscribe(feed.id());
        }
        let ids = self.order.clone();
        let systems: Vec<Box<dyn System>> = ids
            .into_iter()
            .filter_map(|id| self.remove_system(id))
            .collect();
        info!(systems = systems.len(), "executor detached from pool");
        systems
    }

    /// The executor's configuration.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    /// Register a system and bind it to the entities already in `pool`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::NoCapabilities`] for a role-less system,
    /// [`ExecutorError::MissingTargetGroup`] when the system has no group, and
    /// [`ExecutorError::DuplicateSystem`] when the name is taken and the
    /// duplicate policy is [`DuplicatePolicy::Reject`].
    pub fn add_system(&mut self, pool: &Pool, mut system: Box<dyn System>) -> ExecutorResult<SystemId> {
        if self.config.drain_before_register {
            self.process_pending_events();
        }

        let name = system.name().to_string();
        let capabilities = Capabilities::classify(system.as_mut());
        if capabilities.is_empty() {
            warn!(system = name, "rejected system without capabilities");
            return Err(ExecutorError::NoCapabilities(name));
        }
        let Some(group) = system.target_group().cloned() else {
            warn!(system = name, %capabilities, "rejected system without target group");
            return Err(ExecutorError::MissingTargetGroup { name, capabilities });
        };
        if self.config.duplicate_policy == DuplicatePolicy::Reject
            && self.systems.values().any(|registered| registered.name == name)
        {
            warn!(system = name, "rejected duplicate system");
            return Err(ExecutorError::DuplicateSystem(name));
        }

        let id = self.systems.insert(RegisteredSystem {
            system,
            name,
            group,
            capabilities,
        });
        self.order.push(id);
        if capabilities.has_subscriptions() {
            self.index.ensure_entry(id);
        }

        let Some(registered) = self.systems.get_mut(id) else {
            return Ok(id);
        };
        let group = &registered.group;
        for entity in pool.matching(group) {
            self.index.join(id, entity);
        }

        if capabilities.setup
            && let Some(setup) = registered.system.as_setup()
        {
            self.handlers.setup.setup(id, setup, group, pool);
        }

        if capabilities.react_to_group
            && let Some(reactive) = registered.system.as_react_to_group()
        {
            let token = self.handlers.react_to_group.setup(id, reactive, group);
            self.index.insert(id, Role::ReactToGroup, token);
        }

        if capabilities.react_to_entity
            && let Some(reactive) = registered.system.as_react_to_entity()
        {
            for token in self.handlers.react_to_entity.setup(id, reactive, group, pool) {
                self.index.insert(id, Role::ReactToEntity, token);
            }
        }

        if capabilities.is_reactive_data_system()
            && let Some(reactive) = registered.system.as_react_to_data()
        {
            for token in self.handlers.react_to_data.setup_without_type(id, reactive, group, pool) {
                self.index.insert(id, Role::ReactToData, token);
            }
        }

        info!(
            system = registered.name,
            %capabilities,
            tokens = self.index.len(id),
            "system added"
        );
        Ok(id)
    }

    /// Unregister a system, disposing every token it owns.
    ///
    /// Returns `None` if the ID is not registered.
    pub fn remove_system(&mut self, id: SystemId) -> Option<Box<dyn System>> {
        let Some(registered) = self.systems.remove(id) else {
            trace!(system = ?id, "remove of unknown system ignored");
            return None;
        };
        self.order.retain(|&registered_id| registered_id != id);

        let released = self.index.remove_system(id).map_or(0, token::dispose_all);
        info!(system = registered.name, released, "system removed");
        Some(registered.system)
    }

    /// Registered systems in registration order.
    pub fn systems(&self) -> impl Iterator<Item = (SystemId, &dyn System)> {
        self.order.iter().filter_map(|&id| {
            self.systems
                .get(id)
                .map(|registered| (id, registered.system.as_ref()))
        })
    }

    /// Returns the number of registered systems.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.order.len()
    }

    /// Look up a registered system.
    #[must_use]
    pub fn system(&self, id: SystemId) -> Option<&dyn System> {
        self.systems.get(id).map(|registered| registered.system.as_ref())
    }

    /// The roles a registered system was classified with.
    #[must_use]
    pub fn capabilities(&self, id: SystemId) -> Option<Capabilities> {
        self.systems.get(id).map(|registered| registered.capabilities)
    }

    /// The group a registered system was registered with.
    #[must_use]
    pub fn target_group(&self, id: SystemId) -> Option<&TargetGroup> {
        self.systems.get(id).map(|registered| &registered.group)
    }

    // -----------------------------------------------------------------------
    // Subscription index
    // -----------------------------------------------------------------------

    /// Dispose every token `system` holds for `entity`.
    ///
    /// Returns how many tokens were removed. An unknown system or an entity
    /// without tokens is a no-op. Group membership is left as is; it only
    /// changes through pool events.
    pub fn remove_subscription(&mut self, system: SystemId, entity: Entity) -> usize {
        let tokens = self.index.take_for_entity(system, entity);
        if tokens.is_empty() {
            trace!(system = ?system, %entity, "no subscriptions to remove");
            return 0;
        }
        let removed = tokens.len();
        token::dispose_all(tokens);
        debug!(system = ?system, %entity, removed, "subscriptions removed");
        removed
    }

    /// Number of live tokens `system` holds.
    #[must_use]
    pub fn token_count(&self, system: SystemId) -> usize {
        self.index.len(system)
    }

    /// Number of live tokens `system` holds for `entity`.
    #[must_use]
    pub fn tokens_for(&self, system: SystemId, entity: Entity) -> usize {
        self.index.count_for(system, entity)
    }

    /// Number of live tokens across every system.
    #[must_use]
    pub fn total_tokens(&self) -> usize {
        self.index.total()
    }

    /// Returns `true` if `system` has an index entry.
    #[must_use]
    pub fn has_index_entry(&self, system: SystemId) -> bool {
        self.index.has_entry(system)
    }

    // -----------------------------------------------------------------------
    // Event routing
    // -----------------------------------------------------------------------

    /// Drain and route every queued pool event, in emission order.
    ///
    /// Returns the number of events processed. Does nothing when detached.
    pub fn process_pending_events(&mut self) -> usize {
        let mut processed = 0;
        while let Some(event) = self.feed.as_mut().and_then(PoolSubscription::try_next) {
            self.handle_event(&event);
            processed += 1;
        }
        if processed > 0 {
            trace!(processed, "pool events drained");
        }
        processed
    }

    /// Route one pool event.
    pub fn handle_event(&mut self, event: &PoolEvent) {
        match event {
            PoolEvent::EntityAdded { entity, components } => {
                self.on_entity_added(*entity, components);
            }
            PoolEvent::EntityRemoved { entity, components } => {
                self.on_entity_removed(*entity, components);
            }
            PoolEvent::ComponentAdded {
                entity,
                component,
                components,
            } => self.on_component_added(*entity, *component, components),
            PoolEvent::ComponentRemoved {
                entity,
                component,
                components,
            } => self.on_component_removed(*entity, *component, components),
        }
    }

    /// An entity carrying `components` entered the pool.
    pub fn on_entity_added(&mut self, entity: Entity, components: &ComponentSet) {
        let applicable = matcher::applicable_systems(self.groups(), components);
        debug!(%entity, systems = applicable.len(), "entity added");
        for id in applicable {
            self.activate(id, entity);
        }
    }

    /// An entity that carried `components` left the pool.
    pub fn on_entity_removed(&mut self, entity: Entity, components: &ComponentSet) {
        let applicable = matcher::applicable_systems(self.groups(), components);
        debug!(%entity, systems = applicable.len(), "entity removed");
        for id in applicable {
            self.deactivate(id, entity);
        }
    }

    /// `component` was attached to `entity`, which now carries `components`.
    pub fn on_component_added(
        &mut self,
        entity: Entity,
        component: ComponentTypeId,
        components: &ComponentSet,
    ) {
        let before = matcher::before_addition(components, component);
        let transitions = self.transitions(component, &before, components);
        debug!(%entity, %component, systems = transitions.len(), "component added");
        self.apply(entity, Change::Added, transitions);
    }

    /// `component` was detached from `entity`, which now carries `components`.
    pub fn on_component_removed(
        &mut self,
        entity: Entity,
        component: ComponentTypeId,
        components: &ComponentSet,
    ) {
        let before = matcher::before_removal(components, component);
        let transitions = self.transitions(component, &before, components);
        debug!(%entity, %component, systems = transitions.len(), "component removed");
        self.apply(entity, Change::Removed, transitions);
    }

    /// Deliver a reaction to a system over one of its live bindings.
    ///
    /// `data` is only used for [`Role::ReactToData`] and must be of the
    /// system's data type. Returns `false` if the system has no live binding
    /// for `entity` under `role`, or the data type does not match.
    pub fn deliver(
        &mut self,
        id: SystemId,
        entity: Entity,
        role: Role,
        data: Option<&dyn Any>,
    ) -> bool {
        let bound = match role {
            Role::Setup => false,
            Role::ReactToGroup => {
                self.index.has_role(id, role) && self.index.is_member(id, entity)
            }
            Role::ReactToEntity | Role::ReactToData => self.index.has_live(id, entity, role),
        };
        if !bound {
            trace!(system = ?id, %entity, %role, "no live binding for reaction");
            return false;
        }
        let Some(registered) = self.systems.get_mut(id) else {
            return false;
        };
        let system = registered.system.as_mut();
        match role {
            Role::Setup => false,
            Role::ReactToEntity => system
                .as_react_to_entity()
                .map(|reactive| reactive.on_entity_reaction(entity))
                .is_some(),
            Role::ReactToGroup => system
                .as_react_to_group()
                .map(|reactive| reactive.on_group_reaction(entity))
                .is_some(),
            Role::ReactToData => match (system.as_react_to_data(), data) {
                (Some(reactive), Some(data)) => reactive.on_erased_data(entity, data),
                _ => false,
            },
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn groups(&self) -> impl Iterator<Item = (SystemId, &TargetGroup)> {
        self.order
            .iter()
            .filter_map(|&id| self.systems.get(id).map(|registered| (id, &registered.group)))
    }

    /// For every system targeting `component`, whether the entity was in its
    /// group before the change and whether it is now.
    fn transitions(
        &self,
        component: ComponentTypeId,
        before: &ComponentSet,
        after: &ComponentSet,
    ) -> Vec<(SystemId, bool, bool)> {
        matcher::targeting_systems(self.groups(), component)
            .into_iter()
            .map(|(id, group)| (id, group.matches(before), group.matches(after)))
            .collect()
    }

    fn apply(&mut self, entity: Entity, change: Change, transitions: Vec<(SystemId, bool, bool)>) {
        for (id, was_member, is_member) in transitions {
            let (join, leave) = match change {
                Change::Added => (is_member, !is_member && was_member),
                // A removed targeted type ends membership even if the
                // remaining set still matches.
                Change::Removed => (!was_member && is_member, was_member),
            };
            if leave {
                self.deactivate(id, entity);
            } else if join {
                self.activate(id, entity);
            } else {
                trace!(system = ?id, %entity, "membership unchanged");
            }
        }
    }

    /// Bind `entity` to every per-entity role of system `id`.
    ///
    /// Setup only runs when `entity` was not already a member.
    fn activate(&mut self, id: SystemId, entity: Entity) {
        let Some(registered) = self.systems.get_mut(id) else {
            return;
        };
        let capabilities = registered.capabilities;
        let joined = self.index.join(id, entity);

        if capabilities.setup
            && joined
            && let Some(setup) = registered.system.as_setup()
        {
            setup.setup(entity);
        }

        if capabilities.react_to_entity
            && !self.index.has_live(id, entity, Role::ReactToEntity)
            && let Some(reactive) = registered.system.as_react_to_entity()
        {
            let token = self.handlers.react_to_entity.process_entity(id, reactive, entity);
            self.index.insert(id, Role::ReactToEntity, token);
        }

        if capabilities.is_reactive_data_system()
            && !self.index.has_live(id, entity, Role::ReactToData)
            && let Some(reactive) = registered.system.as_react_to_data()
        {
            let token = self
                .handlers
                .react_to_data
                .process_entity_without_type(id, reactive, entity);
            self.index.insert(id, Role::ReactToData, token);
        }

        debug!(
            system = registered.name,
            %entity,
            joined,
            tokens = self.index.count_for(id, entity),
            "entity activated"
        );
    }

    /// `entity` left the group of system `id`.
    fn deactivate(&mut self, id: SystemId, entity: Entity) {
        if self.index.leave(id, entity) {
            debug!(system = ?id, %entity, "entity deactivated");
        }
        self.remove_subscription(id, entity);
    }
}

impl std::fmt::Debug for SystemExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemExecutor")
            .field("config", &self.config)
            .field("systems", &self.order.len())
            .field("tokens", &self.index.total())
            .field("attached", &self.feed.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use reflex_component::ComponentTypeId;

    use super::*;
    use crate::handler::{
        ReactToDataSystemHandler, ReactToEntitySystemHandler, ReactToGroupSystemHandler,
        SetupSystemHandler,
    };
    use crate::ledger::{BindingLedger, LedgerHandler};
    use crate::system::{
        ErasedDataSystem, ReactToDataSystem, ReactToEntitySystem, ReactToGroupSystem, SetupSystem,
    };
    use crate::token::SubscriptionToken;

    const POSITION: ComponentTypeId = ComponentTypeId::from_name("Position");
    const VELOCITY: ComponentTypeId = ComponentTypeId::from_name("Velocity");
    const FROZEN: ComponentTypeId = ComponentTypeId::from_name("Frozen");
    const HEALTH: ComponentTypeId = ComponentTypeId::from_name("Health");

    const SETUP: Capabilities = Capabilities {
        setup: true,
        react_to_entity: false,
        react_to_group: false,
        react_to_data: false,
    };
    const ENTITY: Capabilities = Capabilities {
        setup: false,
        react_to_entity: true,
        react_to_group: false,
        react_to_data: false,
    };
    const GROUP: Capabilities = Capabilities {
        setup: false,
        react_to_entity: false,
        react_to_group: true,
        react_to_data: false,
    };
    const DATA: Capabilities = Capabilities {
        setup: false,
        react_to_entity: false,
        react_to_group: false,
        react_to_data: true,
    };

    fn union(a: Capabilities, b: Capabilities) -> Capabilities {
        Capabilities {
            setup: a.setup || b.setup,
            react_to_entity: a.react_to_entity || b.react_to_entity,
            react_to_group: a.react_to_group || b.react_to_group,
            react_to_data: a.react_to_data || b.react_to_data,
        }
    }

    /// What a [`Probe`] observed, shared with the test after the probe is boxed.
    #[derive(Debug, Default)]
    struct Observed {
        setups: Vec<Entity>,
        reactions: Vec<(Role, Entity)>,
        data: Vec<(Entity, u32)>,
    }

    /// A system whose roles are chosen per test.
    struct Probe {
        name: String,
        group: Option<TargetGroup>,
        roles: Capabilities,
        observed: Rc<RefCell<Observed>>,
    }

    impl Probe {
        fn new(name: &str, group: TargetGroup, roles: Capabilities) -> Self {
            Self {
                name: name.to_string(),
                group: Some(group),
                roles,
                observed: Rc::default(),
            }
        }

        fn without_group(mut self) -> Self {
            self.group = None;
            self
        }

        fn observed(&self) -> Rc<RefCell<Observed>> {
            Rc::clone(&self.observed)
        }
    }

    impl SetupSystem for Probe {
        fn setup(&mut self, entity: Entity) {
            self.observed.borrow_mut().setups.push(entity);
        }
    }

    impl ReactToEntitySystem for Probe {
        fn on_entity_reaction(&mut self, entity: Entity) {
            self.observed
                .borrow_mut()
                .reactions
                .push((Role::ReactToEntity, entity));
        }
    }

    impl ReactToGroupSystem for Probe {
        fn on_group_reaction(&mut self, entity: Entity) {
            self.observed
                .borrow_mut()
                .reactions
                .push((Role::ReactToGroup, entity));
        }
    }

    impl ReactToDataSystem for Probe {
        type Data = u32;

        fn on_data(&mut self, entity: Entity, data: &u32) {
            self.observed.borrow_mut().data.push((entity, *data));
        }
    }

    impl System for Probe {
        fn name(&self) -> &str {
            &self.name
        }

        fn target_group(&self) -> Option<&TargetGroup> {
            self.group.as_ref()
        }

        fn as_setup(&mut self) -> Option<&mut dyn SetupSystem> {
            if self.roles.setup { Some(self) } else { None }
        }

        fn as_react_to_entity(&mut self) -> Option<&mut dyn ReactToEntitySystem> {
            if self.roles.react_to_entity { Some(self) } else { None }
        }

        fn as_react_to_group(&mut self) -> Option<&mut dyn ReactToGroupSystem> {
            if self.roles.react_to_group { Some(self) } else { None }
        }

        fn as_react_to_data(&mut self) -> Option<&mut dyn ErasedDataSystem> {
            if self.roles.react_to_data { Some(self) } else { None }
        }
    }

    /// Handler calls seen by a [`Recording`] handler, in order.
    #[derive(Debug, Clone, Default)]
    struct Calls(Rc<RefCell<Vec<(&'static str, SystemId)>>>);

    impl Calls {
        fn push(&self, call: &'static str, id: SystemId) {
            self.0.borrow_mut().push((call, id));
        }

        fn names(&self) -> Vec<&'static str> {
            self.0.borrow().iter().map(|(call, _)| *call).collect()
        }

        fn received(&self, call: &'static str, id: SystemId) -> bool {
            self.0.borrow().contains(&(call, id))
        }
    }

    /// Records every call, then delegates to a [`LedgerHandler`].
    #[derive(Clone)]
    struct Recording {
        calls: Calls,
        inner: LedgerHandler,
    }

    impl SetupSystemHandler for Recording {
        fn setup(&mut self, id: SystemId, system: &mut dyn SetupSystem, group: &TargetGroup, pool: &Pool) {
            self.calls.push("setup", id);
            SetupSystemHandler::setup(&mut self.inner, id, system, group, pool);
        }
    }

    impl ReactToEntitySystemHandler for Recording {
        fn setup(
            &mut self,
            id: SystemId,
            system: &mut dyn ReactToEntitySystem,
            group: &TargetGroup,
            pool: &Pool,
        ) -> Vec<SubscriptionToken> {
            self.calls.push("entity.setup", id);
            ReactToEntitySystemHandler::setup(&mut self.inner, id, system, group, pool)
        }

        fn process_entity(
            &mut self,
            id: SystemId,
            system: &mut dyn ReactToEntitySystem,
            entity: Entity,
        ) -> SubscriptionToken {
            self.calls.push("entity.process", id);
            self.inner.process_entity(id, system, entity)
        }
    }

    impl ReactToGroupSystemHandler for Recording {
        fn setup(
            &mut self,
            id: SystemId,
            system: &mut dyn ReactToGroupSystem,
            group: &TargetGroup,
        ) -> SubscriptionToken {
            self.calls.push("group.setup", id);
            ReactToGroupSystemHandler::setup(&mut self.inner, id, system, group)
        }
    }

    impl ReactToDataSystemHandler for Recording {
        fn setup_without_type(
            &mut self,
            id: SystemId,
            system: &mut dyn ErasedDataSystem,
            group: &TargetGroup,
            pool: &Pool,
        ) -> Vec<SubscriptionToken> {
            self.calls.push("data.setup", id);
            self.inner.setup_without_type(id, system, group, pool)
        }

        fn process_entity_without_type(
            &mut self,
            id: SystemId,
            system: &mut dyn ErasedDataSystem,
            entity: Entity,
        ) -> SubscriptionToken {
            self.calls.push("data.process", id);
            self.inner.process_entity_without_type(id, system, entity)
        }
    }

    struct Fixture {
        pool: Pool,
        ledger: BindingLedger,
        calls: Calls,
        executor: SystemExecutor,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_config(ExecutorConfig::default())
        }

        fn with_config(config: ExecutorConfig) -> Self {
            let mut pool = Pool::new();
            let ledger = BindingLedger::new();
            let calls = Calls::default();
            let recording = Recording {
                calls: calls.clone(),
                inner: LedgerHandler::new(ledger.clone()),
            };
            let handlers = Handlers {
                setup: Box::new(recording.clone()),
                react_to_entity: Box::new(recording.clone()),
                react_to_group: Box::new(recording.clone()),
                react_to_data: Box::new(recording),
            };
            let executor = SystemExecutor::attach(&mut pool, handlers, config);
            Self {
                pool,
                ledger,
                calls,
                executor,
            }
        }

        fn add(&mut self, probe: Probe) -> SystemId {
            self.executor.add_system(&self.pool, Box::new(probe)).unwrap()
        }

        fn sync(&mut self) {
            self.executor.process_pending_events();
        }
    }

    fn group(required: &[ComponentTypeId]) -> TargetGroup {
        required
            .iter()
            .fold(TargetGroup::new(), |group, &ty| group.with(ty))
    }

    // -- Registration --

    #[test]
    fn test_setup_system_is_set_up_and_listed() {
        let mut fx = Fixture::new();
        let id = fx.add(Probe::new("setup", group(&[POSITION]), SETUP));

        assert!(fx.calls.received("setup", id));
        let names: Vec<&str> = fx.executor.systems().map(|(_, system)| system.name()).collect();
        assert_eq!(names, vec!["setup"]);
        assert!(!fx.executor.has_index_entry(id));
    }

    #[test]
    fn test_data_system_is_set_up_without_type() {
        let mut fx = Fixture::new();
        let id = fx.add(Probe::new("data", group(&[POSITION]), DATA));

        assert!(fx.calls.received("data.setup", id));
        assert!(fx.executor.has_index_entry(id));
        assert_eq!(fx.executor.system_count(), 1);
    }

    #[test]
    fn test_entity_system_is_set_up() {
        let mut fx = Fixture::new();
        let id = fx.add(Probe::new("entity", group(&[POSITION]), ENTITY));

        assert!(fx.calls.received("entity.setup", id));
        assert_eq!(fx.executor.capabilities(id), Some(ENTITY));
    }

    #[test]
    fn test_group_system_gets_one_group_token() {
        let mut fx = Fixture::new();
        let id = fx.add(Probe::new("group", group(&[POSITION]), GROUP));

        assert!(fx.calls.received("group.setup", id));
        assert_eq!(fx.executor.token_count(id), 1);
        assert_eq!(fx.ledger.live_for(id)[0].1.entity, None);
    }

    #[test]
    fn test_registration_binds_existing_members() {
        let mut fx = Fixture::new();
        let member = fx.pool.create_entity_with([POSITION]);
        let _outsider = fx.pool.create_entity_with([VELOCITY]);

        let probe = Probe::new("mixed", group(&[POSITION]), union(SETUP, union(ENTITY, DATA)));
        let observed = probe.observed();
        let id = fx.add(probe);

        assert_eq!(observed.borrow().setups, vec![member]);
        assert_eq!(fx.executor.tokens_for(id, member), 2);
        assert_eq!(fx.executor.token_count(id), 2);
    }

    #[test]
    fn test_roleless_system_is_rejected() {
        let mut fx = Fixture::new();
        let result = fx
            .executor
            .add_system(&fx.pool, Box::new(Probe::new("idle", group(&[]), Capabilities::default())));

        assert!(matches!(result, Err(ExecutorError::NoCapabilities(name)) if name == "idle"));
        assert_eq!(fx.executor.system_count(), 0);
    }

    #[test]
    fn test_system_without_group_is_rejected() {
        let mut fx = Fixture::new();
        let probe = Probe::new("lost", group(&[]), ENTITY).without_group();
        let result = fx.executor.add_system(&fx.pool, Box::new(probe));

        assert!(matches!(
            result,
            Err(ExecutorError::MissingTargetGroup { capabilities, .. }) if capabilities == ENTITY
        ));
        assert!(fx.calls.names().is_empty());
    }

    #[test]
    fn test_duplicate_name_is_rejected_by_default() {
        let mut fx = Fixture::new();
        fx.add(Probe::new("physics", group(&[POSITION]), GROUP));
        let result = fx
            .executor
            .add_system(&fx.pool, Box::new(Probe::new("physics", group(&[POSITION]), GROUP)));

        assert!(matches!(result, Err(ExecutorError::DuplicateSystem(_))));
        assert_eq!(fx.executor.system_count(), 1);
        assert_eq!(fx.ledger.live_count(), 1);
    }

    #[test]
    fn test_duplicate_name_allowed_by_policy() {
        let mut fx =
            Fixture::with_config(ExecutorConfig::new().with_duplicate_policy(DuplicatePolicy::Allow));
        let first = fx.add(Probe::new("physics", group(&[POSITION]), GROUP));
        let second = fx.add(Probe::new("physics", group(&[POSITION]), GROUP));

        assert_ne!(first, second);
        assert_eq!(fx.executor.system_count(), 2);
        assert_eq!(fx.ledger.live_count(), 2);
    }

    // -- Removal --

    #[test]
    fn test_remove_system_empties_system_list() {
        let mut fx = Fixture::new();
        let id = fx.add(Probe::new("setup", group(&[POSITION]), SETUP));

        let removed = fx.executor.remove_system(id);
        assert_eq!(removed.map(|system| system.name().to_string()), Some("setup".into()));
        assert_eq!(fx.executor.systems().count(), 0);
    }

    #[test]
    fn test_remove_system_disposes_tokens_and_second_remove_is_noop() {
        let mut fx = Fixture::new();
        fx.pool.create_entity_with([POSITION]);
        fx.pool.create_entity_with([POSITION]);
        let id = fx.add(Probe::new("both", group(&[POSITION]), union(ENTITY, GROUP)));
        assert_eq!(fx.ledger.live_count(), 3);

        assert!(fx.executor.remove_system(id).is_some());
        assert_eq!(fx.ledger.live_count(), 0);
        assert_eq!(fx.ledger.released_count(), 3);
        assert!(!fx.executor.has_index_entry(id));

        assert!(fx.executor.remove_system(id).is_none());
        assert_eq!(fx.executor.token_count(id), 0);
    }

    #[test]
    fn test_remove_subscription_without_entry_is_noop() {
        let mut fx = Fixture::new();
        let id = fx.add(Probe::new("setup", group(&[POSITION]), SETUP));
        assert_eq!(fx.executor.remove_subscription(id, Entity::from_raw(99)), 0);
    }

    // -- Entity events --

    #[test]
    fn test_entity_added_binds_each_role_once() {
        let mut fx = Fixture::new();
        let probe = Probe::new("all", group(&[POSITION]), union(SETUP, union(ENTITY, union(GROUP, DATA))));
        let observed = probe.observed();
        let id = fx.add(probe);

        let e = fx.pool.create_entity_with([POSITION]);
        fx.sync();

        assert_eq!(observed.borrow().setups, vec![e]);
        // One entity token, one data token; the group token is not per-entity.
        assert_eq!(fx.executor.tokens_for(id, e), 2);
        assert_eq!(fx.executor.token_count(id), 3);
        assert_eq!(
            fx.calls.names(),
            vec!["setup", "group.setup", "entity.setup", "data.setup", "entity.process", "data.process"]
        );
    }

    #[test]
    fn test_entity_added_skips_non_matching_systems() {
        let mut fx = Fixture::new();
        let id = fx.add(Probe::new("moving", group(&[POSITION, VELOCITY]), ENTITY));

        let e = fx.pool.create_entity_with([POSITION]);
        fx.sync();

        assert_eq!(fx.executor.tokens_for(id, e), 0);
    }

    #[test]
    fn test_entity_removed_disposes_its_tokens() {
        let mut fx = Fixture::new();
        let id = fx.add(Probe::new("both", group(&[POSITION]), union(ENTITY, DATA)));
        let gone = fx.pool.create_entity_with([POSITION]);
        let kept = fx.pool.create_entity_with([POSITION]);
        fx.sync();
        assert_eq!(fx.ledger.live_count(), 4);

        fx.pool.remove_entity(gone).unwrap();
        fx.sync();

        assert_eq!(fx.executor.tokens_for(id, gone), 0);
        assert_eq!(fx.executor.tokens_for(id, kept), 2);
        assert_eq!(fx.ledger.live_count(), 2);
    }

    #[test]
    fn test_entity_removed_after_external_revoke() {
        let mut fx = Fixture::new();
        let id = fx.add(Probe::new("entity", group(&[POSITION]), ENTITY));
        let e = fx.pool.create_entity_with([POSITION]);
        fx.sync();

        let (binding, _) = fx.ledger.live_for(id)[0];
        assert!(fx.ledger.revoke(binding));

        fx.pool.remove_entity(e).unwrap();
        fx.sync();
        assert_eq!(fx.executor.tokens_for(id, e), 0);
        assert_eq!(fx.ledger.released_count(), 0);
    }

    // -- Component events --

    #[test]
    fn test_component_added_only_touches_targeting_systems() {
        let mut fx = Fixture::new();
        let moving = Probe::new("moving", group(&[POSITION]), union(SETUP, ENTITY));
        let moving_seen = moving.observed();
        let moving = fx.add(moving);
        let living = fx.add(Probe::new("living", group(&[HEALTH]), ENTITY));

        let e = fx.pool.create_entity_with([POSITION, HEALTH]);
        fx.sync();
        assert_eq!(fx.executor.tokens_for(moving, e), 1);
        assert_eq!(fx.executor.tokens_for(living, e), 1);

        // Neither system targets Velocity.
        fx.pool.add_component(e, VELOCITY).unwrap();
        fx.sync();
        assert_eq!(moving_seen.borrow().setups, vec![e]);
        assert_eq!(fx.executor.tokens_for(moving, e), 1);
        assert_eq!(fx.executor.tokens_for(living, e), 1);
    }

    #[test]
    fn test_component_added_does_not_duplicate_live_token() {
        let mut fx = Fixture::new();
        let id = fx.add(Probe::new("moving", group(&[POSITION]), ENTITY));
        let e = fx.pool.create_entity_with([POSITION]);
        fx.sync();

        // Replaying an add for a type the system targets must not bind again.
        let components: ComponentSet = [POSITION].into_iter().collect();
        fx.executor.on_component_added(e, POSITION, &components);
        assert_eq!(fx.executor.tokens_for(id, e), 1);
    }

    #[test]
    fn test_component_removed_uses_pre_removal_set() {
        let mut fx = Fixture::new();
        let id = fx.add(Probe::new("moving", group(&[POSITION, VELOCITY]), ENTITY));
        let e = fx.pool.create_entity_with([POSITION, VELOCITY]);
        fx.sync();
        assert_eq!(fx.executor.tokens_for(id, e), 1);

        // Velocity is already gone when the event is routed; the remaining
        // set alone would not match the group.
        fx.pool.remove_component(e, VELOCITY).unwrap();
        fx.sync();
        assert_eq!(fx.executor.tokens_for(id, e), 0);
        assert_eq!(fx.ledger.live_count(), 0);
    }

    #[test]
    fn test_component_removed_ignores_non_targeting_systems() {
        let mut fx = Fixture::new();
        let id = fx.add(Probe::new("placed", group(&[POSITION]), ENTITY));
        let e = fx.pool.create_entity_with([POSITION, HEALTH]);
        fx.sync();

        fx.pool.remove_component(e, HEALTH).unwrap();
        fx.sync();
        assert_eq!(fx.executor.tokens_for(id, e), 1);
    }

    #[test]
    fn test_excluded_type_moves_entity_out_and_back_in() {
        let mut fx = Fixture::new();
        let probe = Probe::new(
            "awake",
            TargetGroup::new().with(POSITION).without(FROZEN),
            union(SETUP, ENTITY),
        );
        let observed = probe.observed();
        let id = fx.add(probe);
        let e = fx.pool.create_entity_with([POSITION]);
        fx.sync();
        assert_eq!(fx.executor.tokens_for(id, e), 1);

        fx.pool.add_component(e, FROZEN).unwrap();
        fx.sync();
        assert_eq!(fx.executor.tokens_for(id, e), 0);

        fx.pool.remove_component(e, FROZEN).unwrap();
        fx.sync();
        assert_eq!(fx.executor.tokens_for(id, e), 1);
        assert_eq!(observed.borrow().setups, vec![e, e]);
    }

    // -- Scenarios --

    #[test]
    fn test_scenario_single_required_type() {
        let mut fx = Fixture::new();
        let e1 = fx.pool.create_entity();
        let s1 = fx.add(Probe::new("s1", group(&[POSITION]), ENTITY));
        assert_eq!(fx.executor.token_count(s1), 0);

        fx.pool.add_component(e1, POSITION).unwrap();
        fx.sync();
        assert_eq!(fx.executor.tokens_for(s1, e1), 1);

        fx.pool.remove_component(e1, POSITION).unwrap();
        fx.sync();
        assert_eq!(fx.executor.tokens_for(s1, e1), 0);
        assert_eq!(fx.ledger.released_count(), 1);
    }

    #[test]
    fn test_scenario_entity_and_group_roles() {
        let mut fx = Fixture::new();
        let s2 = fx.add(Probe::new("s2", group(&[POSITION, VELOCITY]), union(ENTITY, GROUP)));
        assert_eq!(fx.executor.token_count(s2), 1);

        let e = fx.pool.create_entity_with([POSITION]);
        fx.sync();
        assert_eq!(fx.executor.tokens_for(s2, e), 0);

        fx.pool.add_component(e, VELOCITY).unwrap();
        fx.sync();
        assert_eq!(fx.executor.tokens_for(s2, e), 1);
        assert_eq!(fx.executor.token_count(s2), 2);
    }

    // -- Event feed --

    #[test]
    fn test_pending_events_drained_before_registration() {
        let mut fx = Fixture::new();
        let e = fx.pool.create_entity_with([POSITION]);
        // The EntityAdded event is still queued when the system registers.
        let probe = Probe::new("late", group(&[POSITION]), union(SETUP, ENTITY));
        let observed = probe.observed();
        let id = fx.add(probe);
        fx.sync();

        assert_eq!(observed.borrow().setups, vec![e]);
        assert_eq!(fx.executor.tokens_for(id, e), 1);
    }

    #[test]
    fn test_detach_unsubscribes_and_releases_everything() {
        let mut fx = Fixture::new();
        fx.pool.create_entity_with([POSITION]);
        fx.add(Probe::new("both", group(&[POSITION]), union(ENTITY, GROUP)));
        assert_eq!(fx.pool.listener_count(), 1);

        let systems = fx.executor.detach(&mut fx.pool);
        assert_eq!(systems.len(), 1);
        assert_eq!(fx.pool.listener_count(), 0);
        assert_eq!(fx.ledger.live_count(), 0);
    }

    #[test]
    fn test_detached_executor_routes_events_by_hand() {
        let ledger = BindingLedger::new();
        let pool = Pool::new();
        let mut executor = SystemExecutor::new(Handlers::from_ledger(&ledger), ExecutorConfig::default());
        let id = executor
            .add_system(&pool, Box::new(Probe::new("manual", group(&[POSITION]), ENTITY)))
            .unwrap();

        let e = Entity::from_raw(5);
        executor.handle_event(&PoolEvent::EntityAdded {
            entity: e,
            components: [POSITION].into_iter().collect(),
        });
        assert_eq!(executor.process_pending_events(), 0);
        assert_eq!(executor.tokens_for(id, e), 1);
        assert_eq!(executor.total_tokens(), 1);
    }

    // -- Reactions --

    #[test]
    fn test_deliver_requires_live_binding() {
        let mut fx = Fixture::new();
        let probe = Probe::new("all", group(&[POSITION]), union(ENTITY, union(GROUP, DATA)));
        let observed = probe.observed();
        let id = fx.add(probe);
        let bound = fx.pool.create_entity_with([POSITION]);
        let unbound = fx.pool.create_entity();
        fx.sync();

        assert!(fx.executor.deliver(id, bound, Role::ReactToEntity, None));
        assert!(!fx.executor.deliver(id, unbound, Role::ReactToEntity, None));
        assert!(fx.executor.deliver(id, bound, Role::ReactToGroup, None));
        assert!(fx.executor.deliver(id, bound, Role::ReactToData, Some(&7u32)));
        assert!(!fx.executor.deliver(id, bound, Role::ReactToData, Some(&"seven")));
        assert!(!fx.executor.deliver(id, bound, Role::Setup, None));

        let observed = observed.borrow();
        assert_eq!(
            observed.reactions,
            vec![(Role::ReactToEntity, bound), (Role::ReactToGroup, bound)]
        );
        assert_eq!(observed.data, vec![(bound, 7)]);
    }

    #[test]
    fn test_setup_runs_once_when_queued_events_are_not_drained() {
        let mut fx =
            Fixture::with_config(ExecutorConfig::new().with_drain_before_register(false));
        let e = fx.pool.create_entity_with([POSITION]);

        // Registration binds `e` eagerly while its EntityAdded is still queued.
        let probe = Probe::new("eager", group(&[POSITION]), union(SETUP, ENTITY));
        let observed = probe.observed();
        let id = fx.add(probe);
        assert_eq!(observed.borrow().setups, vec![e]);

        fx.sync();
        assert_eq!(observed.borrow().setups, vec![e]);
        assert_eq!(fx.executor.tokens_for(id, e), 1);
        assert_eq!(fx.ledger.live_count(), 1);
    }

    #[test]
    fn test_group_reaction_requires_membership() {
        let mut fx = Fixture::new();
        let probe = Probe::new("placed", group(&[POSITION]), GROUP);
        let observed = probe.observed();
        let id = fx.add(probe);
        let member = fx.pool.create_entity_with([POSITION]);
        let outsider = fx.pool.create_entity_with([VELOCITY]);
        fx.sync();

        assert!(fx.executor.deliver(id, member, Role::ReactToGroup, None));
        assert!(!fx.executor.deliver(id, outsider, Role::ReactToGroup, None));

        fx.pool.remove_component(member, POSITION).unwrap();
        fx.sync();
        assert!(!fx.executor.deliver(id, member, Role::ReactToGroup, None));
        assert_eq!(
            observed.borrow().reactions,
            vec![(Role::ReactToGroup, member)]
        );
    }

    #[test]
    fn test_group_reaction_reaches_members_bound_at_registration() {
        let mut fx = Fixture::new();
        let member = fx.pool.create_entity_with([POSITION]);
        let id = fx.add(Probe::new("placed", group(&[POSITION]), GROUP));

        assert!(fx.executor.deliver(id, member, Role::ReactToGroup, None));
        fx.executor.remove_system(id);
        assert!(!fx.executor.deliver(id, member, Role::ReactToGroup, None));
    }
}
