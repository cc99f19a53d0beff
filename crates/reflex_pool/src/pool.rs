//! Entity pool storage.
//!
//! The [`Pool`] holds the canonical entity → component-set mapping. Component
//! data itself is not stored here; only which types each entity carries.
//! Every mutation is broadcast to the current subscribers as a [`PoolEvent`].

use std::collections::BTreeMap;

use reflex_component::{
    Component, ComponentSet, ComponentTypeId, Entity, EntityAllocator, TargetGroup,
};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tracing::{debug, trace};

use crate::error::{PoolError, PoolResult};
use crate::event::{ListenerId, PoolEvent, PoolSubscription};

/// One registered event subscriber.
#[derive(Debug)]
struct Listener {
    id: ListenerId,
    sender: UnboundedSender<PoolEvent>,
}

/// The entity pool.
///
/// Contains entity allocation, per-entity component sets, and the list of
/// subscribers that receive membership events.
#[derive(Debug)]
pub struct Pool {
    /// Entity ID allocator.
    allocator: EntityAllocator,
    /// Component types per live entity, ordered by entity ID.
    entities: BTreeMap<Entity, ComponentSet>,
    /// Event subscribers in subscription order.
    listeners: Vec<Listener>,
    /// Next listener ID to hand out.
    next_listener: u64,
}

impl Pool {
    /// Create a new empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            entities: BTreeMap::new(),
            listeners: Vec::new(),
            next_listener: 1,
        }
    }

    // -- Subscriptions --

    /// Open a new event feed. Only events emitted after this call are
    /// delivered to it.
    pub fn subscribe(&mut self) -> PoolSubscription {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        let (sender, receiver) = unbounded_channel();
        self.listeners.push(Listener { id, sender });
        debug!(listener = id.0, "pool listener subscribed");
        PoolSubscription::new(id, receiver)
    }

    /// Close an event feed. Events already queued on it stay drainable.
    ///
    /// Returns `true` if the listener was still registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|listener| listener.id != id);
        let removed = self.listeners.len() != before;
        if removed {
            debug!(listener = id.0, "pool listener unsubscribed");
        }
        removed
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn emit(&mut self, event: PoolEvent) {
        trace!(
            event = event.kind(),
            entity = %event.entity(),
            listeners = self.listeners.len(),
            "emitting pool event"
        );
        // A failed send means the subscription was dropped.
        self.listeners
            .retain(|listener| listener.sender.send(event.clone()).is_ok());
    }

    // -- Entity lifecycle --

    /// Create an entity with no components.
    pub fn create_entity(&mut self) -> Entity {
        self.create_entity_with(std::iter::empty())
    }

    /// Create an entity that starts out with the given component types.
    ///
    /// A single `EntityAdded` event is emitted carrying the full set.
    pub fn create_entity_with(
        &mut self,
        components: impl IntoIterator<Item = ComponentTypeId>,
    ) -> Entity {
        let entity = self.allocator.allocate();
        let components: ComponentSet = components.into_iter().collect();
        debug!(%entity, components = components.len(), "entity created");
        self.entities.insert(entity, components.clone());
        self.emit(PoolEvent::EntityAdded { entity, components });
        entity
    }

    /// Remove an entity from the pool, returning the components it carried.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::EntityNotFound`] if the entity does not exist.
    pub fn remove_entity(&mut self, entity: Entity) -> PoolResult<ComponentSet> {
        let components = self
            .entities
            .remove(&entity)
            .ok_or(PoolError::EntityNotFound(entity))?;
        debug!(%entity, "entity removed");
        self.emit(PoolEvent::EntityRemoved {
            entity,
            components: components.clone(),
        });
        Ok(components)
    }

    /// Returns `true` if the entity is live.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains_key(&entity)
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Returns every live entity with its component set, ordered by ID.
    pub fn entities(&self) -> impl Iterator<Item = (Entity, &ComponentSet)> {
        self.entities.iter().map(|(&entity, set)| (entity, set))
    }

    /// Returns every live entity that belongs to `group`, ordered by ID.
    #[must_use]
    pub fn matching(&self, group: &TargetGroup) -> Vec<Entity> {
        self.entities
            .iter()
            .filter(|(_, set)| group.matches(set))
            .map(|(&entity, _)| entity)
            .collect()
    }

    // -- Component operations --

    /// Returns the component types an entity carries.
    #[must_use]
    pub fn components(&self, entity: Entity) -> Option<&ComponentSet> {
        self.entities.get(&entity)
    }

    /// Attach a component type to an entity.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::EntityNotFound`] if the entity does not exist, or
    /// [`PoolError::ComponentAlreadyPresent`] if it already carries the type.
    pub fn add_component(&mut self, entity: Entity, component: ComponentTypeId) -> PoolResult<()> {
        let set = self
            .entities
            .get_mut(&entity)
            .ok_or(PoolError::EntityNotFound(entity))?;
        if !set.insert(component) {
            return Err(PoolError::ComponentAlreadyPresent { entity, component });
        }
        let components = set.clone();
        debug!(%entity, %component, "component added");
        self.emit(PoolEvent::ComponentAdded {
            entity,
            component,
            components,
        });
        Ok(())
    }

    /// Attach the component type `C` to an entity.
    ///
    /// # Errors
    ///
    /// See [`Pool::add_component`].
    pub fn add<C: Component>(&mut self, entity: Entity) -> PoolResult<()> {
        self.add_component(entity, C::component_type_id())
    }

    /// Detach a component type from an entity.
    ///
    /// The component is gone from the entity before the `ComponentRemoved`
    /// event is emitted; the event carries the remaining set.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::EntityNotFound`] if the entity does not exist, or
    /// [`PoolError::ComponentNotFound`] if it does not carry the type.
    pub fn remove_component(
        &mut self,
        entity: Entity,
        component: ComponentTypeId,
    ) -> PoolResult<()> {
        let set = self
            .entities
            .get_mut(&entity)
            .ok_or(PoolError::EntityNotFound(entity))?;
        if !set.remove(&component) {
            return Err(PoolError::ComponentNotFound { entity, component });
        }
        let components = set.clone();
        debug!(%entity, %component, "component removed");
        self.emit(PoolEvent::ComponentRemoved {
            entity,
            component,
            components,
        });
        Ok(())
    }

    /// Detach the component type `C` from an entity.
    ///
    /// # Errors
    ///
    /// See [`Pool::remove_component`].
    pub fn remove<C: Component>(&mut self, entity: Entity) -> PoolResult<()> {
        self.remove_component(entity, C::component_type_id())
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}
