//! Pool events and the subscription that delivers them.
//!
//! Every event carries a snapshot of the affected entity's component set, so a
//! subscriber can process it later without asking the pool what the entity
//! looked like at the time:
//!
//! | event              | snapshot                                   |
//! |--------------------|--------------------------------------------|
//! | `EntityAdded`      | the set the entity was created with        |
//! | `EntityRemoved`    | the set the entity had when it was removed |
//! | `ComponentAdded`   | the set *after* the component was attached |
//! | `ComponentRemoved` | the set *after* the component was detached |

use reflex_component::{ComponentSet, ComponentTypeId, Entity};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;

/// Identifies one subscriber of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// A membership change emitted by a [`Pool`](crate::Pool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    /// An entity was created.
    EntityAdded {
        entity: Entity,
        components: ComponentSet,
    },
    /// An entity was removed from the pool.
    EntityRemoved {
        entity: Entity,
        components: ComponentSet,
    },
    /// A component was attached to an entity.
    ComponentAdded {
        entity: Entity,
        component: ComponentTypeId,
        components: ComponentSet,
    },
    /// A component was detached from an entity.
    ComponentRemoved {
        entity: Entity,
        component: ComponentTypeId,
        components: ComponentSet,
    },
}

impl PoolEvent {
    /// The entity this event is about.
    #[must_use]
    pub fn entity(&self) -> Entity {
        match self {
            Self::EntityAdded { entity, .. }
            | Self::EntityRemoved { entity, .. }
            | Self::ComponentAdded { entity, .. }
            | Self::ComponentRemoved { entity, .. } => *entity,
        }
    }

    /// The entity's component set as carried by the event.
    #[must_use]
    pub fn components(&self) -> &ComponentSet {
        match self {
            Self::EntityAdded { components, .. }
            | Self::EntityRemoved { components, .. }
            | Self::ComponentAdded { components, .. }
            | Self::ComponentRemoved { components, .. } => components,
        }
    }

    /// A short name for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EntityAdded { .. } => "entity_added",
            Self::EntityRemoved { .. } => "entity_removed",
            Self::ComponentAdded { .. } => "component_added",
            Self::ComponentRemoved { .. } => "component_removed",
        }
    }
}

/// An event feed obtained from [`Pool::subscribe`](crate::Pool::subscribe).
///
/// Events queue up in emission order until drained with
/// [`PoolSubscription::try_next`]. Dropping the subscription closes the feed;
/// the pool notices on its next emission and forgets the listener.
#[derive(Debug)]
pub struct PoolSubscription {
    id: ListenerId,
    receiver: UnboundedReceiver<PoolEvent>,
}

impl PoolSubscription {
    pub(crate) fn new(id: ListenerId, receiver: UnboundedReceiver<PoolEvent>) -> Self {
        Self { id, receiver }
    }

    /// The listener ID to pass to [`Pool::unsubscribe`](crate::Pool::unsubscribe).
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Take the next queued event, if any.
    ///
    /// Returns `None` both when the queue is empty and when the pool has
    /// dropped this listener.
    pub fn try_next(&mut self) -> Option<PoolEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Returns `true` if the pool has stopped delivering to this feed and
    /// nothing is left to drain.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.receiver.is_closed() && self.receiver.is_empty()
    }
}
