//! Systems, capability roles, and the classifier that maps one to the other.
//!
//! A system is not a fixed type. It is any [`System`] implementor that opts
//! into zero or more roles by returning `Some(self)` from the matching
//! `as_*` accessor:
//!
//! | role            | accessor               | role trait               |
//! |-----------------|------------------------|--------------------------|
//! | Setup           | `as_setup`             | [`SetupSystem`]          |
//! | ReactToEntity   | `as_react_to_entity`   | [`ReactToEntitySystem`]  |
//! | ReactToGroup    | `as_react_to_group`    | [`ReactToGroupSystem`]   |
//! | ReactToData     | `as_react_to_data`     | [`ErasedDataSystem`]     |
//!
//! The executor probes the accessors once, at registration, and keeps the
//! answer as a [`Capabilities`] record.

use std::any::Any;

use reflex_component::{Entity, TargetGroup};
use serde::{Deserialize, Serialize};

slotmap::new_key_type! {
    /// Stable identifier of a registered system.
    pub struct SystemId;
}

/// A unit of behaviour driven by entity membership.
pub trait System: 'static {
    /// A human-readable name, unique among registered systems unless the
    /// executor is configured to allow duplicates.
    fn name(&self) -> &str;

    /// The group of entities this system is interested in.
    fn target_group(&self) -> Option<&TargetGroup> {
        None
    }

    /// Per-entity setup, run once each time an entity joins the group.
    fn as_setup(&mut self) -> Option<&mut dyn SetupSystem> {
        None
    }

    /// Per-entity reactive binding.
    fn as_react_to_entity(&mut self) -> Option<&mut dyn ReactToEntitySystem> {
        None
    }

    /// A single binding to the group as a whole.
    fn as_react_to_group(&mut self) -> Option<&mut dyn ReactToGroupSystem> {
        None
    }

    /// Per-entity binding to a typed data stream.
    fn as_react_to_data(&mut self) -> Option<&mut dyn ErasedDataSystem> {
        None
    }
}

/// Runs once for every entity that enters the system's group.
pub trait SetupSystem {
    fn setup(&mut self, entity: Entity);
}

/// Reacts to something happening to one specific entity.
pub trait ReactToEntitySystem {
    fn on_entity_reaction(&mut self, entity: Entity);
}

/// Reacts to something happening to the group, once per member entity.
pub trait ReactToGroupSystem {
    fn on_group_reaction(&mut self, entity: Entity);
}

/// Reacts to values of type [`ReactToDataSystem::Data`] arriving for an
/// entity.
///
/// Implementors get an [`ErasedDataSystem`] implementation for free, which is
/// what the executor and the data handler work with.
pub trait ReactToDataSystem {
    type Data: 'static;

    fn on_data(&mut self, entity: Entity, data: &Self::Data);
}

/// A data-reactive system with its data type parameter erased.
pub trait ErasedDataSystem {
    /// The name of the erased data type, for diagnostics.
    fn data_type_name(&self) -> &'static str;

    /// Deliver `data` if it is of the system's data type.
    ///
    /// Returns `false` and does nothing on a type mismatch.
    fn on_erased_data(&mut self, entity: Entity, data: &dyn Any) -> bool;
}

impl<T: ReactToDataSystem> ErasedDataSystem for T {
    fn data_type_name(&self) -> &'static str {
        std::any::type_name::<T::Data>()
    }

    fn on_erased_data(&mut self, entity: Entity, data: &dyn Any) -> bool {
        match data.downcast_ref::<T::Data>() {
            Some(data) => {
                self.on_data(entity, data);
                true
            }
            None => false,
        }
    }
}

/// One capability role a system can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Setup,
    ReactToEntity,
    ReactToGroup,
    ReactToData,
}

impl Role {
    /// Every role, in the order the executor applies them.
    pub const ALL: [Role; 4] = [
        Role::Setup,
        Role::ReactToGroup,
        Role::ReactToEntity,
        Role::ReactToData,
    ];

    /// Returns `true` for roles whose handler hands back subscription tokens.
    #[must_use]
    pub const fn has_subscriptions(self) -> bool {
        !matches!(self, Role::Setup)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::Setup => "setup",
            Role::ReactToEntity => "react_to_entity",
            Role::ReactToGroup => "react_to_group",
            Role::ReactToData => "react_to_data",
        };
        f.write_str(name)
    }
}

/// The set of roles a system holds, computed once at registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub setup: bool,
    pub react_to_entity: bool,
    pub react_to_group: bool,
    pub react_to_data: bool,
}

impl Capabilities {
    /// Probe a system's role accessors.
    #[must_use]
    pub fn classify(system: &mut dyn System) -> Self {
        Self {
            setup: system.as_setup().is_some(),
            react_to_entity: system.as_react_to_entity().is_some(),
            react_to_group: system.as_react_to_group().is_some(),
            react_to_data: system.as_react_to_data().is_some(),
        }
    }

    /// Returns `true` if the system holds `role`.
    #[must_use]
    pub const fn has(self, role: Role) -> bool {
        match role {
            Role::Setup => self.setup,
            Role::ReactToEntity => self.react_to_entity,
            Role::ReactToGroup => self.react_to_group,
            Role::ReactToData => self.react_to_data,
        }
    }

    /// Returns `true` for data-reactive systems.
    #[must_use]
    pub const fn is_reactive_data_system(self) -> bool {
        self.react_to_data
    }

    /// Returns `true` if the system holds no role at all.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        !(self.setup || self.react_to_entity || self.react_to_group || self.react_to_data)
    }

    /// Returns `true` if any held role produces subscription tokens.
    #[must_use]
    pub fn has_subscriptions(self) -> bool {
        self.roles().any(Role::has_subscriptions)
    }

    /// The held roles, in application order.
    pub fn roles(self) -> impl Iterator<Item = Role> {
        Role::ALL.into_iter().filter(move |&role| self.has(role))
    }
}

impl FromIterator<Role> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Role>>(roles: I) -> Self {
        roles.into_iter().fold(Self::default(), |mut capabilities, role| {
            match role {
                Role::Setup => capabilities.setup = true,
                Role::ReactToEntity => capabilities.react_to_entity = true,
                Role::ReactToGroup => capabilities.react_to_group = true,
                Role::ReactToData => capabilities.react_to_data = true,
            }
            capabilities
        })
    }
}

impl std::fmt::Display for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let roles: Vec<String> = self.roles().map(|role| role.to_string()).collect();
        if roles.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&roles.join("+"))
        }
    }
}
