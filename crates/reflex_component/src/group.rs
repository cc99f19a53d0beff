//! Target groups: the membership predicate a system declares.
//!
//! A [`TargetGroup`] names the component types an entity must carry
//! (`required`) and must not carry (`excluded`). Together they form the
//! *targeted* types, the only types whose arrival or departure can change
//! whether an entity belongs to the group.
//!
//! ```text
//! matches(set)  =  required ⊆ set  AND  excluded ∩ set = ∅
//! targets(ty)   =  ty ∈ required ∪ excluded
//! ```

use serde::{Deserialize, Serialize};

use crate::component::{ComponentSet, ComponentTypeId};

/// The component-membership predicate attached to a system.
///
/// Groups are built once and handed to the executor by value, so a system's
/// targeted types cannot change while it is registered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    /// Component types an entity must carry.
    pub required: ComponentSet,
    /// Component types an entity must not carry.
    #[serde(default)]
    pub excluded: ComponentSet,
}

impl TargetGroup {
    /// Create a new empty group. An empty group matches every entity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required component type.
    #[must_use]
    pub fn with(mut self, type_id: ComponentTypeId) -> Self {
        self.required.insert(type_id);
        self
    }

    /// Add an excluded component type.
    #[must_use]
    pub fn without(mut self, type_id: ComponentTypeId) -> Self {
        self.excluded.insert(type_id);
        self
    }

    /// Returns `true` if an entity carrying exactly `components` belongs to
    /// this group.
    #[must_use]
    pub fn matches(&self, components: &ComponentSet) -> bool {
        self.required.is_subset(components) && self.excluded.is_disjoint(components)
    }

    /// Returns `true` if `type_id` is one of the types this group cares about.
    #[must_use]
    pub fn targets(&self, type_id: ComponentTypeId) -> bool {
        self.required.contains(&type_id) || self.excluded.contains(&type_id)
    }

    /// Returns `true` if `type_id` is one of the excluded types.
    #[must_use]
    pub fn excludes(&self, type_id: ComponentTypeId) -> bool {
        self.excluded.contains(&type_id)
    }

    /// Returns every targeted type (required first, then excluded).
    #[must_use]
    pub fn targeted_types(&self) -> Vec<ComponentTypeId> {
        let mut types = Vec::with_capacity(self.required.len() + self.excluded.len());
        types.extend(self.required.iter().copied());
        types.extend(self.excluded.iter().copied());
        types
    }
}
