//! Group matching over the registered system list.
//!
//! Plain filters over `(SystemId, &TargetGroup)` pairs in registration order,
//! `O(systems × targeted types)` per event.

use reflex_component::{ComponentSet, ComponentTypeId, TargetGroup};

use crate::system::SystemId;

/// Systems whose group matches `components`.
pub fn applicable_systems<'a>(
    systems: impl IntoIterator<Item = (SystemId, &'a TargetGroup)>,
    components: &ComponentSet,
) -> Vec<SystemId> {
    systems
        .into_iter()
        .filter(|(_, group)| group.matches(components))
        .map(|(id, _)| id)
        .collect()
}

/// Systems whose group targets `component`, i.e. whose membership can change
/// when that type arrives or leaves.
pub fn targeting_systems<'a>(
    systems: impl IntoIterator<Item = (SystemId, &'a TargetGroup)>,
    component: ComponentTypeId,
) -> Vec<(SystemId, &'a TargetGroup)> {
    systems
        .into_iter()
        .filter(|(_, group)| group.targets(component))
        .collect()
}

/// Rebuild the set an entity had before `removed` was detached.
#[must_use]
pub fn before_removal(remaining: &ComponentSet, removed: ComponentTypeId) -> ComponentSet {
    let mut components = remaining.clone();
    components.insert(removed);
    components
}

/// Rebuild the set an entity had before `added` was attached.
#[must_use]
pub fn before_addition(current: &ComponentSet, added: ComponentTypeId) -> ComponentSet {
    let mut components = current.clone();
    components.remove(&added);
    components
}
