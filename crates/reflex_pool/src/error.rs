//! Pool-level error types.

use reflex_component::{ComponentTypeId, Entity};

/// Alias for `Result<T, PoolError>`.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors that can occur when mutating a pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The entity does not exist in the pool.
    #[error("entity not found: {0}")]
    EntityNotFound(Entity),

    /// The entity already carries a component of this type.
    #[error("component {component} already present on {entity}")]
    ComponentAlreadyPresent {
        /// The entity that was targeted.
        entity: Entity,
        /// The duplicated component type.
        component: ComponentTypeId,
    },

    /// The entity does not carry a component of this type.
    #[error("component {component} not found on {entity}")]
    ComponentNotFound {
        /// The entity that was targeted.
        entity: Entity,
        /// The missing component type.
        component: ComponentTypeId,
    },
}
