//! # reflex_pool
//!
//! The entity pool: the collaborator that owns entities and their component
//! sets and tells interested parties when either changes.
//!
//! This crate provides:
//!
//! - [`Pool`]: entity creation/removal and component attach/detach.
//! - [`PoolEvent`]: the four membership events a pool emits.
//! - [`PoolSubscription`]: an explicit, droppable event feed.
//! - [`PoolError`]: pool-level error types.

pub mod error;
pub mod event;
pub mod pool;

pub use error::{PoolError, PoolResult};
pub use event::{ListenerId, PoolEvent, PoolSubscription};
pub use pool::Pool;
