//! # reflex_component
//!
//! The vocabulary shared by the pool and the executor: what an entity is, how
//! component types are identified, and how a system declares which entities
//! it is interested in.
//!
//! This crate provides:
//!
//! - [`Component`] trait: ties a Rust type to a stable [`ComponentTypeId`].
//! - [`Entity`]: lightweight `u64` entity identifiers.
//! - [`EntityAllocator`]: monotonically increasing ID allocator.
//! - [`ComponentSet`]: the set of component types an entity carries.
//! - [`TargetGroup`]: required/excluded types and the membership predicate.

pub mod component;
pub mod entity;
pub mod group;

pub use component::{Component, ComponentSet, ComponentTypeId};
pub use entity::{Entity, EntityAllocator};
pub use group::TargetGroup;
