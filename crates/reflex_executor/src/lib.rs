//! # reflex_executor
//!
//! Keeps a set of systems bound to exactly the entities they care about.
//!
//! The executor listens to a [`Pool`](reflex_pool::Pool), works out which
//! registered systems an event affects, and asks the capability handlers to
//! bind or release per-entity work. Every live binding is represented by a
//! [`SubscriptionToken`] held in the executor's subscription index until the
//! entity leaves the system's group or the system is removed.
//!
//! ## Usage
//!
//! ```rust
//! use reflex_component::{ComponentTypeId, Entity, TargetGroup};
//! use reflex_executor::{
//!     BindingLedger, ExecutorConfig, Handlers, ReactToEntitySystem, System, SystemExecutor,
//! };
//! use reflex_pool::Pool;
//!
//! const POSITION: ComponentTypeId = ComponentTypeId::from_name("Position");
//!
//! struct Tracker {
//!     group: TargetGroup,
//! }
//!
//! impl ReactToEntitySystem for Tracker {
//!     fn on_entity_reaction(&mut self, _entity: Entity) {}
//! }
//!
//! impl System for Tracker {
//!     fn name(&self) -> &str { "tracker" }
//!     fn target_group(&self) -> Option<&TargetGroup> { Some(&self.group) }
//!     fn as_react_to_entity(&mut self) -> Option<&mut dyn ReactToEntitySystem> { Some(self) }
//! }
//!
//! let mut pool = Pool::new();
//! let ledger = BindingLedger::new();
//! let mut executor =
//!     SystemExecutor::attach(&mut pool, Handlers::from_ledger(&ledger), ExecutorConfig::default());
//!
//! let tracker = executor
//!     .add_system(&pool, Box::new(Tracker { group: TargetGroup::new().with(POSITION) }))
//!     .unwrap();
//!
//! let entity = pool.create_entity_with([POSITION]);
//! executor.process_pending_events();
//! assert_eq!(executor.tokens_for(tracker, entity), 1);
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod handler;
mod index;
pub mod ledger;
pub mod matcher;
pub mod system;
pub mod token;

pub use config::{DuplicatePolicy, ExecutorConfig};
pub use error::{ExecutorError, ExecutorResult};
pub use executor::SystemExecutor;
pub use handler::{
    Handlers, ReactToDataSystemHandler, ReactToEntitySystemHandler, ReactToGroupSystemHandler,
    SetupSystemHandler,
};
pub use ledger::{Binding, BindingId, BindingLedger, LedgerHandler};
pub use system::{
    Capabilities, ErasedDataSystem, ReactToDataSystem, ReactToEntitySystem, ReactToGroupSystem,
    Role, SetupSystem, System, SystemId,
};
pub use token::SubscriptionToken;
