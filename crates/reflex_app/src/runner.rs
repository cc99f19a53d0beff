//! Replays a [`Scenario`] against a pool and an attached executor.

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use reflex_component::{Entity, TargetGroup};
use reflex_executor::{
    BindingLedger, Capabilities, ErasedDataSystem, ExecutorConfig, Handlers, ReactToDataSystem,
    ReactToEntitySystem, ReactToGroupSystem, Role, SetupSystem, System, SystemExecutor, SystemId,
};
use reflex_pool::Pool;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::scenario::{Scenario, Step, SystemSpec, component};

/// What a scenario system has been asked to do so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub setups: u64,
    pub entity_reactions: u64,
    pub group_reactions: u64,
    pub data_reactions: u64,
}

/// A system whose roles come from a scenario declaration. It only counts
/// the calls it receives.
pub struct ScenarioSystem {
    name: String,
    group: Option<TargetGroup>,
    roles: Capabilities,
    activity: Rc<RefCell<Activity>>,
}

impl ScenarioSystem {
    pub fn from_spec(spec: &SystemSpec) -> Self {
        Self {
            name: spec.name.clone(),
            group: spec.target_group(),
            roles: spec.roles.iter().copied().collect(),
            activity: Rc::default(),
        }
    }

    /// Shared handle on this system's activity counters.
    pub fn activity(&self) -> Rc<RefCell<Activity>> {
        Rc::clone(&self.activity)
    }
}

impl SetupSystem for ScenarioSystem {
    fn setup(&mut self, entity: Entity) {
        debug!(system = self.name, %entity, "setup");
        self.activity.borrow_mut().setups += 1;
    }
}

impl ReactToEntitySystem for ScenarioSystem {
    fn on_entity_reaction(&mut self, entity: Entity) {
        debug!(system = self.name, %entity, "entity reaction");
        self.activity.borrow_mut().entity_reactions += 1;
    }
}

impl ReactToGroupSystem for ScenarioSystem {
    fn on_group_reaction(&mut self, entity: Entity) {
        debug!(system = self.name, %entity, "group reaction");
        self.activity.borrow_mut().group_reactions += 1;
    }
}

impl ReactToDataSystem for ScenarioSystem {
    type Data = serde_json::Value;

    fn on_data(&mut self, entity: Entity, data: &serde_json::Value) {
        debug!(system = self.name, %entity, %data, "data reaction");
        self.activity.borrow_mut().data_reactions += 1;
    }
}

impl System for ScenarioSystem {
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

/// State after one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub op: &'static str,
    pub entities: usize,
    pub systems: usize,
    pub live_bindings: usize,
    pub tokens: usize,
}

/// Per-system totals at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct SystemReport {
    pub name: String,
    pub registered: bool,
    pub activity: Activity,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub steps: Vec<StepReport>,
    pub systems: Vec<SystemReport>,
    pub released: u64,
}

struct Tracked {
    id: Option<SystemId>,
    activity: Rc<RefCell<Activity>>,
}

/// A pool, an executor attached to it, and the ledger its handlers record into.
pub struct Runner {
    pool: Pool,
    ledger: BindingLedger,
    executor: SystemExecutor,
    entities: BTreeMap<String, Entity>,
    systems: BTreeMap<String, Tracked>,
    steps: Vec<StepReport>,
}

impl Runner {
    pub fn new(config: ExecutorConfig) -> Self {
        let mut pool = Pool::new();
        let ledger = BindingLedger::new();
        let executor = SystemExecutor::attach(&mut pool, Handlers::from_ledger(&ledger), config);
        Self {
            pool,
            ledger,
            executor,
            entities: BTreeMap::new(),
            systems: BTreeMap::new(),
            steps: Vec::new(),
        }
    }

    /// Register every declared system, replay every step, then tear down.
    pub fn run(scenario: &Scenario) -> Result<Report> {
        let mut runner = Self::new(scenario.config.clone());
        for spec in &scenario.systems {
            runner.add_system(spec)?;
        }
        for (index, step) in scenario.steps.iter().enumerate() {
            runner
                .step(step)
                .with_context(|| format!("step {index} ({})", step.op()))?;
        }
        Ok(runner.finish())
    }

    pub fn add_system(&mut self, spec: &SystemSpec) -> Result<SystemId> {
        let system = ScenarioSystem::from_spec(spec);
        let activity = system.activity();
        let id = self
            .executor
            .add_system(&self.pool, Box::new(system))
            .with_context(|| format!("registering system {}", spec.name))?;
        self.systems.insert(
            spec.name.clone(),
            Tracked {
                id: Some(id),
                activity,
            },
        );
        Ok(id)
    }

    /// Apply one step and route the events it caused.
    pub fn step(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::CreateEntity { name, components } => {
                if self.entities.contains_key(name) {
                    bail!("entity {name} already exists");
                }
                let entity = self
                    .pool
                    .create_entity_with(components.iter().map(|name| component(name)));
                self.entities.insert(name.clone(), entity);
            }
            Step::AddComponent { entity, component: name } => {
                let entity = self.entity(entity)?;
                self.pool.add_component(entity, component(name))?;
            }
            Step::RemoveComponent { entity, component: name } => {
                let entity = self.entity(entity)?;
                self.pool.remove_component(entity, component(name))?;
            }
            Step::RemoveEntity { entity: name } => {
                let entity = self.entity(name)?;
                self.pool.remove_entity(entity)?;
                self.entities.remove(name);
            }
            Step::AddSystem { system } => {
                self.add_system(system)?;
            }
            Step::RemoveSystem { system } => {
                let id = self.system(system)?;
                self.executor.remove_system(id);
                if let Some(tracked) = self.systems.get_mut(system) {
                    tracked.id = None;
                }
            }
            Step::Deliver {
                system,
                entity,
                role,
                data,
            } => {
                let id = self.system(system)?;
                let entity = self.entity(entity)?;
                let delivered = match (role, data) {
                    (Role::ReactToData, Some(data)) => {
                        self.executor.deliver(id, entity, *role, Some(data as &dyn Any))
                    }
                    _ => self.executor.deliver(id, entity, *role, None),
                };
                if !delivered {
                    warn!(system, %entity, %role, "reaction not delivered");
                }
            }
            Step::Expect { bindings, system } => {
                self.executor.process_pending_events();
                let live = match system {
                    Some(name) => self.ledger.live_for(self.system(name)?).len(),
                    None => self.ledger.live_count(),
                };
                if live != *bindings {
                    bail!("expected {bindings} live bindings, found {live}");
                }
            }
        }

        self.executor.process_pending_events();
        self.record(step.op());
        Ok(())
    }

    /// Number of live bindings in the ledger.
    pub fn live_bindings(&self) -> usize {
        self.ledger.live_count()
    }

    /// Detach the executor and summarise the run.
    pub fn finish(self) -> Report {
        let Self {
            mut pool,
            ledger,
            executor,
            systems,
            steps,
            ..
        } = self;
        executor.detach(&mut pool);

        let systems = systems
            .into_iter()
            .map(|(name, tracked)| SystemReport {
                name,
                registered: tracked.id.is_some(),
                activity: tracked.activity.borrow().clone(),
            })
            .collect();
        Report {
            steps,
            systems,
            released: ledger.released_count(),
        }
    }

    fn record(&mut self, op: &'static str) {
        let report = StepReport {
            step: self.steps.len(),
            op,
            entities: self.pool.entity_count(),
            systems: self.executor.system_count(),
            live_bindings: self.live_bindings(),
            tokens: self.executor.total_tokens(),
        };
        info!(
            step = report.step,
            op,
            entities = report.entities,
            systems = report.systems,
            live_bindings = report.live_bindings,
            "step applied"
        );
        self.steps.push(report);
    }

    fn entity(&self, name: &str) -> Result<Entity> {
        self.entities
            .get(name)
            .copied()
            .with_context(|| format!("unknown entity {name}"))
    }

    fn system(&self, name: &str) -> Result<SystemId> {
        self.systems
            .get(name)
            .and_then(|tracked| tracked.id)
            .with_context(|| format!("unknown or removed system {name}"))
    }
}
