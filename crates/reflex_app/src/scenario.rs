//! Scenario file format.
//!
//! A scenario declares systems up front and then a list of steps that mutate
//! the pool or the executor. Entities and systems are referred to by name;
//! components by their type name.

use std::path::Path;

use anyhow::{Context, Result};
use reflex_component::{ComponentTypeId, TargetGroup};
use reflex_executor::{ExecutorConfig, Role};
use serde::{Deserialize, Serialize};

/// A complete scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: ExecutorConfig,
    #[serde(default)]
    pub systems: Vec<SystemSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Read and parse a scenario file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing scenario {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// A system declared by a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSpec {
    pub name: String,
    pub roles: Vec<Role>,
    /// Required component type names.
    #[serde(default)]
    pub required: Vec<String>,
    /// Excluded component type names.
    #[serde(default)]
    pub excluded: Vec<String>,
    /// Register without a target group.
    #[serde(default)]
    pub ungrouped: bool,
}

impl SystemSpec {
    /// The target group this system declares, or `None` if it is ungrouped.
    pub fn target_group(&self) -> Option<TargetGroup> {
        if self.ungrouped {
            return None;
        }
        let group = self
            .required
            .iter()
            .fold(TargetGroup::new(), |group, name| group.with(component(name)));
        Some(
            self.excluded
                .iter()
                .fold(group, |group, name| group.without(component(name))),
        )
    }
}

/// One scenario step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    CreateEntity {
        name: String,
        #[serde(default)]
        components: Vec<String>,
    },
    AddComponent {
        entity: String,
        component: String,
    },
    RemoveComponent {
        entity: String,
        component: String,
    },
    RemoveEntity {
        entity: String,
    },
    AddSystem {
        system: SystemSpec,
    },
    RemoveSystem {
        system: String,
    },
    /// Push a reaction to a system over one of its bindings.
    Deliver {
        system: String,
        entity: String,
        role: Role,
        #[serde(default)]
        data: Option<serde_json::Value>,
    },
    /// Check the number of live bindings.
    Expect {
        bindings: usize,
        #[serde(default)]
        system: Option<String>,
    },
}

impl Step {
    /// Short name of the operation, for logging.
    pub fn op(&self) -> &'static str {
        match self {
            Step::CreateEntity { .. } => "create_entity",
            Step::AddComponent { .. } => "add_component",
            Step::RemoveComponent { .. } => "remove_component",
            Step::RemoveEntity { .. } => "remove_entity",
            Step::AddSystem { .. } => "add_system",
            Step::RemoveSystem { .. } => "remove_system",
            Step::Deliver { .. } => "deliver",
            Step::Expect { .. } => "expect",
        }
    }
}

/// Component type ID for a component type name.
pub fn component(name: &str) -> ComponentTypeId {
    ComponentTypeId::from_name(name)
}
