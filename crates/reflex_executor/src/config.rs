//! Executor configuration.

use serde::{Deserialize, Serialize};

/// What to do when a system is registered under a name already in use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail with [`ExecutorError::DuplicateSystem`](crate::ExecutorError::DuplicateSystem).
    #[default]
    Reject,
    /// Register it anyway. Each registration gets its own ID and tokens.
    Allow,
}

/// Configuration for a [`SystemExecutor`](crate::SystemExecutor).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Handling of duplicate system names.
    pub duplicate_policy: DuplicatePolicy,
    /// Process queued pool events before registering a system. When off,
    /// queued events for entities already bound at registration run neither
    /// Setup nor the handlers a second time.
    pub drain_before_register: bool,
}

impl ExecutorConfig {
    /// Create the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the duplicate-name policy.
    #[must_use]
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Override whether queued events are drained before registration.
    #[must_use]
    pub fn with_drain_before_register(mut self, drain: bool) -> Self {
        self.drain_before_register = drain;
        self
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Reject,
            drain_before_register: true,
        }
    }
}
