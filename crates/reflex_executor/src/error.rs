//! Executor error types.

use crate::system::Capabilities;

/// Alias for `Result<T, ExecutorError>`.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Errors raised when registering a system.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The system implements none of the capability roles.
    #[error("system \"{0}\" implements no capability role")]
    NoCapabilities(String),

    /// The system holds roles that need a target group but declares none.
    #[error("system \"{name}\" has roles {capabilities} but no target group")]
    MissingTargetGroup {
        /// The offending system's name.
        name: String,
        /// The roles it declared.
        capabilities: Capabilities,
    },

    /// A system with the same name is already registered.
    #[error("system \"{0}\" is already registered")]
    DuplicateSystem(String),
}
