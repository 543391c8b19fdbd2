//! Error types for the dispatch core.

use std::fmt;

use switchboard_core::error::SwitchboardError;

/// Optional agent capabilities the dispatcher may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ExecuteAction,
    ExecuteCommand,
    StreamPartialAction,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::ExecuteAction => write!(f, "execute_action"),
            Capability::ExecuteCommand => write!(f, "execute_command"),
            Capability::StreamPartialAction => write!(f, "stream_partial_action"),
        }
    }
}

/// Errors from action, command, and registry dispatch.
///
/// Every variant is fatal for the call that produced it. Recoverable agent
/// failures travel inside `ActionResult::error` instead.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Cannot execute action without translator name: {action}")]
    MissingTranslatorName { action: String },
    #[error("Agent not found: {0}")]
    AgentNotFound(String),
    #[error("Agent {agent} does not support {capability}")]
    UnsupportedCapability {
        agent: String,
        capability: Capability,
    },
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Invalid sub agent name {sub_agent} for agent {agent}")]
    InvalidSubAgent { agent: String, sub_agent: String },
    #[error("Transient sub agent not found: {0}")]
    TransientAgentNotFound(String),
    #[error("Invalid agent name: {0}")]
    InvalidAgentName(String),
    #[error("Agent already registered: {0}")]
    AgentAlreadyRegistered(String),
    #[error("Agent {0} is not a dynamic agent")]
    NotDynamicAgent(String),
    #[error("Context is closed")]
    ContextClosed,
    #[error("Session has ended")]
    SessionClosed,
    #[error("No active request")]
    NoActiveRequest,
    #[error("Command lock is already held by the current task")]
    CommandLockHeld,
    #[error("Agent {agent} failed: {message}")]
    AgentFailed { agent: String, message: String },
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
    #[error(transparent)]
    Core(#[from] SwitchboardError),
}

impl DispatchError {
    /// Convenience constructor for agents reporting a fatal failure.
    pub fn agent_failed(agent: impl Into<String>, message: impl Into<String>) -> Self {
        DispatchError::AgentFailed {
            agent: agent.into(),
            message: message.into(),
        }
    }

    pub(crate) fn poisoned<T>(err: std::sync::PoisonError<T>) -> Self {
        DispatchError::LockPoisoned(err.to_string())
    }
}
