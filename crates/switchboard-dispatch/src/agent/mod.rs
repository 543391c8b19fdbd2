//! Agent capability traits.
//!
//! Every agent implements `AppAgent`. The optional capabilities the
//! dispatcher drives are separate traits; an agent advertises them by
//! returning itself from the matching `as_*` query. Dispatch checks the
//! query instead of assuming a capability is present.

pub mod manifest;
pub mod registry;

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::{ActionContext, SessionContext};
use crate::error::DispatchError;
use crate::types::{Action, ActionResult};

pub use manifest::AppAgentManifest;
pub use registry::AgentRegistry;

/// Agent-private state, created once per registration and reachable from
/// the agent's `SessionContext`.
pub type AgentContextValue = Arc<dyn Any + Send + Sync>;

/// Core trait implemented by every agent.
#[async_trait]
pub trait AppAgent: Send + Sync {
    /// Create the agent's private state at registration time.
    async fn initialize_agent_context(&self) -> Result<AgentContextValue, DispatchError> {
        Ok(Arc::new(()))
    }

    fn as_action_executor(&self) -> Option<&dyn ActionExecutor> {
        None
    }

    fn as_command_executor(&self) -> Option<&dyn CommandExecutor> {
        None
    }

    fn as_streaming_executor(&self) -> Option<&dyn StreamingActionExecutor> {
        None
    }

    fn as_wildcard_validator(&self) -> Option<&dyn WildcardValidator> {
        None
    }
}

/// Executes translated actions.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Run one action. Returning `Ok(None)` means "completed, nothing to
    /// report". A recoverable failure is `Ok(Some(ActionResult::error(..)))`;
    /// `Err` aborts the rest of the batch.
    async fn execute_action(
        &self,
        action: &Action,
        context: &ActionContext,
    ) -> Result<Option<ActionResult>, DispatchError>;
}

/// Executes operator commands addressed to the agent by name.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute_command(
        &self,
        command_path: &[String],
        params: Option<&serde_json::Value>,
        context: &ActionContext,
        attachments: &[String],
    ) -> Result<Option<serde_json::Value>, DispatchError>;
}

/// Receives partially parsed action parameters while the translator is
/// still producing them.
pub trait StreamingActionExecutor: Send + Sync {
    fn stream_partial_action(
        &self,
        action_name: &str,
        field_name: &str,
        value: &serde_json::Value,
        delta: Option<&str>,
        context: &ActionContext,
    );
}

/// Lets an agent veto wildcard matches produced by the action cache.
#[async_trait]
pub trait WildcardValidator: Send + Sync {
    /// `Some(false)` rejects the match; `None` abstains.
    async fn validate_wildcard_match(
        &self,
        action: &Action,
        session: &SessionContext,
    ) -> Option<bool>;
}
