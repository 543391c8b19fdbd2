//! Partial action streaming.
//!
//! While the translator is still producing an action it can already feed
//! parsed fields to the owning agent. The context opened for those calls is
//! parked in the system context and taken over by the first action of the
//! following batch.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::agent::AppAgent;
use crate::context::{ActionContext, ScopedActionContext};
use crate::dispatcher::Dispatcher;
use crate::error::{Capability, DispatchError};
use crate::types::app_agent_name;

/// Feeds partially parsed fields of one action to its agent.
#[derive(Clone)]
pub struct PartialActionCallback {
    agent: Arc<dyn AppAgent>,
    agent_name: String,
    action_name: String,
    context: ActionContext,
}

impl std::fmt::Debug for PartialActionCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartialActionCallback")
            .field("agent_name", &self.agent_name)
            .field("action_name", &self.action_name)
            .finish_non_exhaustive()
    }
}

impl PartialActionCallback {
    pub fn action_name(&self) -> &str {
        &self.action_name
    }

    /// Deliver the current value of `field_name`, with `delta` holding the
    /// text appended since the previous call when the field is a string.
    pub fn call(
        &self,
        field_name: &str,
        value: &serde_json::Value,
        delta: Option<&str>,
    ) -> Result<(), DispatchError> {
        if self.context.is_closed() {
            return Err(DispatchError::ContextClosed);
        }
        let executor =
            self.agent
                .as_streaming_executor()
                .ok_or_else(|| DispatchError::UnsupportedCapability {
                    agent: self.agent_name.clone(),
                    capability: Capability::StreamPartialAction,
                })?;
        trace!(action = %self.action_name, field = field_name, "partial action value");
        executor.stream_partial_action(&self.action_name, field_name, value, delta, &self.context);
        Ok(())
    }
}

impl Dispatcher {
    /// Open the streaming context for `action_name` of `translator_name`
    /// and park it for the next batch.
    ///
    /// Fails before opening anything when the agent cannot receive partial
    /// values. A context left pending by an earlier stream is closed.
    pub fn start_stream_partial_action(
        &self,
        translator_name: &str,
        action_name: &str,
    ) -> Result<PartialActionCallback, DispatchError> {
        let system = self.system();
        let agent_name = app_agent_name(translator_name);
        let agent = system.get_app_agent(agent_name)?;
        if agent.as_streaming_executor().is_none() {
            return Err(DispatchError::UnsupportedCapability {
                agent: agent_name.to_string(),
                capability: Capability::StreamPartialAction,
            });
        }
        let request_id = system.current_request_id()?;

        let scoped = ScopedActionContext::open(agent_name, system, request_id, Some(0))?;
        let context = scoped.context().clone();
        if let Some(previous) = system.replace_streaming_context(scoped) {
            debug!(agent = previous.agent_name(), "closing superseded streaming context");
            previous.close();
        }
        debug!(translator = translator_name, action = action_name, "streaming partial action");

        Ok(PartialActionCallback {
            agent,
            agent_name: agent_name.to_string(),
            action_name: action_name.to_string(),
            context,
        })
    }
}
