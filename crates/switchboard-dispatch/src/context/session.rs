//! Per-agent session context.
//!
//! Lives as long as the agent's registration. Gives the agent its private
//! state, optional storage, event notification, and the registry-mutating
//! operations it is allowed to perform. Every registry mutation runs under
//! the system's command lock.

use std::sync::{Arc, OnceLock, Weak};

use switchboard_core::events::AppAgentEvent;

use crate::agent::{AgentContextValue, AppAgent, AppAgentManifest};
use crate::context::{AgentRegistration, CommandHandlerContext};
use crate::error::DispatchError;
use crate::storage::{FileStorage, Storage};

struct SessionInner {
    name: String,
    agent_context: AgentContextValue,
    system: Weak<CommandHandlerContext>,
    allow_dynamic_agent: bool,
    session_storage: OnceLock<Option<Arc<FileStorage>>>,
    instance_storage: OnceLock<Option<Arc<FileStorage>>>,
}

/// Handle to an agent's session. Cheap to clone.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<SessionInner>,
}

impl SessionContext {
    /// Build the session context for agent `name`.
    pub fn build(
        name: &str,
        agent_context: AgentContextValue,
        system: &Arc<CommandHandlerContext>,
        allow_dynamic_agent: bool,
    ) -> Self {
        Self::new(name, agent_context, Arc::downgrade(system), allow_dynamic_agent)
    }

    pub(crate) fn new(
        name: &str,
        agent_context: AgentContextValue,
        system: Weak<CommandHandlerContext>,
        allow_dynamic_agent: bool,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                name: name.to_string(),
                agent_context,
                system,
                allow_dynamic_agent,
                session_storage: OnceLock::new(),
                instance_storage: OnceLock::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The agent's private state, if it is a `T`.
    pub fn agent_context<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner.agent_context).downcast::<T>().ok()
    }

    pub fn agent_context_value(&self) -> AgentContextValue {
        Arc::clone(&self.inner.agent_context)
    }

    pub fn allows_dynamic_agent(&self) -> bool {
        self.inner.allow_dynamic_agent
    }

    fn system(&self) -> Result<Arc<CommandHandlerContext>, DispatchError> {
        self.inner.system.upgrade().ok_or(DispatchError::SessionClosed)
    }

    /// Storage under the session directory. `None` when the host has no
    /// session directory.
    pub fn session_storage(&self) -> Option<Arc<dyn Storage>> {
        self.inner
            .session_storage
            .get_or_init(|| {
                let system = self.inner.system.upgrade()?;
                let dir = system.session_dir()?;
                Some(Arc::new(FileStorage::new(dir, &self.inner.name)))
            })
            .clone()
            .map(|storage| storage as Arc<dyn Storage>)
    }

    /// Storage under the instance directory, shared across sessions.
    pub fn instance_storage(&self) -> Option<Arc<dyn Storage>> {
        self.inner
            .instance_storage
            .get_or_init(|| {
                let system = self.inner.system.upgrade()?;
                let dir = system.instance_dir()?;
                Some(Arc::new(FileStorage::new(dir, &self.inner.name)))
            })
            .clone()
            .map(|storage| storage as Arc<dyn Storage>)
    }

    /// Send an event to the client on behalf of this agent. Session events
    /// are not tied to any request.
    pub fn notify(&self, event: AppAgentEvent, message: &str) -> Result<(), DispatchError> {
        let system = self.system()?;
        system.client_io().notify(event, None, message, &self.inner.name);
        Ok(())
    }

    /// Enable or disable the transient sub-agent `sub_agent_name`, which
    /// must be a `"{name}."` child of this agent.
    ///
    /// A request matching the current state returns without taking the
    /// command lock.
    pub async fn toggle_transient_agent(
        &self,
        sub_agent_name: &str,
        enable: bool,
    ) -> Result<(), DispatchError> {
        let name = &self.inner.name;
        let is_child = sub_agent_name
            .strip_prefix(name.as_str())
            .is_some_and(|rest| rest.starts_with('.') && rest.len() > 1);
        if !is_child {
            return Err(DispatchError::InvalidSubAgent {
                agent: name.clone(),
                sub_agent: sub_agent_name.to_string(),
            });
        }

        let system = self.system()?;
        let current = system
            .transient_state(sub_agent_name)?
            .ok_or_else(|| DispatchError::TransientAgentNotFound(sub_agent_name.to_string()))?;
        if current == enable {
            return Ok(());
        }

        system
            .command_lock()
            .run(async {
                system.toggle_transient_locked(sub_agent_name, enable)?;
                system.translator_cache().clear();
                if enable {
                    system.set_last_action_schema_name(Some(sub_agent_name.to_string()));
                } else if system.last_action_schema_name().as_deref() == Some(sub_agent_name) {
                    system.set_last_action_schema_name(Some(name.clone()));
                }
                tracing::info!(schema = sub_agent_name, enable, "transient agent toggled");
                Ok::<(), DispatchError>(())
            })
            .await
    }

    /// Register a new agent at runtime, owned by this agent.
    pub async fn add_dynamic_agent(
        &self,
        agent_name: &str,
        manifest: AppAgentManifest,
        agent: Arc<dyn AppAgent>,
    ) -> Result<(), DispatchError> {
        if !self.inner.allow_dynamic_agent {
            return Err(DispatchError::PermissionDenied(
                "cannot add dynamic agent".to_string(),
            ));
        }
        let system = self.system()?;
        let registration = AgentRegistration::new(agent_name, manifest, agent);
        system
            .command_lock()
            .run(system.insert_agent(registration, Some(self.inner.name.clone())))
            .await
    }

    /// Remove an agent this agent added earlier.
    pub async fn remove_dynamic_agent(&self, agent_name: &str) -> Result<(), DispatchError> {
        if !self.inner.allow_dynamic_agent {
            return Err(DispatchError::PermissionDenied(
                "cannot remove dynamic agent".to_string(),
            ));
        }
        let system = self.system()?;
        system
            .command_lock()
            .run(async { system.remove_agent_locked(agent_name, &self.inner.name) })
            .await
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("name", &self.inner.name)
            .field("allow_dynamic_agent", &self.inner.allow_dynamic_agent)
            .finish_non_exhaustive()
    }
}
