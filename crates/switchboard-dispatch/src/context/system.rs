//! Process-wide command handler context.
//!
//! One `CommandHandlerContext` exists per running session. It owns the
//! agent registry, chat history, the pending streaming context, the
//! profiler, the command lock, and the "last action" bookkeeping.
//! Executors and session contexts only reference it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use switchboard_core::config::{AgentsConfig, DispatchConfig, SwitchboardConfig};
use switchboard_core::types::RequestId;
use tracing::{debug, info, warn};

use crate::agent::{AgentRegistry, AppAgent, AppAgentManifest};
use crate::chat_history::{ChatHistory, ChatHistoryEntry};
use crate::client_io::ClientIO;
use crate::context::{ScopedActionContext, SessionContext};
use crate::error::DispatchError;
use crate::lock::CommandLock;
use crate::memory::MemoryBridge;
use crate::profiler::Profiler;
use crate::translator_cache::TranslatorCache;

/// An agent to be registered with the system context.
pub struct AgentRegistration {
    pub name: String,
    pub manifest: AppAgentManifest,
    pub agent: Arc<dyn AppAgent>,
    pub allow_dynamic_agent: bool,
}

impl AgentRegistration {
    pub fn new(name: impl Into<String>, manifest: AppAgentManifest, agent: Arc<dyn AppAgent>) -> Self {
        Self {
            name: name.into(),
            manifest,
            agent,
            allow_dynamic_agent: false,
        }
    }

    /// Allow the agent to add and remove agents at runtime.
    pub fn allow_dynamic_agent(mut self, allow: bool) -> Self {
        self.allow_dynamic_agent = allow;
        self
    }
}

#[derive(Debug, Default)]
struct TurnState {
    request_id: Option<RequestId>,
    last_action_schema_name: Option<String>,
    last_action_name: Option<String>,
}

/// Builder for [`CommandHandlerContext`].
pub struct CommandHandlerContextBuilder {
    client_io: Arc<dyn ClientIO>,
    config: SwitchboardConfig,
    memory: Option<MemoryBridge>,
}

impl CommandHandlerContextBuilder {
    /// Take agent, dispatch and directory settings from `config`.
    pub fn config(mut self, config: &SwitchboardConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Forward successful results to long-term memory through `memory`.
    pub fn memory(mut self, memory: MemoryBridge) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn build(self) -> Arc<CommandHandlerContext> {
        let SwitchboardConfig {
            general,
            session,
            agents,
            dispatch,
            ..
        } = self.config;
        Arc::new_cyclic(|weak_self| CommandHandlerContext {
            weak_self: weak_self.clone(),
            agents: RwLock::new(AgentRegistry::new()),
            agents_config: RwLock::new(agents),
            dispatch_config: dispatch,
            chat_history: Mutex::new(ChatHistory::new()),
            client_io: self.client_io,
            command_lock: CommandLock::new(),
            translator_cache: TranslatorCache::new(),
            profiler: Profiler::new(),
            memory: self.memory,
            session_dir: session.session_dir,
            instance_dir: general.instance_dir,
            turn: Mutex::new(TurnState::default()),
            streaming_action_context: Mutex::new(None),
            live_contexts: Arc::new(AtomicUsize::new(0)),
        })
    }
}

/// Shared state of one running session.
pub struct CommandHandlerContext {
    weak_self: Weak<CommandHandlerContext>,
    agents: RwLock<AgentRegistry>,
    agents_config: RwLock<AgentsConfig>,
    dispatch_config: DispatchConfig,
    chat_history: Mutex<ChatHistory>,
    client_io: Arc<dyn ClientIO>,
    command_lock: CommandLock,
    translator_cache: TranslatorCache,
    profiler: Profiler,
    memory: Option<MemoryBridge>,
    session_dir: Option<PathBuf>,
    instance_dir: Option<PathBuf>,
    turn: Mutex<TurnState>,
    streaming_action_context: Mutex<Option<ScopedActionContext>>,
    live_contexts: Arc<AtomicUsize>,
}

impl CommandHandlerContext {
    pub fn builder(client_io: Arc<dyn ClientIO>) -> CommandHandlerContextBuilder {
        CommandHandlerContextBuilder {
            client_io,
            config: SwitchboardConfig::default(),
            memory: None,
        }
    }

    // -------------------------------------------------------------------------
    // Registry
    // -------------------------------------------------------------------------

    /// Register a static agent. Takes the command lock.
    pub async fn register_agent(&self, registration: AgentRegistration) -> Result<(), DispatchError> {
        self.command_lock
            .run(self.insert_agent(registration, None))
            .await
    }

    /// Add an agent to the registry. The caller holds the command lock.
    pub(crate) async fn insert_agent(
        &self,
        registration: AgentRegistration,
        added_by: Option<String>,
    ) -> Result<(), DispatchError> {
        let AgentRegistration {
            name,
            manifest,
            agent,
            allow_dynamic_agent,
        } = registration;

        self.read_agents()?.check_available(&name, &manifest)?;

        if manifest.declares_streaming() && agent.as_streaming_executor().is_none() {
            warn!(agent = %name, "manifest declares streaming actions but agent cannot stream");
        }

        let agent_context = agent.initialize_agent_context().await?;
        let agents_config = self.agents_config()?;
        let allow_dynamic_agent =
            allow_dynamic_agent || agents_config.allows_dynamic_agent(&name);
        let session = SessionContext::new(
            &name,
            agent_context,
            self.weak_self.clone(),
            allow_dynamic_agent,
        );

        let mut agents = self.write_agents()?;
        agents.add_agent(&name, manifest, agent, session, added_by.clone())?;
        agents.set_state(&agents_config);
        info!(
            agent = %name,
            added_by = added_by.as_deref().unwrap_or("-"),
            allow_dynamic_agent,
            "agent registered"
        );
        Ok(())
    }

    /// Remove a dynamic agent. The caller holds the command lock.
    pub(crate) fn remove_agent_locked(&self, name: &str, requested_by: &str) -> Result<(), DispatchError> {
        let agents_config = self.agents_config()?;
        let mut agents = self.write_agents()?;
        agents.remove_dynamic_agent(name, requested_by)?;
        agents.set_state(&agents_config);
        info!(agent = name, removed_by = requested_by, "agent removed");
        Ok(())
    }

    /// Flip a transient schema. The caller holds the command lock.
    pub(crate) fn toggle_transient_locked(&self, schema_name: &str, enable: bool) -> Result<(), DispatchError> {
        self.write_agents()?.toggle_transient(schema_name, enable)
    }

    /// Replace the agent configuration and refresh schema enablement.
    pub async fn update_agents_config(&self, config: AgentsConfig) -> Result<(), DispatchError> {
        self.command_lock
            .run(async move {
                let mut agents = self.write_agents()?;
                agents.set_state(&config);
                drop(agents);
                *self.agents_config.write().map_err(DispatchError::poisoned)? = config;
                Ok::<(), DispatchError>(())
            })
            .await
    }

    pub fn get_app_agent(&self, name: &str) -> Result<Arc<dyn AppAgent>, DispatchError> {
        self.read_agents()?.get_app_agent(name)
    }

    pub fn get_session_context(&self, name: &str) -> Result<SessionContext, DispatchError> {
        self.read_agents()?.get_session_context(name)
    }

    pub fn is_schema_enabled(&self, schema_name: &str) -> Result<bool, DispatchError> {
        Ok(self.read_agents()?.is_schema_enabled(schema_name))
    }

    /// `None` when the schema is not a transient sub-agent.
    pub fn transient_state(&self, schema_name: &str) -> Result<Option<bool>, DispatchError> {
        Ok(self.read_agents()?.get_transient_state(schema_name))
    }

    pub fn is_streaming_action(&self, schema_name: &str, action_name: &str) -> Result<bool, DispatchError> {
        Ok(self.read_agents()?.is_streaming_action(schema_name, action_name))
    }

    pub fn emoji_char(&self, schema_name: &str) -> Result<Option<String>, DispatchError> {
        Ok(self.read_agents()?.emoji_char(schema_name).map(str::to_string))
    }

    pub fn agent_names(&self) -> Result<Vec<String>, DispatchError> {
        Ok(self.read_agents()?.agent_names())
    }

    fn read_agents(&self) -> Result<std::sync::RwLockReadGuard<'_, AgentRegistry>, DispatchError> {
        self.agents.read().map_err(DispatchError::poisoned)
    }

    fn write_agents(&self) -> Result<std::sync::RwLockWriteGuard<'_, AgentRegistry>, DispatchError> {
        self.agents.write().map_err(DispatchError::poisoned)
    }

    fn agents_config(&self) -> Result<AgentsConfig, DispatchError> {
        Ok(self
            .agents_config
            .read()
            .map_err(DispatchError::poisoned)?
            .clone())
    }

    // -------------------------------------------------------------------------
    // Chat history
    // -------------------------------------------------------------------------

    pub fn add_chat_entry(&self, entry: ChatHistoryEntry) {
        self.chat_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add_entry(entry);
    }

    pub fn chat_history(&self) -> ChatHistory {
        self.chat_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // -------------------------------------------------------------------------
    // Turn bookkeeping
    // -------------------------------------------------------------------------

    fn turn(&self) -> std::sync::MutexGuard<'_, TurnState> {
        self.turn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin a request. Display output of this turn is tagged with `request_id`.
    pub fn start_request(&self, request_id: RequestId) {
        debug!(request_id = %request_id, "request started");
        self.turn().request_id = Some(request_id);
    }

    pub fn end_request(&self) {
        self.turn().request_id = None;
    }

    pub fn request_id(&self) -> Option<RequestId> {
        self.turn().request_id.clone()
    }

    pub(crate) fn current_request_id(&self) -> Result<RequestId, DispatchError> {
        self.request_id().ok_or(DispatchError::NoActiveRequest)
    }

    pub fn last_action_schema_name(&self) -> Option<String> {
        self.turn().last_action_schema_name.clone()
    }

    pub fn set_last_action_schema_name(&self, schema_name: Option<String>) {
        self.turn().last_action_schema_name = schema_name;
    }

    pub fn last_action_name(&self) -> Option<String> {
        self.turn().last_action_name.clone()
    }

    pub fn set_last_action_name(&self, action_name: Option<String>) {
        self.turn().last_action_name = action_name;
    }

    pub(crate) fn set_last_action(&self, schema_name: &str, full_action_name: &str) {
        let mut turn = self.turn();
        turn.last_action_schema_name = Some(schema_name.to_string());
        turn.last_action_name = Some(full_action_name.to_string());
    }

    // -------------------------------------------------------------------------
    // Streaming slot
    // -------------------------------------------------------------------------

    fn streaming_slot(&self) -> std::sync::MutexGuard<'_, Option<ScopedActionContext>> {
        self.streaming_action_context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn has_pending_streaming_context(&self) -> bool {
        self.streaming_slot().is_some()
    }

    pub(crate) fn take_streaming_context(&self) -> Option<ScopedActionContext> {
        self.streaming_slot().take()
    }

    /// Store `context` as the pending streaming context, returning the one
    /// it replaces.
    pub(crate) fn replace_streaming_context(
        &self,
        context: ScopedActionContext,
    ) -> Option<ScopedActionContext> {
        self.streaming_slot().replace(context)
    }

    /// Close a pending streaming context that no action consumed.
    pub fn close_pending_streaming_context(&self) {
        let pending = self.take_streaming_context();
        if let Some(pending) = pending {
            debug!(agent = pending.agent_name(), "closing unconsumed streaming context");
            pending.close();
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn client_io(&self) -> Arc<dyn ClientIO> {
        Arc::clone(&self.client_io)
    }

    pub fn command_lock(&self) -> &CommandLock {
        &self.command_lock
    }

    pub fn translator_cache(&self) -> &TranslatorCache {
        &self.translator_cache
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    pub fn memory(&self) -> Option<&MemoryBridge> {
        self.memory.as_ref()
    }

    pub fn dispatch_config(&self) -> &DispatchConfig {
        &self.dispatch_config
    }

    pub fn session_dir(&self) -> Option<&Path> {
        self.session_dir.as_deref()
    }

    pub fn instance_dir(&self) -> Option<&Path> {
        self.instance_dir.as_deref()
    }

    /// Scoped action contexts opened and not yet closed.
    pub fn live_action_contexts(&self) -> usize {
        self.live_contexts.load(Ordering::SeqCst)
    }

    pub(crate) fn live_context_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.live_contexts)
    }
}
