//! Agent registry.
//!
//! Holds every registered agent with its session context,
//! indexes the schemas they contribute, and tracks which schemas are
//! enabled. The registry itself is not synchronized; the system context
//! guards it and serializes mutations behind the command lock.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use switchboard_core::config::AgentsConfig;

use crate::agent::{AppAgent, AppAgentManifest};
use crate::context::SessionContext;
use crate::error::DispatchError;

struct AgentRecord {
    agent: Arc<dyn AppAgent>,
    session_context: SessionContext,
    /// Agent that added this one at runtime. `None` for static agents.
    added_by: Option<String>,
}

/// Per-schema view derived from the owning agent's manifest.
#[derive(Debug, Clone)]
struct SchemaEntry {
    agent_name: String,
    emoji_char: String,
    streaming_actions: Vec<String>,
    transient: bool,
}

/// Registry of agents keyed by agent name.
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<String, AgentRecord>,
    schemas: BTreeMap<String, SchemaEntry>,
    transient_state: HashMap<String, bool>,
    enabled: HashSet<String>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `name` and every schema of `manifest` are free to claim.
    ///
    /// Agent names are a single segment; dotted names belong to sub-agent
    /// schemas and are never routed to an agent.
    pub fn check_available(&self, name: &str, manifest: &AppAgentManifest) -> Result<(), DispatchError> {
        if name.is_empty() || name.contains('.') {
            return Err(DispatchError::InvalidAgentName(name.to_string()));
        }
        if self.agents.contains_key(name) {
            return Err(DispatchError::AgentAlreadyRegistered(name.to_string()));
        }
        if let Some((schema_name, _)) = manifest
            .schemas(name)
            .into_iter()
            .find(|(schema_name, _)| self.schemas.contains_key(schema_name))
        {
            return Err(DispatchError::AgentAlreadyRegistered(schema_name));
        }
        Ok(())
    }

    /// Register an agent and index its schemas. Transient sub-agents start
    /// disabled. Enablement is not refreshed here; call `set_state`.
    pub fn add_agent(
        &mut self,
        name: &str,
        manifest: AppAgentManifest,
        agent: Arc<dyn AppAgent>,
        session_context: SessionContext,
        added_by: Option<String>,
    ) -> Result<(), DispatchError> {
        self.check_available(name, &manifest)?;

        for (schema_name, schema) in manifest.schemas(name) {
            if schema.transient {
                self.transient_state.insert(schema_name.clone(), false);
            }
            self.schemas.insert(
                schema_name,
                SchemaEntry {
                    agent_name: name.to_string(),
                    emoji_char: schema.emoji_char.clone(),
                    streaming_actions: schema.streaming_actions.clone(),
                    transient: schema.transient,
                },
            );
        }

        self.agents.insert(
            name.to_string(),
            AgentRecord {
                agent,
                session_context,
                added_by,
            },
        );
        Ok(())
    }

    /// Remove an agent previously added at runtime by `requested_by`.
    pub fn remove_dynamic_agent(
        &mut self,
        name: &str,
        requested_by: &str,
    ) -> Result<(), DispatchError> {
        let record = self
            .agents
            .get(name)
            .ok_or_else(|| DispatchError::AgentNotFound(name.to_string()))?;
        match record.added_by.as_deref() {
            None => return Err(DispatchError::NotDynamicAgent(name.to_string())),
            Some(owner) if owner != requested_by => {
                return Err(DispatchError::PermissionDenied(format!(
                    "agent {} was not added by {}",
                    name, requested_by
                )))
            }
            Some(_) => {}
        }

        self.agents.remove(name);
        let removed: Vec<String> = self
            .schemas
            .iter()
            .filter(|(_, entry)| entry.agent_name == name)
            .map(|(schema_name, _)| schema_name.clone())
            .collect();
        for schema_name in removed {
            self.schemas.remove(&schema_name);
            self.transient_state.remove(&schema_name);
            self.enabled.remove(&schema_name);
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn get_app_agent(&self, name: &str) -> Result<Arc<dyn AppAgent>, DispatchError> {
        self.agents
            .get(name)
            .map(|record| Arc::clone(&record.agent))
            .ok_or_else(|| DispatchError::AgentNotFound(name.to_string()))
    }

    pub fn get_session_context(&self, name: &str) -> Result<SessionContext, DispatchError> {
        self.agents
            .get(name)
            .map(|record| record.session_context.clone())
            .ok_or_else(|| DispatchError::AgentNotFound(name.to_string()))
    }

    /// Emoji shown in front of status lines for a schema.
    pub fn emoji_char(&self, schema_name: &str) -> Option<&str> {
        self.schemas
            .get(schema_name)
            .map(|entry| entry.emoji_char.as_str())
    }

    /// `None` when the schema is not a transient sub-agent.
    pub fn get_transient_state(&self, schema_name: &str) -> Option<bool> {
        self.transient_state.get(schema_name).copied()
    }

    pub fn toggle_transient(&mut self, schema_name: &str, enable: bool) -> Result<(), DispatchError> {
        let state = self
            .transient_state
            .get_mut(schema_name)
            .ok_or_else(|| DispatchError::TransientAgentNotFound(schema_name.to_string()))?;
        *state = enable;
        if enable {
            self.enabled.insert(schema_name.to_string());
        } else {
            self.enabled.remove(schema_name);
        }
        Ok(())
    }

    /// Recompute schema enablement from configuration. Transient schemas
    /// follow their toggled state instead.
    pub fn set_state(&mut self, config: &AgentsConfig) {
        self.enabled = self
            .schemas
            .iter()
            .filter(|(schema_name, entry)| {
                if entry.transient {
                    self.transient_state
                        .get(schema_name.as_str())
                        .copied()
                        .unwrap_or(false)
                } else {
                    config.is_schema_enabled(schema_name)
                }
            })
            .map(|(schema_name, _)| schema_name.clone())
            .collect();
    }

    pub fn is_schema_enabled(&self, schema_name: &str) -> bool {
        self.enabled.contains(schema_name)
    }

    pub fn is_streaming_action(&self, schema_name: &str, action_name: &str) -> bool {
        self.schemas
            .get(schema_name)
            .is_some_and(|entry| entry.streaming_actions.iter().any(|a| a == action_name))
    }

    /// Registered agent names, sorted.
    pub fn agent_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.keys().cloned().collect();
        names.sort();
        names
    }

    /// Known schema names, sorted.
    pub fn schema_names(&self) -> Vec<String> {
        self.schemas.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_io::ChannelClientIO;
    use crate::context::CommandHandlerContext;

    struct NoopAgent;

    impl AppAgent for NoopAgent {}

    fn session(name: &str) -> SessionContext {
        let (io, _rx) = ChannelClientIO::new();
        let system = CommandHandlerContext::builder(Arc::new(io)).build();
        SessionContext::build(name, Arc::new(()), &system, false)
    }

    fn player_manifest() -> AppAgentManifest {
        AppAgentManifest::new("🎧", "Music player")
            .with_streaming_actions(&["play"])
            .with_sub_agent("queue", AppAgentManifest::new("📜", "Queue").transient())
    }

    fn registry_with_player() -> AgentRegistry {
        let mut registry = AgentRegistry::new();
        registry
            .add_agent(
                "player",
                player_manifest(),
                Arc::new(NoopAgent),
                session("player"),
                None,
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_add_agent_indexes_schemas() {
        let registry = registry_with_player();
        assert_eq!(registry.schema_names(), vec!["player", "player.queue"]);
        assert_eq!(registry.emoji_char("player.queue"), Some("📜"));
        assert!(registry.get_app_agent("player").is_ok());
    }

    #[test]
    fn test_duplicate_agent_rejected() {
        let mut registry = registry_with_player();
        let err = registry
            .add_agent(
                "player",
                AppAgentManifest::default(),
                Arc::new(NoopAgent),
                session("player"),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, DispatchError::AgentAlreadyRegistered(_)));
    }

    #[test]
    fn test_dotted_agent_name_rejected() {
        let mut registry = registry_with_player();
        let err = registry
            .add_agent(
                "player.queue",
                AppAgentManifest::new("🧪", "Impostor"),
                Arc::new(NoopAgent),
                session("player.queue"),
                Some("browser".to_string()),
            )
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidAgentName(_)));
        assert!(!registry.contains("player.queue"));
        assert_eq!(registry.emoji_char("player.queue"), Some("📜"));
        assert_eq!(registry.get_transient_state("player.queue"), Some(false));
    }

    #[test]
    fn test_unknown_agent_lookup() {
        let registry = AgentRegistry::new();
        assert!(matches!(
            registry.get_app_agent("ghost"),
            Err(DispatchError::AgentNotFound(_))
        ));
        assert!(matches!(
            registry.get_session_context("ghost"),
            Err(DispatchError::AgentNotFound(_))
        ));
    }

    #[test]
    fn test_set_state_respects_config_and_transient() {
        let mut registry = registry_with_player();
        registry.set_state(&AgentsConfig::default());
        assert!(registry.is_schema_enabled("player"));
        // Transient schemas start disabled regardless of config.
        assert!(!registry.is_schema_enabled("player.queue"));

        registry.toggle_transient("player.queue", true).unwrap();
        assert!(registry.is_schema_enabled("player.queue"));
        registry.set_state(&AgentsConfig::default());
        assert!(registry.is_schema_enabled("player.queue"));

        let mut config = AgentsConfig::default();
        config.schemas.insert("player".to_string(), false);
        registry.set_state(&config);
        assert!(!registry.is_schema_enabled("player"));
    }

    #[test]
    fn test_toggle_unknown_transient() {
        let mut registry = registry_with_player();
        let err = registry.toggle_transient("player", true).unwrap_err();
        assert!(matches!(err, DispatchError::TransientAgentNotFound(_)));
        assert_eq!(registry.get_transient_state("player"), None);
        assert_eq!(registry.get_transient_state("player.queue"), Some(false));
    }

    #[test]
    fn test_streaming_action_lookup() {
        let registry = registry_with_player();
        assert!(registry.is_streaming_action("player", "play"));
        assert!(!registry.is_streaming_action("player", "pause"));
        assert!(!registry.is_streaming_action("player.queue", "play"));
    }

    #[test]
    fn test_remove_dynamic_agent_ownership() {
        let mut registry = registry_with_player();
        registry
            .add_agent(
                "scratch",
                AppAgentManifest::new("🧪", "Scratch"),
                Arc::new(NoopAgent),
                session("scratch"),
                Some("browser".to_string()),
            )
            .unwrap();
        assert_eq!(registry.agent_names(), vec!["player", "scratch"]);

        let err = registry.remove_dynamic_agent("scratch", "player").unwrap_err();
        assert!(matches!(err, DispatchError::PermissionDenied(_)));
        assert!(registry.contains("scratch"));

        registry.remove_dynamic_agent("scratch", "browser").unwrap();
        assert!(!registry.contains("scratch"));
        assert_eq!(registry.schema_names(), vec!["player", "player.queue"]);
    }

    #[test]
    fn test_remove_static_agent_rejected() {
        let mut registry = registry_with_player();
        let err = registry.remove_dynamic_agent("player", "player").unwrap_err();
        assert!(matches!(err, DispatchError::NotDynamicAgent(_)));
        let err = registry.remove_dynamic_agent("ghost", "player").unwrap_err();
        assert!(matches!(err, DispatchError::AgentNotFound(_)));
    }
}
