//! Static description of an agent and its schemas.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Manifest an agent registers with.
///
/// Sub-agents contribute additional schemas named `"{agent}.{sub}"`.
/// Transient sub-agents start disabled and are toggled at runtime by their
/// parent through `SessionContext::toggle_transient_agent`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppAgentManifest {
    pub emoji_char: String,
    pub description: String,
    /// Actions whose parameters are streamed before the final call.
    #[serde(default)]
    pub streaming_actions: Vec<String>,
    #[serde(default)]
    pub transient: bool,
    #[serde(default)]
    pub sub_agents: BTreeMap<String, AppAgentManifest>,
}

impl AppAgentManifest {
    pub fn new(emoji_char: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            emoji_char: emoji_char.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_streaming_actions(mut self, actions: &[&str]) -> Self {
        self.streaming_actions = actions.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_sub_agent(mut self, name: impl Into<String>, manifest: AppAgentManifest) -> Self {
        self.sub_agents.insert(name.into(), manifest);
        self
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    /// Every schema this manifest contributes, keyed by full schema name.
    /// The agent's own schema comes first.
    pub fn schemas(&self, agent_name: &str) -> Vec<(String, &AppAgentManifest)> {
        let mut schemas = vec![(agent_name.to_string(), self)];
        for (sub_name, sub) in &self.sub_agents {
            schemas.extend(sub.schemas(&format!("{}.{}", agent_name, sub_name)));
        }
        schemas
    }

    /// Whether any schema of this manifest declares streaming actions.
    pub fn declares_streaming(&self) -> bool {
        !self.streaming_actions.is_empty()
            || self.sub_agents.values().any(AppAgentManifest::declares_streaming)
    }
}
