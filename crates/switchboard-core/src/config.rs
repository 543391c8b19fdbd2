use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SwitchboardError};

/// Top-level configuration for a Switchboard host.
///
/// Each section corresponds to one concern of the dispatcher. Every section
/// is optional in the TOML file and falls back to its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitchboardConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl SwitchboardConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SwitchboardConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SwitchboardError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General host settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level used when `RUST_LOG` is unset: trace, debug, info, warn, error.
    pub log_level: String,
    /// Directory shared by every session of this host instance. Agents get
    /// instance storage only when this is set.
    pub instance_dir: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            instance_dir: None,
        }
    }
}

/// Per-session settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory of the running session. Agents get session storage only
    /// when this is set.
    pub session_dir: Option<PathBuf>,
}

/// Agent enablement and permissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// Whether schemas without an explicit entry are enabled.
    pub default_enabled: bool,
    /// Explicit enablement per schema name (`"player"`, `"player.spotify"`).
    pub schemas: HashMap<String, bool>,
    /// Agents allowed to add and remove dynamic agents.
    pub allow_dynamic: Vec<String>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            default_enabled: true,
            schemas: HashMap::new(),
            allow_dynamic: Vec::new(),
        }
    }
}

impl AgentsConfig {
    /// Resolve the configured enablement of a schema.
    ///
    /// An explicit entry for the schema wins, then the entry of its owning
    /// agent (the first dot segment), then `default_enabled`.
    pub fn is_schema_enabled(&self, schema_name: &str) -> bool {
        if let Some(enabled) = self.schemas.get(schema_name) {
            return *enabled;
        }
        let agent_name = schema_name.split('.').next().unwrap_or(schema_name);
        self.schemas
            .get(agent_name)
            .copied()
            .unwrap_or(self.default_enabled)
    }

    /// Whether the named agent may register dynamic agents.
    pub fn allows_dynamic_agent(&self, agent_name: &str) -> bool {
        self.allow_dynamic.iter().any(|name| name == agent_name)
    }
}

/// Long-term conversation memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Forward action results to conversation memory.
    pub enabled: bool,
    /// Capacity of the memory write queue. Writes beyond it are dropped.
    pub queue_capacity: usize,
    /// Entity kinds already held in long-term memory; never re-ingested.
    pub memorized_entity_kinds: Vec<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_capacity: 64,
            memorized_entity_kinds: [
                "person", "book", "movie", "song", "album", "artist", "city", "country",
            ]
            .iter()
            .map(|kind| kind.to_string())
            .collect(),
        }
    }
}

/// Action dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Emit an "Executing action" status line before each action.
    pub show_action_status: bool,
    /// Refresh interval for dynamic displays that do not specify one.
    pub default_refresh_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            show_action_status: true,
            default_refresh_ms: 1000,
        }
    }
}
