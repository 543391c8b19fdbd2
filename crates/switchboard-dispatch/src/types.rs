//! Core value types for the dispatch core.
//!
//! Defines resolved actions, action results, and the display vocabulary
//! shared with the UI layer.

use std::fmt;

use serde::{Deserialize, Serialize};
use switchboard_core::types::Entity;

// =============================================================================
// Actions
// =============================================================================

/// A resolved, named operation produced by the upstream translator.
///
/// Immutable once constructed; consumed once per execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Schema that produced the action. Its first dot segment names the
    /// owning agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translator_name: Option<String>,
    pub action_name: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl Action {
    pub fn new(translator_name: impl Into<String>, action_name: impl Into<String>) -> Self {
        Self {
            translator_name: Some(translator_name.into()),
            action_name: action_name.into(),
            parameters: serde_json::Value::Null,
        }
    }

    /// An action the translator could not attribute to any schema.
    pub fn unattributed(action_name: impl Into<String>) -> Self {
        Self {
            translator_name: None,
            action_name: action_name.into(),
            parameters: serde_json::Value::Null,
        }
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn translator_name(&self) -> Option<&str> {
        self.translator_name.as_deref()
    }

    /// `"{translator}.{action}"`, or the bare action name without translator.
    pub fn full_action_name(&self) -> String {
        match &self.translator_name {
            Some(translator) => format!("{}.{}", translator, self.action_name),
            None => self.action_name.clone(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_action_name())
    }
}

/// Name of the agent owning a schema: its first dot segment.
pub fn app_agent_name(schema_name: &str) -> &str {
    schema_name.split('.').next().unwrap_or(schema_name)
}

/// An ordered batch of actions. Order is execution order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Actions(Vec<Action>);

impl Actions {
    pub fn new(actions: Vec<Action>) -> Self {
        Self(actions)
    }

    pub fn single(action: Action) -> Self {
        Self(vec![action])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Action> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Action>> for Actions {
    fn from(actions: Vec<Action>) -> Self {
        Self(actions)
    }
}

impl<'a> IntoIterator for &'a Actions {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// =============================================================================
// Display
// =============================================================================

/// Rendering format of display content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayType {
    #[default]
    Text,
    Html,
    Markdown,
    Iframe,
}

/// Semantic kind of a display message, used by the UI for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Status,
    Warning,
    Error,
    Info,
    Success,
}

/// How appended display content combines with what is already shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayAppendMode {
    #[default]
    Inline,
    Block,
    /// Shown until the next display update replaces it.
    Temporary,
}

/// Content shown to the user on behalf of an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayContent {
    pub display_type: DisplayType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
}

impl DisplayContent {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            display_type: DisplayType::Text,
            content: content.into(),
            kind: None,
        }
    }

    pub fn html(content: impl Into<String>) -> Self {
        Self {
            display_type: DisplayType::Html,
            content: content.into(),
            kind: None,
        }
    }

    pub fn markdown(content: impl Into<String>) -> Self {
        Self {
            display_type: DisplayType::Markdown,
            content: content.into(),
            kind: None,
        }
    }

    pub fn status(content: impl Into<String>) -> Self {
        Self::text(content).with_kind(MessageKind::Status)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::text(content).with_kind(MessageKind::Error)
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self::text(content).with_kind(MessageKind::Warning)
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self::text(content).with_kind(MessageKind::Success)
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

impl From<&str> for DisplayContent {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for DisplayContent {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}

// =============================================================================
// Results
// =============================================================================

/// Outcome of one action execution.
///
/// `error` is exclusive with the success fields: when it is set the other
/// fields are ignored by the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_content: Option<DisplayContent>,
    /// Human-readable summary recorded in chat history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal_text: Option<String>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Set by agents that keep refreshing the display after returning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_display_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_display_next_refresh_ms: Option<u64>,
    #[serde(default)]
    pub additional_instructions: Vec<String>,
}

impl ActionResult {
    /// Successful result with `literal_text` shown as plain text.
    pub fn success(literal_text: impl Into<String>) -> Self {
        let text = literal_text.into();
        Self {
            display_content: Some(DisplayContent::text(text.clone())),
            literal_text: Some(text),
            ..Self::default()
        }
    }

    /// Generic success synthesized when an agent returns nothing.
    pub fn completed(full_action_name: &str) -> Self {
        Self::success(format!("Action {} completed.", full_action_name))
    }

    /// Successful result displaying HTML without a literal summary.
    pub fn from_html(html: impl Into<String>) -> Self {
        Self {
            display_content: Some(DisplayContent::html(html)),
            ..Self::default()
        }
    }

    /// Recoverable failure reported by an agent.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_entities(mut self, entities: Vec<Entity>) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_dynamic_display(mut self, id: impl Into<String>, next_refresh_ms: u64) -> Self {
        self.dynamic_display_id = Some(id.into());
        self.dynamic_display_next_refresh_ms = Some(next_refresh_ms);
        self
    }

    pub fn with_additional_instructions(mut self, instructions: Vec<String>) -> Self {
        self.additional_instructions = instructions;
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
