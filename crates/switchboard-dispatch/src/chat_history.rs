//! Append-only conversation log.

use serde::{Deserialize, Serialize};
use switchboard_core::types::{Entity, RequestId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One message in the chat history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatHistoryEntry {
    pub text: String,
    pub entities: Vec<Entity>,
    pub role: ChatRole,
    pub request_id: Option<RequestId>,
    pub timestamp: Timestamp,
    /// Extra guidance for the translator on later turns.
    pub additional_instructions: Vec<String>,
}

impl ChatHistoryEntry {
    pub fn new(text: impl Into<String>, role: ChatRole, request_id: Option<RequestId>) -> Self {
        Self {
            text: text.into(),
            entities: Vec::new(),
            role,
            request_id,
            timestamp: Timestamp::now(),
            additional_instructions: Vec::new(),
        }
    }

    pub fn user(text: impl Into<String>, request_id: Option<RequestId>) -> Self {
        Self::new(text, ChatRole::User, request_id)
    }

    pub fn assistant(text: impl Into<String>, request_id: Option<RequestId>) -> Self {
        Self::new(text, ChatRole::Assistant, request_id)
    }

    pub fn with_entities(mut self, entities: Vec<Entity>) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_additional_instructions(mut self, instructions: Vec<String>) -> Self {
        self.additional_instructions = instructions;
        self
    }
}

/// Chat history in execution order. Entries are never modified once added.
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    entries: Vec<ChatHistoryEntry>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, entry: ChatHistoryEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ChatHistoryEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&ChatHistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries_for_request<'a>(
        &'a self,
        request_id: &'a RequestId,
    ) -> impl Iterator<Item = &'a ChatHistoryEntry> + 'a {
        self.entries
            .iter()
            .filter(move |entry| entry.request_id.as_ref() == Some(request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_keep_append_order() {
        let mut history = ChatHistory::new();
        history.add_entry(ChatHistoryEntry::user("add milk", Some(RequestId::from("r1"))));
        history.add_entry(ChatHistoryEntry::assistant("Added milk.", Some(RequestId::from("r1"))));
        history.add_entry(ChatHistoryEntry::assistant("Done.", None));

        let texts: Vec<&str> = history.entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["add milk", "Added milk.", "Done."]);
        assert_eq!(history.last().unwrap().role, ChatRole::Assistant);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_entries_for_request() {
        let mut history = ChatHistory::new();
        let r1 = RequestId::from("r1");
        history.add_entry(ChatHistoryEntry::assistant("a", Some(r1.clone())));
        history.add_entry(ChatHistoryEntry::assistant("b", Some(RequestId::from("r2"))));
        history.add_entry(ChatHistoryEntry::assistant("c", Some(r1.clone())));

        let texts: Vec<&str> = history
            .entries_for_request(&r1)
            .map(|e| e.text.as_str())
            .collect();
        assert_eq!(texts, vec!["a", "c"]);
    }

    #[test]
    fn test_entry_builders() {
        let entry = ChatHistoryEntry::assistant("Found 2 books.", None)
            .with_entities(vec![Entity::new("Dune", &["book"])])
            .with_additional_instructions(vec!["Prefer paperback".to_string()]);
        assert_eq!(entry.entities.len(), 1);
        assert_eq!(entry.additional_instructions, vec!["Prefer paperback"]);
        assert!(ChatHistory::new().is_empty());
    }
}
