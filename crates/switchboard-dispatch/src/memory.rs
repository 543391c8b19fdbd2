//! Bridge from action results to long-term conversation memory.
//!
//! Results are handed to a bounded queue and the action completes as soon
//! as the write is queued. The consumer owns ingestion; a full or closed
//! queue drops the write with a warning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use switchboard_core::config::MemoryConfig;
use switchboard_core::types::Entity;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// A pending memory write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryWrite {
    pub text: String,
    pub knowledge: Vec<Entity>,
    pub timestamp: DateTime<Utc>,
    /// Urgent writes are ingested ahead of the backlog by consumers that
    /// support it. The dispatcher only queues non-urgent writes.
    pub urgent: bool,
}

/// Producer side of the memory queue.
#[derive(Debug, Clone)]
pub struct MemoryBridge {
    tx: mpsc::Sender<MemoryWrite>,
    memorized_kinds: Vec<String>,
}

impl MemoryBridge {
    pub fn channel(
        capacity: usize,
        memorized_kinds: Vec<String>,
    ) -> (Self, mpsc::Receiver<MemoryWrite>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                memorized_kinds,
            },
            rx,
        )
    }

    /// Build a bridge from configuration. `None` when memory is disabled.
    pub fn from_config(config: &MemoryConfig) -> Option<(Self, mpsc::Receiver<MemoryWrite>)> {
        config.enabled.then(|| {
            Self::channel(
                config.queue_capacity,
                config.memorized_entity_kinds.clone(),
            )
        })
    }

    /// Whether the entity is of a kind long-term memory already tracks.
    pub fn is_memorized(&self, entity: &Entity) -> bool {
        entity.has_any_kind(&self.memorized_kinds)
    }

    /// Queue `text` with the entities memory does not already hold.
    ///
    /// Returns `true` when a write was queued. Nothing is queued when every
    /// entity is already memorized.
    pub fn add_to_conversation_memory(&self, text: &str, entities: &[Entity]) -> bool {
        let knowledge: Vec<Entity> = entities
            .iter()
            .filter(|entity| !self.is_memorized(entity))
            .cloned()
            .collect();
        if knowledge.is_empty() {
            return false;
        }

        let write = MemoryWrite {
            text: text.to_string(),
            knowledge,
            timestamp: Utc::now(),
            urgent: false,
        };
        match self.tx.try_send(write) {
            Ok(()) => {
                debug!(text_len = text.len(), "queued conversation memory write");
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!("conversation memory queue full, dropping write");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("conversation memory consumer gone, dropping write");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge(capacity: usize) -> (MemoryBridge, mpsc::Receiver<MemoryWrite>) {
        MemoryBridge::channel(capacity, vec!["person".to_string(), "city".to_string()])
    }

    #[test]
    fn test_memorized_entities_filtered() {
        let (bridge, mut rx) = bridge(4);
        let entities = vec![
            Entity::new("Ada Lovelace", &["person"]),
            Entity::new("Dune", &["book"]),
            Entity::new("Paris", &["city", "place"]),
        ];

        assert!(bridge.add_to_conversation_memory("Found Dune", &entities));
        let write = rx.try_recv().unwrap();
        assert_eq!(write.text, "Found Dune");
        assert_eq!(write.knowledge, vec![Entity::new("Dune", &["book"])]);
        assert!(!write.urgent);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_nothing_queued_when_all_memorized() {
        let (bridge, mut rx) = bridge(4);
        let entities = vec![Entity::new("Ada Lovelace", &["person"])];
        assert!(!bridge.add_to_conversation_memory("Hi Ada", &entities));
        assert!(!bridge.add_to_conversation_memory("No entities", &[]));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_queue_drops_write() {
        let (bridge, _rx) = bridge(1);
        let entities = vec![Entity::new("Dune", &["book"])];
        assert!(bridge.add_to_conversation_memory("first", &entities));
        assert!(!bridge.add_to_conversation_memory("second", &entities));
    }

    #[test]
    fn test_closed_queue_drops_write() {
        let (bridge, rx) = bridge(1);
        drop(rx);
        let entities = vec![Entity::new("Dune", &["book"])];
        assert!(!bridge.add_to_conversation_memory("first", &entities));
    }

    #[test]
    fn test_from_config_disabled() {
        let config = MemoryConfig {
            enabled: false,
            ..MemoryConfig::default()
        };
        assert!(MemoryBridge::from_config(&config).is_none());
        assert!(MemoryBridge::from_config(&MemoryConfig::default()).is_some());
    }
}
