//! Display sink shared with the UI layer.

use serde::Serialize;
use switchboard_core::events::AppAgentEvent;
use switchboard_core::types::RequestId;
use tokio::sync::mpsc;

use crate::types::{DisplayAppendMode, DisplayContent};

/// Display content tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IoMessage {
    pub content: DisplayContent,
    pub request_id: RequestId,
    /// Agent (or schema) that produced the content.
    pub source: String,
    /// Position of the action within its batch, when produced by an action.
    pub action_index: Option<usize>,
}

/// Host-side receiver of everything the dispatcher and agents show.
pub trait ClientIO: Send + Sync {
    /// Replace the display of the message's request and action.
    fn set_display(&self, message: IoMessage);

    fn append_display(&self, message: IoMessage, mode: DisplayAppendMode);

    /// Out-of-band signal for client-side effects.
    fn take_action(&self, action: &str, data: serde_json::Value);

    fn notify(
        &self,
        event: AppAgentEvent,
        request_id: Option<&RequestId>,
        message: &str,
        source: &str,
    );

    /// Ask the client to poll `source` for `display_id` until told to stop.
    fn set_dynamic_display(
        &self,
        source: &str,
        request_id: &RequestId,
        action_index: usize,
        display_id: &str,
        next_refresh_ms: u64,
    );
}

/// One `ClientIO` call, as forwarded by `ChannelClientIO`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientIOEvent {
    SetDisplay(IoMessage),
    AppendDisplay {
        message: IoMessage,
        mode: DisplayAppendMode,
    },
    TakeAction {
        action: String,
        data: serde_json::Value,
    },
    Notify {
        event: AppAgentEvent,
        request_id: Option<RequestId>,
        message: String,
        source: String,
    },
    SetDynamicDisplay {
        source: String,
        request_id: RequestId,
        action_index: usize,
        display_id: String,
        next_refresh_ms: u64,
    },
}

/// `ClientIO` that forwards every call onto an unbounded channel.
#[derive(Clone)]
pub struct ChannelClientIO {
    tx: mpsc::UnboundedSender<ClientIOEvent>,
}

impl ChannelClientIO {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientIOEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: ClientIOEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("client io receiver dropped, discarding event");
        }
    }
}

impl ClientIO for ChannelClientIO {
    fn set_display(&self, message: IoMessage) {
        self.send(ClientIOEvent::SetDisplay(message));
    }

    fn append_display(&self, message: IoMessage, mode: DisplayAppendMode) {
        self.send(ClientIOEvent::AppendDisplay { message, mode });
    }

    fn take_action(&self, action: &str, data: serde_json::Value) {
        self.send(ClientIOEvent::TakeAction {
            action: action.to_string(),
            data,
        });
    }

    fn notify(
        &self,
        event: AppAgentEvent,
        request_id: Option<&RequestId>,
        message: &str,
        source: &str,
    ) {
        self.send(ClientIOEvent::Notify {
            event,
            request_id: request_id.cloned(),
            message: message.to_string(),
            source: source.to_string(),
        });
    }

    fn set_dynamic_display(
        &self,
        source: &str,
        request_id: &RequestId,
        action_index: usize,
        display_id: &str,
        next_refresh_ms: u64,
    ) {
        self.send(ClientIOEvent::SetDynamicDisplay {
            source: source.to_string(),
            request_id: request_id.clone(),
            action_index,
            display_id: display_id.to_string(),
            next_refresh_ms,
        });
    }
}
