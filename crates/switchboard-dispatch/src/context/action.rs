//! Scoped execution contexts.
//!
//! An `ActionContext` is the capability an agent receives for one action
//! call (or one streaming turn). Agents may clone and keep it, but once the
//! owning `ScopedActionContext` closes, every accessor on every clone, and
//! on every `ActionIO` taken from it, fails with `DispatchError::ContextClosed`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use switchboard_core::types::RequestId;

use crate::client_io::{ClientIO, IoMessage};
use crate::context::{CommandHandlerContext, SessionContext};
use crate::error::DispatchError;
use crate::types::{DisplayAppendMode, DisplayContent};

struct ContextState {
    agent_name: String,
    request_id: RequestId,
    action_index: Option<usize>,
    session: SessionContext,
    client_io: Arc<dyn ClientIO>,
    streaming_state: Option<serde_json::Value>,
}

impl ContextState {
    fn message(&self, content: DisplayContent) -> IoMessage {
        IoMessage {
            content,
            request_id: self.request_id.clone(),
            source: self.agent_name.clone(),
            action_index: self.action_index,
        }
    }
}

/// Backing cell shared by a context, its clones, and its `ActionIO`.
/// `None` once closed.
struct ContextCell {
    state: RwLock<Option<ContextState>>,
}

impl ContextCell {
    fn with<R>(&self, f: impl FnOnce(&ContextState) -> R) -> Result<R, DispatchError> {
        let guard = self.state.read().map_err(DispatchError::poisoned)?;
        guard.as_ref().map(f).ok_or(DispatchError::ContextClosed)
    }

    fn with_mut<R>(&self, f: impl FnOnce(&mut ContextState) -> R) -> Result<R, DispatchError> {
        let mut guard = self.state.write().map_err(DispatchError::poisoned)?;
        guard.as_mut().map(f).ok_or(DispatchError::ContextClosed)
    }

    /// Returns `true` if this call closed the cell.
    fn close(&self) -> bool {
        match self.state.write() {
            Ok(mut guard) => guard.take().is_some(),
            Err(poisoned) => poisoned.into_inner().take().is_some(),
        }
    }

    fn is_closed(&self) -> bool {
        match self.state.read() {
            Ok(guard) => guard.is_none(),
            Err(_) => true,
        }
    }
}

/// Capability handed to an agent for one action invocation.
#[derive(Clone)]
pub struct ActionContext {
    cell: Arc<ContextCell>,
}

impl ActionContext {
    pub fn action_io(&self) -> Result<ActionIO, DispatchError> {
        self.cell.with(|_| ActionIO {
            cell: Arc::clone(&self.cell),
        })
    }

    pub fn session_context(&self) -> Result<SessionContext, DispatchError> {
        self.cell.with(|state| state.session.clone())
    }

    pub fn agent_name(&self) -> Result<String, DispatchError> {
        self.cell.with(|state| state.agent_name.clone())
    }

    pub fn request_id(&self) -> Result<RequestId, DispatchError> {
        self.cell.with(|state| state.request_id.clone())
    }

    pub fn action_index(&self) -> Result<Option<usize>, DispatchError> {
        self.cell.with(|state| state.action_index)
    }

    /// State an agent stashed while receiving partial values, readable
    /// again from the final `execute_action` call.
    pub fn streaming_state(&self) -> Result<Option<serde_json::Value>, DispatchError> {
        self.cell.with(|state| state.streaming_state.clone())
    }

    pub fn set_streaming_state(&self, value: serde_json::Value) -> Result<(), DispatchError> {
        self.cell.with_mut(|state| state.streaming_state = Some(value))
    }

    pub fn is_closed(&self) -> bool {
        self.cell.is_closed()
    }
}

/// Display channel of an `ActionContext`.
#[derive(Clone)]
pub struct ActionIO {
    cell: Arc<ContextCell>,
}

impl ActionIO {
    /// Replace the display for this action.
    pub fn set_display(&self, content: impl Into<DisplayContent>) -> Result<(), DispatchError> {
        let (client_io, message) = self
            .cell
            .with(|state| (Arc::clone(&state.client_io), state.message(content.into())))?;
        client_io.set_display(message);
        Ok(())
    }

    pub fn append_display(
        &self,
        content: impl Into<DisplayContent>,
        mode: DisplayAppendMode,
    ) -> Result<(), DispatchError> {
        let (client_io, message) = self
            .cell
            .with(|state| (Arc::clone(&state.client_io), state.message(content.into())))?;
        client_io.append_display(message, mode);
        Ok(())
    }

    /// Forward an opaque side-channel signal to the client.
    pub fn take_action(&self, action: &str, data: serde_json::Value) -> Result<(), DispatchError> {
        let client_io = self.cell.with(|state| Arc::clone(&state.client_io))?;
        client_io.take_action(action, data);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.cell.is_closed()
    }
}

/// Owner of an `ActionContext`; closing it revokes the context.
///
/// Closing happens exactly once, either through `close` or on drop, so
/// every exit path of the code holding it releases the context.
pub struct ScopedActionContext {
    context: ActionContext,
    agent_name: String,
    live: Arc<AtomicUsize>,
    closed: bool,
}

impl ScopedActionContext {
    /// Open a context for `agent_name`, tagging display output with
    /// `request_id` and `action_index`.
    pub fn open(
        agent_name: &str,
        system: &CommandHandlerContext,
        request_id: RequestId,
        action_index: Option<usize>,
    ) -> Result<Self, DispatchError> {
        let session = system.get_session_context(agent_name)?;
        let state = ContextState {
            agent_name: agent_name.to_string(),
            request_id,
            action_index,
            session,
            client_io: system.client_io(),
            streaming_state: None,
        };
        let live = system.live_context_counter();
        live.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(agent = agent_name, index = ?action_index, "action context opened");
        Ok(Self {
            context: ActionContext {
                cell: Arc::new(ContextCell {
                    state: RwLock::new(Some(state)),
                }),
            },
            agent_name: agent_name.to_string(),
            live,
            closed: false,
        })
    }

    pub fn context(&self) -> &ActionContext {
        &self.context
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn close(mut self) {
        self.close_inner();
    }

    fn close_inner(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.context.cell.close();
        self.live.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(agent = %self.agent_name, "action context closed");
    }
}

impl Drop for ScopedActionContext {
    fn drop(&mut self) {
        self.close_inner();
    }
}
