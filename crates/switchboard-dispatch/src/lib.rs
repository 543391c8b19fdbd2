//! Action dispatch core for Switchboard.
//!
//! Routes resolved actions to the agent that owns them, hands every call a
//! scoped and revocable execution context, and folds the agent's outcome
//! into display, chat history, and conversation memory.

pub mod agent;
pub mod chat_history;
pub mod client_io;
pub mod command;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod lock;
pub mod memory;
pub mod profiler;
pub mod storage;
pub mod streaming;
pub mod translator_cache;
pub mod types;

pub use agent::{
    ActionExecutor, AgentContextValue, AgentRegistry, AppAgent, AppAgentManifest,
    CommandExecutor, StreamingActionExecutor, WildcardValidator,
};
pub use chat_history::{ChatHistory, ChatHistoryEntry, ChatRole};
pub use client_io::{ChannelClientIO, ClientIO, ClientIOEvent, IoMessage};
pub use context::{
    ActionContext, ActionIO, AgentRegistration, CommandHandlerContext, ScopedActionContext,
    SessionContext,
};
pub use dispatcher::Dispatcher;
pub use error::{Capability, DispatchError};
pub use lock::CommandLock;
pub use memory::{MemoryBridge, MemoryWrite};
pub use profiler::{ProfileEntry, ProfileSpan, Profiler};
pub use storage::{FileStorage, Storage};
pub use streaming::PartialActionCallback;
pub use translator_cache::TranslatorCache;
pub use types::{
    Action, ActionResult, Actions, DisplayAppendMode, DisplayContent, DisplayType, MessageKind,
};
