//! Execution contexts handed to agents.
//!
//! - [`CommandHandlerContext`]: process-wide state for one running session.
//! - [`SessionContext`]: per-agent handle, alive as long as the registration.
//! - [`ActionContext`]: per-call capability, revoked when its owning
//!   [`ScopedActionContext`] closes.

pub mod action;
pub mod session;
pub mod system;

pub use action::{ActionContext, ActionIO, ScopedActionContext};
pub use session::SessionContext;
pub use system::{AgentRegistration, CommandHandlerContext, CommandHandlerContextBuilder};
