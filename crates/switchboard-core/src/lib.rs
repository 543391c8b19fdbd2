pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod types;

pub use config::SwitchboardConfig;
pub use error::{Result, SwitchboardError};
pub use events::AppAgentEvent;
pub use types::*;
