use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of an out-of-band notification raised by an agent through its
/// session context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppAgentEvent {
    Error,
    Warning,
    Info,
    Debug,
}

impl fmt::Display for AppAgentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppAgentEvent::Error => write!(f, "error"),
            AppAgentEvent::Warning => write!(f, "warning"),
            AppAgentEvent::Info => write!(f, "info"),
            AppAgentEvent::Debug => write!(f, "debug"),
        }
    }
}

impl std::str::FromStr for AppAgentEvent {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(AppAgentEvent::Error),
            "warning" => Ok(AppAgentEvent::Warning),
            "info" => Ok(AppAgentEvent::Info),
            "debug" => Ok(AppAgentEvent::Debug),
            _ => Err(format!("Unknown agent event: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_display_matches_serde() {
        for event in [
            AppAgentEvent::Error,
            AppAgentEvent::Warning,
            AppAgentEvent::Info,
            AppAgentEvent::Debug,
        ] {
            let json = serde_json::to_string(&event).unwrap();
            assert_eq!(json, format!("\"{}\"", event));
            assert_eq!(event.to_string().parse::<AppAgentEvent>().unwrap(), event);
        }
    }

    #[test]
    fn test_event_from_str_unknown() {
        let err = "fatal".parse::<AppAgentEvent>().unwrap_err();
        assert_eq!(err, "Unknown agent event: fatal");
    }
}
