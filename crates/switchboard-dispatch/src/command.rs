//! Direct command execution.
//!
//! Commands are addressed to an agent by name and bypass result
//! classification: the agent's return value is handed back unchanged and
//! nothing is written to chat history or memory.

use tracing::debug;

use crate::context::{CommandHandlerContext, ScopedActionContext};
use crate::dispatcher::Dispatcher;
use crate::error::{Capability, DispatchError};
use crate::profiler::names;

/// Clears the last action name when the command finishes, however it ends.
struct LastActionNameGuard<'a> {
    system: &'a CommandHandlerContext,
}

impl Drop for LastActionNameGuard<'_> {
    fn drop(&mut self) {
        self.system.set_last_action_name(None);
    }
}

impl Dispatcher {
    /// Run `command_path` on agent `agent_name`.
    pub async fn execute_command(
        &self,
        command_path: &[String],
        params: Option<&serde_json::Value>,
        agent_name: &str,
        attachments: &[String],
    ) -> Result<Option<serde_json::Value>, DispatchError> {
        let system = self.system();
        let agent = system.get_app_agent(agent_name)?;
        let executor =
            agent
                .as_command_executor()
                .ok_or_else(|| DispatchError::UnsupportedCapability {
                    agent: agent_name.to_string(),
                    capability: Capability::ExecuteCommand,
                })?;
        let request_id = system.current_request_id()?;

        let scoped = ScopedActionContext::open(agent_name, system, request_id, None)?;
        // A bare agent invocation names no action.
        let command_name = (!command_path.is_empty()).then(|| {
            std::iter::once(agent_name)
                .chain(command_path.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(".")
        });
        debug!(agent = agent_name, command = ?command_name, "executing command");
        system.set_last_action_name(command_name);
        let _last_action = LastActionNameGuard { system };

        let span = system.profiler().measure(names::EXECUTE_COMMAND, None);
        let result = executor
            .execute_command(command_path, params, scoped.context(), attachments)
            .await;
        span.stop();
        scoped.close();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AppAgent, AppAgentManifest, CommandExecutor};
    use crate::client_io::ChannelClientIO;
    use crate::context::{ActionContext, AgentRegistration};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use switchboard_core::types::RequestId;

    #[derive(Default)]
    struct Settings {
        seen_last_action: Mutex<Option<String>>,
        retained: Mutex<Option<ActionContext>>,
        system: Mutex<Option<Arc<CommandHandlerContext>>>,
    }

    impl AppAgent for Settings {
        fn as_command_executor(&self) -> Option<&dyn CommandExecutor> {
            Some(self)
        }
    }

    #[async_trait]
    impl CommandExecutor for Settings {
        async fn execute_command(
            &self,
            command_path: &[String],
            params: Option<&serde_json::Value>,
            context: &ActionContext,
            attachments: &[String],
        ) -> Result<Option<serde_json::Value>, DispatchError> {
            *self.retained.lock().unwrap() = Some(context.clone());
            let system = self.system.lock().unwrap().clone();
            *self.seen_last_action.lock().unwrap() =
                system.and_then(|system| system.last_action_name());
            match command_path.first().map(String::as_str) {
                Some("fail") => Err(DispatchError::agent_failed("settings", "bad command")),
                _ => Ok(Some(serde_json::json!({
                    "path": command_path,
                    "params": params.cloned(),
                    "attachments": attachments.len(),
                }))),
            }
        }
    }

    async fn dispatcher(agent: Arc<Settings>) -> Dispatcher {
        let (io, _rx) = ChannelClientIO::new();
        let system = CommandHandlerContext::builder(Arc::new(io)).build();
        *agent.system.lock().unwrap() = Some(Arc::clone(&system));
        system
            .register_agent(AgentRegistration::new(
                "settings",
                AppAgentManifest::new("⚙️", "Settings"),
                agent,
            ))
            .await
            .unwrap();
        system.start_request(RequestId::from("req-1"));
        Dispatcher::new(system)
    }

    fn path(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn test_returns_raw_result_and_cleans_up() {
        let agent = Arc::new(Settings::default());
        let dispatcher = dispatcher(Arc::clone(&agent)).await;
        let params = serde_json::json!({ "value": "dark" });

        let result = dispatcher
            .execute_command(&path(&["theme", "set"]), Some(&params), "settings", &["a.png".to_string()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result["path"], serde_json::json!(["theme", "set"]));
        assert_eq!(result["params"]["value"], "dark");
        assert_eq!(result["attachments"], 1);

        assert_eq!(
            agent.seen_last_action.lock().unwrap().as_deref(),
            Some("settings.theme.set")
        );
        let system = dispatcher.system();
        assert!(system.last_action_name().is_none());
        assert!(system.chat_history().is_empty());
        assert_eq!(system.live_action_contexts(), 0);
        let retained = agent.retained.lock().unwrap().clone().unwrap();
        assert!(retained.is_closed());

        let entries = system.profiler().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, names::EXECUTE_COMMAND);
    }

    #[tokio::test]
    async fn test_empty_path_sets_no_action_name() {
        let agent = Arc::new(Settings::default());
        let dispatcher = dispatcher(Arc::clone(&agent)).await;
        dispatcher.system().set_last_action_name(Some("stale.action".to_string()));

        let result = dispatcher
            .execute_command(&[], None, "settings", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result["path"], serde_json::json!([]));
        assert!(agent.seen_last_action.lock().unwrap().is_none());
        assert!(dispatcher.system().last_action_name().is_none());
    }

    #[tokio::test]
    async fn test_failure_still_cleans_up() {
        let agent = Arc::new(Settings::default());
        let dispatcher = dispatcher(Arc::clone(&agent)).await;

        let err = dispatcher
            .execute_command(&path(&["fail"]), None, "settings", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::AgentFailed { .. }));
        let system = dispatcher.system();
        assert!(system.last_action_name().is_none());
        assert_eq!(system.live_action_contexts(), 0);
        assert_eq!(system.profiler().entries().len(), 1);
    }

    #[tokio::test]
    async fn test_agent_without_commands_rejected() {
        struct Mute;
        impl AppAgent for Mute {}

        let (io, _rx) = ChannelClientIO::new();
        let system = CommandHandlerContext::builder(Arc::new(io)).build();
        system
            .register_agent(AgentRegistration::new("mute", AppAgentManifest::default(), Arc::new(Mute)))
            .await
            .unwrap();
        system.start_request(RequestId::new());
        let dispatcher = Dispatcher::new(system);

        let err = dispatcher
            .execute_command(&path(&["anything"]), None, "mute", &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::UnsupportedCapability { capability: Capability::ExecuteCommand, .. }
        ));
        assert_eq!(dispatcher.system().live_action_contexts(), 0);
    }
}
