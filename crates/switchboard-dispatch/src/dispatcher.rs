//! Action dispatcher.
//!
//! Resolves each action to its owning agent, runs it with a scoped context,
//! and folds the outcome into display, chat history, and conversation
//! memory. Batches run strictly in order; a fatal error aborts the rest of
//! the batch while recoverable agent errors are recorded and skipped past.

use std::sync::Arc;

use switchboard_core::types::RequestId;
use tracing::{debug, info, warn};

use crate::chat_history::ChatHistoryEntry;
use crate::client_io::IoMessage;
use crate::context::{CommandHandlerContext, ScopedActionContext};
use crate::error::{Capability, DispatchError};
use crate::profiler::names;
use crate::types::{
    app_agent_name, Action, ActionResult, Actions, DisplayAppendMode, DisplayContent,
};

/// Executes resolved actions against the registered agents.
#[derive(Clone)]
pub struct Dispatcher {
    system: Arc<CommandHandlerContext>,
}

impl Dispatcher {
    pub fn new(system: Arc<CommandHandlerContext>) -> Self {
        Self { system }
    }

    pub fn system(&self) -> &Arc<CommandHandlerContext> {
        &self.system
    }

    /// Execute `actions` one after another.
    ///
    /// Each action, including its context close, completes before the next
    /// starts. The first fatal error is returned and the remaining actions
    /// are not run.
    pub async fn execute_actions(&self, actions: &Actions) -> Result<Vec<ActionResult>, DispatchError> {
        if let Ok(json) = serde_json::to_string(actions) {
            debug!(actions = %json, "executing actions");
        }
        let mut results = Vec::with_capacity(actions.len());
        for (index, action) in actions.iter().enumerate() {
            results.push(self.execute_action(action, index).await?);
        }
        Ok(results)
    }

    /// Execute one action at position `action_index` of its batch.
    pub async fn execute_action(
        &self,
        action: &Action,
        action_index: usize,
    ) -> Result<ActionResult, DispatchError> {
        let full_action_name = action.full_action_name();
        let schema_name =
            action
                .translator_name()
                .ok_or_else(|| DispatchError::MissingTranslatorName {
                    action: full_action_name.clone(),
                })?;
        let agent_name = app_agent_name(schema_name);
        let agent = self.system.get_app_agent(agent_name)?;
        let executor =
            agent
                .as_action_executor()
                .ok_or_else(|| DispatchError::UnsupportedCapability {
                    agent: agent_name.to_string(),
                    capability: Capability::ExecuteAction,
                })?;
        let request_id = self.system.current_request_id()?;

        let scoped = self.action_context(agent_name, &request_id, action_index)?;
        self.system.set_last_action(schema_name, &full_action_name);

        if self.system.dispatch_config().show_action_status {
            let emoji = self.system.emoji_char(schema_name)?.unwrap_or_default();
            self.system.client_io().append_display(
                IoMessage {
                    content: DisplayContent::status(format!(
                        "[{} {}] Executing action {}",
                        emoji, schema_name, full_action_name
                    )),
                    request_id: request_id.clone(),
                    source: schema_name.to_string(),
                    action_index: Some(action_index),
                },
                DisplayAppendMode::Temporary,
            );
        }

        let returned = {
            let _span = self
                .system
                .profiler()
                .measure(names::EXECUTE_ACTION, Some(action_index));
            executor.execute_action(action, scoped.context()).await?
        };
        let result = returned.unwrap_or_else(|| ActionResult::completed(&full_action_name));

        self.integrate_result(&result, &scoped, schema_name, &full_action_name, &request_id, action_index)?;
        scoped.close();
        Ok(result)
    }

    /// Reuse the pending streaming context for the first action of a batch
    /// when it belongs to the same agent, otherwise open a fresh one.
    fn action_context(
        &self,
        agent_name: &str,
        request_id: &RequestId,
        action_index: usize,
    ) -> Result<ScopedActionContext, DispatchError> {
        if action_index == 0 {
            if let Some(pending) = self.system.take_streaming_context() {
                if pending.agent_name() == agent_name {
                    debug!(agent = agent_name, "reusing streaming action context");
                    return Ok(pending);
                }
                debug!(
                    pending = pending.agent_name(),
                    agent = agent_name,
                    "discarding streaming context for a different agent"
                );
                pending.close();
            }
        }
        ScopedActionContext::open(agent_name, &self.system, request_id.clone(), Some(action_index))
    }

    fn integrate_result(
        &self,
        result: &ActionResult,
        scoped: &ScopedActionContext,
        schema_name: &str,
        full_action_name: &str,
        request_id: &RequestId,
        action_index: usize,
    ) -> Result<(), DispatchError> {
        let action_io = scoped.context().action_io()?;

        if let Some(error) = &result.error {
            warn!(action = full_action_name, error = %error, "action reported an error");
            // Keep whatever the agent already showed for this action.
            action_io.append_display(
                DisplayContent::error(error.clone()),
                DisplayAppendMode::Block,
            )?;
            self.system.add_chat_entry(ChatHistoryEntry::assistant(
                format!("Action {} failed: {}", full_action_name, error),
                Some(request_id.clone()),
            ));
            return Ok(());
        }

        if let Some(content) = &result.display_content {
            action_io.set_display(content.clone())?;
        }

        if let Some(display_id) = &result.dynamic_display_id {
            let next_refresh_ms = result
                .dynamic_display_next_refresh_ms
                .unwrap_or(self.system.dispatch_config().default_refresh_ms);
            self.system.client_io().set_dynamic_display(
                schema_name,
                request_id,
                action_index,
                display_id,
                next_refresh_ms,
            );
        }

        let text = result
            .literal_text
            .clone()
            .unwrap_or_else(|| format!("Action {} completed.", full_action_name));
        self.system.add_chat_entry(
            ChatHistoryEntry::assistant(text, Some(request_id.clone()))
                .with_entities(result.entities.clone())
                .with_additional_instructions(result.additional_instructions.clone()),
        );

        if let (Some(literal_text), Some(memory)) = (&result.literal_text, self.system.memory()) {
            memory.add_to_conversation_memory(literal_text, &result.entities);
        }

        info!(action = full_action_name, index = action_index, "action completed");
        Ok(())
    }

    /// Ask each action's agent whether a wildcard match is acceptable.
    ///
    /// Actions without a translator and agents without a validator abstain.
    /// Any explicit rejection rejects the whole match.
    pub async fn validate_wildcard_match(&self, actions: &Actions) -> Result<bool, DispatchError> {
        for action in actions {
            let Some(schema_name) = action.translator_name() else {
                continue;
            };
            let agent_name = app_agent_name(schema_name);
            let agent = self.system.get_app_agent(agent_name)?;
            let Some(validator) = agent.as_wildcard_validator() else {
                continue;
            };
            let session = self.system.get_session_context(agent_name)?;
            if validator.validate_wildcard_match(action, &session).await == Some(false) {
                debug!(action = %action, "wildcard match rejected");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ActionExecutor, AppAgent, AppAgentManifest};
    use crate::client_io::{ChannelClientIO, ClientIOEvent};
    use crate::context::{ActionContext, AgentRegistration};
    use crate::types::MessageKind;
    use async_trait::async_trait;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct EchoAgent;

    impl AppAgent for EchoAgent {
        fn as_action_executor(&self) -> Option<&dyn ActionExecutor> {
            Some(self)
        }
    }

    #[async_trait]
    impl ActionExecutor for EchoAgent {
        async fn execute_action(
            &self,
            action: &Action,
            _context: &ActionContext,
        ) -> Result<Option<ActionResult>, DispatchError> {
            match action.action_name.as_str() {
                "silent" => Ok(None),
                "poll" => Ok(Some(ActionResult {
                    dynamic_display_id: Some("poll".to_string()),
                    ..ActionResult::success("polling")
                })),
                _ => Ok(Some(ActionResult::success(format!("echo {}", action.action_name)))),
            }
        }
    }

    async fn dispatcher() -> (Dispatcher, UnboundedReceiver<ClientIOEvent>) {
        let (io, rx) = ChannelClientIO::new();
        let system = CommandHandlerContext::builder(Arc::new(io)).build();
        system
            .register_agent(AgentRegistration::new(
                "echo",
                AppAgentManifest::new("🔁", "Echo"),
                Arc::new(EchoAgent),
            ))
            .await
            .unwrap();
        system.start_request(RequestId::from("req-1"));
        (Dispatcher::new(system), rx)
    }

    #[tokio::test]
    async fn test_status_line_precedes_result_display() {
        let (dispatcher, mut rx) = dispatcher().await;
        dispatcher
            .execute_action(&Action::new("echo", "hello"), 0)
            .await
            .unwrap();

        match rx.try_recv().unwrap() {
            ClientIOEvent::AppendDisplay { message, mode } => {
                assert_eq!(message.content.content, "[🔁 echo] Executing action echo.hello");
                assert_eq!(message.content.kind, Some(MessageKind::Status));
                assert_eq!(mode, DisplayAppendMode::Temporary);
            }
            other => panic!("unexpected event {:?}", other),
        }
        match rx.try_recv().unwrap() {
            ClientIOEvent::SetDisplay(message) => {
                assert_eq!(message.content.content, "echo hello");
                assert_eq!(message.source, "echo");
                assert_eq!(message.action_index, Some(0));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_result_synthesizes_completion() {
        let (dispatcher, _rx) = dispatcher().await;
        let result = dispatcher
            .execute_action(&Action::new("echo", "silent"), 0)
            .await
            .unwrap();
        assert_eq!(result.literal_text.as_deref(), Some("Action echo.silent completed."));
        let history = dispatcher.system().chat_history();
        assert_eq!(history.last().unwrap().text, "Action echo.silent completed.");
    }

    #[tokio::test]
    async fn test_dynamic_display_registered() {
        let (dispatcher, mut rx) = dispatcher().await;
        dispatcher
            .execute_action(&Action::new("echo", "poll"), 2)
            .await
            .unwrap();
        let event = std::iter::from_fn(|| rx.try_recv().ok())
            .find(|event| matches!(event, ClientIOEvent::SetDynamicDisplay { .. }))
            .unwrap();
        match event {
            ClientIOEvent::SetDynamicDisplay {
                source,
                action_index,
                display_id,
                next_refresh_ms,
                ..
            } => {
                assert_eq!(source, "echo");
                assert_eq!(action_index, 2);
                assert_eq!(display_id, "poll");
                assert_eq!(next_refresh_ms, 1000);
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_last_action_bookkeeping() {
        let (dispatcher, _rx) = dispatcher().await;
        dispatcher
            .execute_action(&Action::new("echo", "hello"), 0)
            .await
            .unwrap();
        let system = dispatcher.system();
        assert_eq!(system.last_action_schema_name().as_deref(), Some("echo"));
        assert_eq!(system.last_action_name().as_deref(), Some("echo.hello"));
        assert_eq!(system.live_action_contexts(), 0);
    }

    #[tokio::test]
    async fn test_profiler_records_each_action() {
        let (dispatcher, _rx) = dispatcher().await;
        let actions = Actions::from(vec![Action::new("echo", "a"), Action::new("echo", "b")]);
        dispatcher.execute_actions(&actions).await.unwrap();
        let entries = dispatcher.system().profiler().entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|entry| entry.name == names::EXECUTE_ACTION));
        assert_eq!(entries[1].index, Some(1));
    }

    #[tokio::test]
    async fn test_requires_active_request() {
        let (dispatcher, _rx) = dispatcher().await;
        dispatcher.system().end_request();
        let err = dispatcher
            .execute_action(&Action::new("echo", "hello"), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NoActiveRequest));
        assert_eq!(dispatcher.system().live_action_contexts(), 0);
    }
}
