//! Runs one user turn against the Inference Client with a tool registry,
//! threading tool calls back into the agent's `pendingUserInputs`. Tool
//! dispatch is a typed registry keyed by tag rather than dynamic dispatch
//! over an open-ended tool set.

use std::sync::Arc;

use serde_json::Value;

use appforge_protocol::ConversationMessage;
use appforge_protocol::ModificationRequest;
use appforge_protocol::Role;

use crate::error::AgentError;
use crate::error::InferenceError;
use crate::error::Result;
use crate::inference::ChatMessage;
use crate::inference::ChatWithToolsRequest;
use crate::inference::ChunkSink;
use crate::inference::InferenceClient;

/// A tool call parsed into its typed shape. One variant per registered tag;
/// `edit_app` is the only tool the conversation processor needs to support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    EditApp { modification_request: String },
}

/// The tags the conversation processor advertises to the model, and the
/// parser from raw tool-call arguments to a typed [`ToolInvocation`].
pub struct ToolRegistry;

impl ToolRegistry {
    pub fn available_tool_names() -> Vec<String> {
        vec!["edit_app".to_string()]
    }

    pub fn parse(name: &str, arguments: &Value) -> Option<ToolInvocation> {
        match name {
            "edit_app" => arguments
                .get("modification_request")
                .and_then(Value::as_str)
                .map(|text| ToolInvocation::EditApp { modification_request: text.to_string() }),
            _ => None,
        }
    }
}

/// Blueprint/phase context the processor folds into its system prompt.
#[derive(Debug, Clone, Default)]
pub struct ProjectContext {
    pub blueprint_title: Option<String>,
    pub current_phase_name: Option<String>,
}

impl ProjectContext {
    fn system_prompt(&self) -> String {
        let mut prompt = String::from(
            "You are assisting with an in-progress application generation session.",
        );
        if let Some(title) = &self.blueprint_title {
            prompt.push_str(&format!(" The project blueprint is \"{title}\"."));
        }
        if let Some(phase) = &self.current_phase_name {
            prompt.push_str(&format!(" The phase currently in progress is \"{phase}\"."));
        }
        prompt
    }
}

pub struct ConversationTurnRequest {
    pub conversation_id: String,
    pub user_message: String,
    pub past_messages: Vec<ConversationMessage>,
    pub context: ProjectContext,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurnOutcome {
    pub assistant_message: ConversationMessage,
    pub modification_requests: Vec<ModificationRequest>,
}

const FALLBACK_ASSISTANT_MESSAGE: &str =
    "I ran into a problem processing that message, but generation will continue.";

pub struct ConversationProcessor {
    inference: Arc<dyn InferenceClient>,
}

impl ConversationProcessor {
    pub fn new(inference: Arc<dyn InferenceClient>) -> Self {
        Self { inference }
    }

    /// Runs one turn. Rate-limit and security errors propagate unchanged;
    /// any other inference error is swallowed into a fallback assistant
    /// message rather than unwinding the caller.
    pub async fn process_turn(
        &self,
        request: ConversationTurnRequest,
        on_chunk: Option<ChunkSink<'_>>,
    ) -> Result<ConversationTurnOutcome> {
        let messages = request
            .past_messages
            .iter()
            .map(|m| ChatMessage { role: m.role, content: m.content.clone() })
            .chain(std::iter::once(ChatMessage {
                role: Role::User,
                content: request.user_message.clone(),
            }))
            .collect();

        let chat_request = ChatWithToolsRequest {
            system_prompt: request.context.system_prompt(),
            messages,
        };

        let turn = match self
            .inference
            .chat_with_tools(chat_request, &ToolRegistry::available_tool_names(), on_chunk)
            .await
        {
            Ok(turn) => turn,
            Err(AgentError::Inference(InferenceError::RateLimited(info))) => {
                return Err(AgentError::Inference(InferenceError::RateLimited(info)));
            }
            Err(AgentError::Inference(InferenceError::Security(reason))) => {
                return Err(AgentError::Inference(InferenceError::Security(reason)));
            }
            Err(_other) => {
                return Ok(ConversationTurnOutcome {
                    assistant_message: ConversationMessage {
                        role: Role::Assistant,
                        content: FALLBACK_ASSISTANT_MESSAGE.to_string(),
                        conversation_id: request.conversation_id.clone(),
                    },
                    modification_requests: Vec::new(),
                });
            }
        };

        let modification_requests = turn
            .tool_calls
            .iter()
            .filter_map(|call| ToolRegistry::parse(&call.name, &call.arguments))
            .map(|invocation| match invocation {
                ToolInvocation::EditApp { modification_request } => {
                    ModificationRequest { text: modification_request }
                }
            })
            .collect();

        Ok(ConversationTurnOutcome {
            assistant_message: ConversationMessage {
                role: Role::Assistant,
                content: turn.text,
                conversation_id: request.conversation_id,
            },
            modification_requests,
        })
    }
}

/// Synthesizes an internal memo (phase events, deployments) appended to
/// history but hidden from the chat UI. Marked with `Role::System` so a UI
/// renderer can filter these out without a dedicated visibility field on
/// the wire type.
pub fn internal_memo(conversation_id: impl Into<String>, description: impl Into<String>) -> ConversationMessage {
    ConversationMessage {
        role: Role::System,
        content: description.into(),
        conversation_id: conversation_id.into(),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use crate::inference::StructuredOutputRequest;
    use crate::inference::ToolCall;

    use super::*;

    struct ScriptedClient {
        turn: ChatTurnFixture,
    }

    enum ChatTurnFixture {
        Text(&'static str),
        EditApp(&'static str),
        RateLimited,
    }

    #[async_trait]
    impl InferenceClient for ScriptedClient {
        async fn structured_output(
            &self,
            _request: StructuredOutputRequest,
            _on_chunk: Option<ChunkSink<'_>>,
        ) -> Result<Value> {
            unimplemented!("not exercised by these tests")
        }

        async fn chat_with_tools(
            &self,
            _request: ChatWithToolsRequest,
            _available_tools: &[String],
            _on_chunk: Option<ChunkSink<'_>>,
        ) -> Result<crate::inference::ChatTurn> {
            match &self.turn {
                ChatTurnFixture::Text(text) => {
                    Ok(crate::inference::ChatTurn { text: text.to_string(), tool_calls: vec![] })
                }
                ChatTurnFixture::EditApp(request_text) => Ok(crate::inference::ChatTurn {
                    text: "Sure, I'll make that change.".to_string(),
                    tool_calls: vec![ToolCall {
                        name: "edit_app".to_string(),
                        arguments: json!({ "modification_request": request_text }),
                    }],
                }),
                ChatTurnFixture::RateLimited => Err(AgentError::Inference(InferenceError::RateLimited(
                    crate::error::RateLimitInfo {
                        limit_type: "tokens_per_minute".to_string(),
                        limit: Some(1000),
                        period: Some("minute".to_string()),
                        suggestions: vec!["wait and retry".to_string()],
                    },
                ))),
            }
        }
    }

    fn request(user_message: &str) -> ConversationTurnRequest {
        ConversationTurnRequest {
            conversation_id: "conv-1".to_string(),
            user_message: user_message.to_string(),
            past_messages: Vec::new(),
            context: ProjectContext::default(),
        }
    }

    #[tokio::test]
    async fn plain_turn_returns_assistant_message_with_no_modifications() {
        let processor =
            ConversationProcessor::new(Arc::new(ScriptedClient { turn: ChatTurnFixture::Text("hi there") }));
        let outcome = processor.process_turn(request("hello"), None).await.unwrap();
        assert_eq!(outcome.assistant_message.content, "hi there");
        assert!(outcome.modification_requests.is_empty());
    }

    #[tokio::test]
    async fn edit_app_tool_call_becomes_a_modification_request() {
        let processor = ConversationProcessor::new(Arc::new(ScriptedClient {
            turn: ChatTurnFixture::EditApp("add a dark mode toggle"),
        }));
        let outcome = processor.process_turn(request("can you add dark mode?"), None).await.unwrap();
        assert_eq!(outcome.modification_requests.len(), 1);
        assert_eq!(outcome.modification_requests[0].text, "add a dark mode toggle");
    }

    #[tokio::test]
    async fn rate_limit_errors_propagate_unchanged() {
        let processor =
            ConversationProcessor::new(Arc::new(ScriptedClient { turn: ChatTurnFixture::RateLimited }));
        let result = processor.process_turn(request("hello"), None).await;
        assert!(matches!(
            result,
            Err(AgentError::Inference(InferenceError::RateLimited(_)))
        ));
    }
}
