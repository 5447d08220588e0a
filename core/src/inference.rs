//! Contract for the model endpoint a session agent drives, generalized from
//! a provider-specific response-stream shape down to the two abstract
//! capabilities the core actually needs: structured output, and chat with
//! single-pass tool dispatch.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// A sink for raw streamed chunks, invoked once per chunk as it arrives.
pub type ChunkSink<'a> = &'a mut (dyn FnMut(&str) + Send);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuredOutputRequest {
    pub prompt: String,
    /// Name of the schema the response must validate against; the schema
    /// itself is owned by the caller.
    pub schema_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: appforge_protocol::Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatWithToolsRequest {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
}

/// One tool invocation the model chose to make. Dispatch against a
/// `ToolRegistry` is the caller's responsibility, not the client's — the
/// conversation processor is what appends to `pendingUserInputs` when
/// `edit_app` is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatTurn {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Abstracts a model endpoint. Tool dispatch is single-pass per model turn;
/// recursive tool loops are not required.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn structured_output(
        &self,
        request: StructuredOutputRequest,
        on_chunk: Option<ChunkSink<'_>>,
    ) -> Result<Value>;

    async fn chat_with_tools(
        &self,
        request: ChatWithToolsRequest,
        available_tools: &[String],
        on_chunk: Option<ChunkSink<'_>>,
    ) -> Result<ChatTurn>;
}
