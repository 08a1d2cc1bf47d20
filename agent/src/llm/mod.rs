//! LLM abstraction layer
//!
//! Agents talk to models through the [`Llm`] trait: a list of messages plus
//! the tools the model may call goes in, assistant text and any native tool
//! calls come out.

mod mock;
mod ollama;

pub use mock::MockLlm;
pub use ollama::{list_models, ModelInfo, OllamaClient};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Assistant turn that requested tool calls
    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Some(calls),
        }
    }

    /// Result of a tool call fed back to the model
    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub function: ToolCallFunction,
}

/// The function details within a tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i32>,
    pub name: String,
    #[serde(default = "empty_arguments")]
    pub arguments: serde_json::Value,
}

fn empty_arguments() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: None,
            function: ToolCallFunction {
                index: None,
                name: name.into(),
                arguments,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// A callable surfaced to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: serde_json::Value,
}

/// One model completion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl LlmReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// Errors raised while invoking a model
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("invalid model endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("model endpoint rejected credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("model API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed model response: {0}")]
    Malformed(String),

    #[error("{0}")]
    Other(String),
}

/// Trait for LLM backends
#[async_trait]
pub trait Llm: Send + Sync {
    /// Send the conversation and the available tools, get one completion back
    async fn chat(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<LlmReply, LlmError>;

    /// Get the model name
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_roles_serialize_lowercase() {
        let json = serde_json::to_value(Message::tool("42")).unwrap();
        assert_eq!(json["role"], "tool");
        assert!(json.get("tool_calls").is_none());
    }

    #[test]
    fn test_tool_call_defaults_to_empty_arguments() {
        let call: ToolCall = serde_json::from_str(r#"{"function": {"name": "date"}}"#).unwrap();
        assert_eq!(call.name(), "date");
        assert!(call.function.arguments.as_object().unwrap().is_empty());
    }
}
