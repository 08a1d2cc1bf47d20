//! Scripted LLM for tests and offline demos
//!
//! Replies are served in the order they were queued. Every request is
//! recorded so tests can assert on what the agent actually sent.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{Llm, LlmError, LlmReply, Message, ToolCall, ToolSpec};

enum Scripted {
    Reply(LlmReply),
    Error(String),
}

/// Mock client that replays a fixed script
pub struct MockLlm {
    model: String,
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl MockLlm {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a plain text reply
    pub fn with_reply(self, content: impl Into<String>) -> Self {
        self.push(Scripted::Reply(LlmReply::text(content)))
    }

    /// Queue a reply carrying a native tool call
    pub fn with_tool_call(self, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        self.push(Scripted::Reply(LlmReply {
            content: String::new(),
            tool_calls: vec![ToolCall::new(name, arguments)],
        }))
    }

    /// Queue a failed invocation
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.push(Scripted::Error(message.into()))
    }

    fn push(self, item: Scripted) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(item);
        self
    }

    /// Conversations received so far, one entry per `chat` call
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of scripted replies not consumed yet
    pub fn remaining(&self) -> usize {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Llm for MockLlm {
    async fn chat(&self, messages: &[Message], _tools: &[ToolSpec]) -> Result<LlmReply, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(messages.to_vec());

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match next {
            Some(Scripted::Reply(reply)) => Ok(reply),
            Some(Scripted::Error(message)) => Err(LlmError::Other(message)),
            None => Err(LlmError::Other("mock script exhausted".to_string())),
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_in_order_then_exhausts() {
        let llm = MockLlm::new("mock").with_reply("first").with_error("boom");

        let first = llm.chat(&[Message::user("hi")], &[]).await.unwrap();
        assert_eq!(first.content, "first");
        assert!(matches!(llm.chat(&[], &[]).await, Err(LlmError::Other(m)) if m == "boom"));
        assert!(llm.chat(&[], &[]).await.is_err());
        assert_eq!(llm.requests().len(), 3);
        assert_eq!(llm.remaining(), 0);
    }

    #[test]
    fn test_tool_call_reply_has_no_content() {
        let llm = MockLlm::new("mock").with_tool_call("date", serde_json::json!({}));
        let reply = tokio_test::block_on(llm.chat(&[], &[])).unwrap();
        assert!(reply.content.is_empty());
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(llm.model(), "mock");
    }
}
