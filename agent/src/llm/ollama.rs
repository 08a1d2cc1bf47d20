//! Ollama LLM implementation
//!
//! Talks to `/api/chat` over plain HTTP so that tool definitions and
//! native tool calls round-trip without an extra client layer.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Llm, LlmError, LlmReply, Message, ToolCall, ToolSpec};

/// Default request timeout for a single completion
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Information about an available model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified_at: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<FunctionTool<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct FunctionTool<'a> {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: &'a ToolSpec,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

/// Normalise an Ollama URL to `scheme://host:port`
fn base_url(url: &str) -> Result<String, LlmError> {
    let parsed = url::Url::parse(url).map_err(|_| LlmError::InvalidEndpoint(url.to_string()))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| LlmError::InvalidEndpoint(url.to_string()))?;
    let port = parsed.port().unwrap_or(11434);
    Ok(format!("{}://{}:{}", parsed.scheme(), host, port))
}

/// List available models from Ollama
pub async fn list_models(ollama_url: &str) -> Result<Vec<ModelInfo>, LlmError> {
    let api_url = format!("{}/api/tags", base_url(ollama_url)?);

    let response = reqwest::Client::new().get(&api_url).send().await?;
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::Status { status, body });
    }

    let tags: OllamaTagsResponse = response
        .json()
        .await
        .map_err(|e| LlmError::Malformed(e.to_string()))?;

    Ok(tags.models)
}

/// Ollama client wrapper
pub struct OllamaClient {
    base_url: String,
    http_client: reqwest::Client,
    model: String,
}

impl OllamaClient {
    /// Create a new Ollama client with the default timeout
    pub fn new(url: &str, model: &str) -> Result<Self, LlmError> {
        Self::with_timeout(url, model, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client whose requests give up after `timeout`
    pub fn with_timeout(url: &str, model: &str, timeout: Duration) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url(url)?,
            http_client,
            model: model.to_string(),
        })
    }

    /// Get the Ollama URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Llm for OllamaClient {
    async fn chat(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<LlmReply, LlmError> {
        let endpoint = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages,
            tools: tools
                .iter()
                .map(|function| FunctionTool {
                    tool_type: "function",
                    function,
                })
                .collect(),
            stream: false,
        };

        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "sending chat request"
        );

        let response = self
            .http_client
            .post(&endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        endpoint: endpoint.clone(),
                    }
                } else {
                    LlmError::Transport(e)
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LlmError::Unauthorized {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw_body = response.text().await?;
        let parsed: ChatResponse =
            serde_json::from_str(&raw_body).map_err(|e| LlmError::Malformed(e.to_string()))?;

        tracing::debug!(
            content_len = parsed.message.content.len(),
            tool_calls = parsed.message.tool_calls.len(),
            "chat response received"
        );

        Ok(LlmReply {
            content: parsed.message.content,
            tool_calls: parsed.message.tool_calls,
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_adds_default_port() {
        assert_eq!(base_url("http://localhost").unwrap(), "http://localhost:11434");
        assert_eq!(
            base_url("http://gpu-box:8080/ignored/path").unwrap(),
            "http://gpu-box:8080"
        );
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        assert!(matches!(
            OllamaClient::new("not a url", "qwen3:14b"),
            Err(LlmError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_request_wraps_tools_in_function_envelope() {
        let spec = ToolSpec {
            name: "date".to_string(),
            description: "Current date".to_string(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        };
        let messages = vec![Message::user("what day is it?")];
        let request = ChatRequest {
            model: "m",
            messages: &messages,
            tools: vec![FunctionTool {
                tool_type: "function",
                function: &spec,
            }],
            stream: false,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["name"], "date");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_response_with_native_tool_calls() {
        let raw = r#"{"message": {"role": "assistant", "content": "",
            "tool_calls": [{"function": {"name": "calculator", "arguments": {"expression": "1+1"}}}]}}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.message.tool_calls.len(), 1);
        assert_eq!(parsed.message.tool_calls[0].name(), "calculator");
    }
}
