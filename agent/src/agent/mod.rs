//! Agent module - LLM with tool-calling capabilities
//!
//! This implements the "tool-using agent loop" where:
//! 1. The resolved instruction and the input are sent to the model
//! 2. The model decides whether to call tools or respond directly
//! 3. Tool and connector results are fed back to the model
//! 4. The loop continues until the model responds without tool calls or the
//!    iteration limit is reached

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::{authorize, AuthCache, AuthKey, AuthPayload, TokenSource};
use crate::connectors::{split_action_tool_name, Connector};
use crate::llm::{Llm, LlmError, Message, ToolCall, ToolSpec};
use crate::text::truncate_chars;
use crate::tools::{Tool, ToolError};

// Modular parser system for handling different tool call formats
pub mod parsers;
use parsers::ToolCallParserRegistry;

mod builder;
mod function;

pub use builder::{AgentBuilder, BuildError};
pub use function::FnAgent;

/// Maximum number of tool-calling iterations to prevent infinite loops
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Errors that end an agent run
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("model invocation failed: {0}")]
    ModelInvocation(#[from] LlmError),

    #[error("tool '{tool}' failed: {source}")]
    ToolExecution {
        tool: String,
        #[source]
        source: ToolError,
    },
}

/// Something a workflow can hand a piece of text to
///
/// [`Agent`] is the model-backed implementation; [`FnAgent`] wraps a closure.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    async fn run(&self, input: &str) -> Result<String, AgentError>;
}

/// Execution limits for one agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentLimits {
    pub max_iterations: usize,
    /// Abort on any tool error instead of feeding it back to the model
    pub fail_on_tool_error: bool,
}

impl Default for AgentLimits {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            fail_on_tool_error: false,
        }
    }
}

/// Auth cache and token source used to authorize connector toolkits
#[derive(Clone)]
pub(crate) struct AgentAuth {
    pub cache: Arc<AuthCache>,
    pub tokens: Arc<dyn TokenSource>,
}

/// An agent that can use tools and connectors
pub struct Agent {
    name: String,
    description: Option<String>,
    llm: Arc<dyn Llm>,
    instruction: String,
    tools: Vec<Arc<dyn Tool>>,
    connectors: Vec<Arc<dyn Connector>>,
    specs: Vec<ToolSpec>,
    limits: AgentLimits,
    auth: Option<AgentAuth>,
    parser_registry: ToolCallParserRegistry,
}

/// Per-run authorization state: resolved at most once per run
#[derive(Default)]
struct RunAuth {
    resolved: bool,
    payload: Option<AuthPayload>,
}

impl Agent {
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    /// Get the current model name
    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// The resolved system instruction
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn limits(&self) -> AgentLimits {
        self.limits
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn connector_names(&self) -> Vec<&str> {
        self.connectors.iter().map(|c| c.name()).collect()
    }

    /// Specs surfaced to the model: tools first, then connector actions
    pub fn tool_specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Distinct toolkits required by this agent's connectors, sorted
    fn toolkits(&self) -> Vec<String> {
        let mut toolkits: Vec<String> = self
            .connectors
            .iter()
            .filter_map(|c| c.toolkit())
            .map(str::to_lowercase)
            .collect();
        toolkits.sort();
        toolkits.dedup();
        toolkits
    }

    /// Obtain the auth payload for this agent's toolkits, going through the cache
    fn authorize(&self) -> Result<Option<AuthPayload>, ToolError> {
        let toolkits = self.toolkits();
        let Some(auth) = self.auth.as_ref().filter(|_| !toolkits.is_empty()) else {
            return Ok(None);
        };

        let key = AuthKey::new(self.name.as_str(), &toolkits);
        if let Some(payload) = auth.cache.get(&key) {
            tracing::debug!(agent = %self.name, key = %key, "auth cache hit");
            return Ok(Some(payload));
        }

        let payload = authorize(auth.tokens.as_ref(), toolkits.iter().map(String::as_str))
            .map_err(|e| ToolError::Unauthorized {
                toolkit: toolkits.join(","),
                message: e.to_string(),
            })?;
        auth.cache
            .put(key, payload.clone(), auth.cache.default_validity());
        Ok(Some(payload))
    }

    async fn call_connector(
        &self,
        connector: &dyn Connector,
        action: &str,
        arguments: serde_json::Value,
        run_auth: &mut RunAuth,
    ) -> Result<String, ToolError> {
        if !run_auth.resolved {
            run_auth.payload = self.authorize()?;
            run_auth.resolved = true;
        }

        let value = connector
            .run(action, arguments, run_auth.payload.as_ref())
            .await?;
        Ok(match value {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        })
    }

    /// Route a call to the matching tool or connector action
    async fn execute_tool_call(
        &self,
        call: &ToolCall,
        run_auth: &mut RunAuth,
    ) -> Result<String, ToolError> {
        let name = call.name();
        let arguments = call.function.arguments.clone();

        if let Some(tool) = self.tools.iter().find(|t| t.name() == name) {
            return tool.call(arguments).await;
        }

        if let Some((connector_name, action)) = split_action_tool_name(name) {
            if let Some(connector) = self.connectors.iter().find(|c| c.name() == connector_name) {
                return self
                    .call_connector(connector.as_ref(), action, arguments, run_auth)
                    .await;
            }
        }

        Err(ToolError::Failed(format!("unknown tool '{name}'")))
    }

    /// Tool calls in a reply: native calls first, then calls parsed from content
    fn collect_tool_calls(&self, content: &str, native: Vec<ToolCall>) -> Vec<ToolCall> {
        if !native.is_empty() {
            return native;
        }
        if self.specs.is_empty() {
            return Vec::new();
        }
        match self.parser_registry.parse(content) {
            Some((call, parser_name)) => {
                tracing::debug!(
                    agent = %self.name,
                    parser = parser_name,
                    tool = call.name(),
                    "parsed tool call from content"
                );
                vec![call]
            }
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl AgentRunner for Agent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    async fn run(&self, input: &str) -> Result<String, AgentError> {
        let mut messages = vec![Message::system(&self.instruction), Message::user(input)];
        let mut run_auth = RunAuth::default();
        let mut last_content: Option<String> = None;

        tracing::debug!(agent = %self.name, model = self.model(), "agent run started");

        for iteration in 1..=self.limits.max_iterations {
            tracing::debug!(agent = %self.name, iteration, "agent iteration");

            let reply = self.llm.chat(&messages, &self.specs).await?;
            let tool_calls = self.collect_tool_calls(&reply.content, reply.tool_calls);

            if tool_calls.is_empty() {
                tracing::debug!(agent = %self.name, iteration, "agent responding without tool calls");
                return Ok(reply.content);
            }

            if !reply.content.trim().is_empty() {
                last_content = Some(reply.content.clone());
            }
            messages.push(Message::assistant_with_calls(reply.content, tool_calls.clone()));

            for call in &tool_calls {
                tracing::debug!(
                    agent = %self.name,
                    tool = call.name(),
                    args = %truncate_chars(&call.function.arguments.to_string(), 200),
                    "calling tool"
                );

                let result = match self.execute_tool_call(call, &mut run_auth).await {
                    Ok(output) => output,
                    Err(e) if e.is_fatal() || self.limits.fail_on_tool_error => {
                        return Err(AgentError::ToolExecution {
                            tool: call.name().to_string(),
                            source: e,
                        });
                    }
                    Err(e) => {
                        tracing::debug!(agent = %self.name, tool = call.name(), error = %e, "tool error fed back");
                        format!("Error calling tool {}: {}", call.name(), e)
                    }
                };
                messages.push(Message::tool(result));
            }
        }

        tracing::warn!(
            agent = %self.name,
            max_iterations = self.limits.max_iterations,
            "agent reached max iterations, stopping"
        );

        Ok(last_content.unwrap_or_else(|| {
            format!(
                "Agent '{}' reached maximum iterations ({}) without completing",
                self.name, self.limits.max_iterations
            )
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthCache, StaticTokenSource};
    use crate::connectors::ConnectorAction;
    use crate::llm::{MockLlm, Role};
    use crate::tools::{CalculatorTool, FunctionTool};
    use serde_json::json;
    use std::sync::Mutex;

    fn agent_with(llm: Arc<MockLlm>) -> AgentBuilder {
        AgentBuilder::new("solver")
            .with_description("Solves arithmetic.")
            .with_llm(llm)
    }

    /// Connector that echoes the token it was given
    struct EchoConnector {
        seen: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl Connector for EchoConnector {
        fn name(&self) -> &str {
            "echo"
        }

        fn toolkit(&self) -> Option<&str> {
            Some("echo")
        }

        fn actions(&self) -> Vec<ConnectorAction> {
            vec![ConnectorAction {
                name: "say".into(),
                description: "Echo the input".into(),
                parameters: json!({"type": "object"}),
            }]
        }

        async fn run(
            &self,
            _action: &str,
            input: serde_json::Value,
            auth: Option<&AuthPayload>,
        ) -> Result<serde_json::Value, ToolError> {
            let token = auth.and_then(|a| a.token_for("echo")).map(str::to_string);
            self.seen.lock().unwrap().push(token);
            Ok(input)
        }
    }

    #[tokio::test]
    async fn test_plain_reply_is_returned() {
        let llm = Arc::new(MockLlm::new("m").with_reply("42"));
        let agent = agent_with(llm.clone()).build().unwrap();

        assert_eq!(agent.run("what is 6*7?").await.unwrap(), "42");

        let request = &llm.requests()[0];
        assert_eq!(request[0].role, Role::System);
        assert_eq!(request[0].content, agent.instruction());
        assert_eq!(request[1].content, "what is 6*7?");
    }

    #[tokio::test]
    async fn test_native_tool_call_result_is_fed_back() {
        let llm = Arc::new(
            MockLlm::new("m")
                .with_tool_call("calculator", json!({"expression": "6*7"}))
                .with_reply("The answer is 42"),
        );
        let agent = agent_with(llm.clone())
            .with_tool(Arc::new(CalculatorTool))
            .build()
            .unwrap();

        assert_eq!(agent.run("6*7").await.unwrap(), "The answer is 42");

        let second = &llm.requests()[1];
        let tool_msg = second.last().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.content, "The result of the calculation is: 42");
    }

    #[tokio::test]
    async fn test_tool_call_parsed_from_content() {
        let llm = Arc::new(
            MockLlm::new("m")
                .with_reply(r#"{"name": "calculator", "arguments": {"expression": "2+2"}}"#)
                .with_reply("4"),
        );
        let agent = agent_with(llm.clone())
            .with_tool(Arc::new(CalculatorTool))
            .build()
            .unwrap();

        assert_eq!(agent.run("2+2").await.unwrap(), "4");
        assert_eq!(
            llm.requests()[1].last().unwrap().content,
            "The result of the calculation is: 4"
        );
    }

    #[tokio::test]
    async fn test_json_content_without_tools_is_an_answer() {
        let reply = r#"{"name": "calculator", "arguments": {}}"#;
        let llm = Arc::new(MockLlm::new("m").with_reply(reply));
        let agent = agent_with(llm).build().unwrap();

        assert_eq!(agent.run("x").await.unwrap(), reply);
    }

    #[tokio::test]
    async fn test_unknown_tool_and_tool_errors_are_fed_back() {
        let llm = Arc::new(
            MockLlm::new("m")
                .with_tool_call("teleport", json!({}))
                .with_tool_call("calculator", json!({"expression": "1/0"}))
                .with_reply("gave up"),
        );
        let agent = agent_with(llm.clone())
            .with_tool(Arc::new(CalculatorTool))
            .build()
            .unwrap();

        assert_eq!(agent.run("x").await.unwrap(), "gave up");
        let requests = llm.requests();
        assert!(requests[1].last().unwrap().content.contains("unknown tool 'teleport'"));
        assert!(requests[2]
            .last()
            .unwrap()
            .content
            .starts_with("Error calling tool calculator"));
    }

    #[tokio::test]
    async fn test_fail_on_tool_error_aborts() {
        let llm = Arc::new(MockLlm::new("m").with_tool_call("calculator", json!({})));
        let agent = agent_with(llm)
            .with_tool(Arc::new(CalculatorTool))
            .with_fail_on_tool_error(true)
            .build()
            .unwrap();

        match agent.run("x").await {
            Err(AgentError::ToolExecution { tool, .. }) => assert_eq!(tool, "calculator"),
            other => panic!("expected ToolExecution, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fatal_tool_error_aborts() {
        let llm = Arc::new(MockLlm::new("m").with_tool_call("explode", json!({})));
        let agent = agent_with(llm)
            .with_tool(Arc::new(FunctionTool::new("explode", "Always fails", |_| {
                Err(ToolError::Fatal("disk on fire".into()))
            })))
            .build()
            .unwrap();

        let err = agent.run("x").await.unwrap_err();
        assert!(matches!(err, AgentError::ToolExecution { .. }));
        assert!(err.to_string().contains("disk on fire"));
    }

    #[tokio::test]
    async fn test_model_error_is_model_invocation() {
        let llm = Arc::new(MockLlm::new("m").with_error("connection refused"));
        let agent = agent_with(llm).build().unwrap();

        assert!(matches!(
            agent.run("x").await,
            Err(AgentError::ModelInvocation(_))
        ));
    }

    #[tokio::test]
    async fn test_iteration_limit_returns_best_effort_text() {
        let llm = Arc::new(
            MockLlm::new("m")
                .with_tool_call("calculator", json!({"expression": "1+1"}))
                .with_tool_call("calculator", json!({"expression": "2+2"})),
        );
        let agent = agent_with(llm)
            .with_tool(Arc::new(CalculatorTool))
            .with_max_iterations(2)
            .build()
            .unwrap();

        assert_eq!(
            agent.run("x").await.unwrap(),
            "Agent 'solver' reached maximum iterations (2) without completing"
        );
    }

    #[tokio::test]
    async fn test_connector_authorized_once_per_run_through_cache() {
        let llm = Arc::new(
            MockLlm::new("m")
                .with_tool_call("echo__say", json!({"text": "a"}))
                .with_tool_call("echo__say", json!({"text": "b"}))
                .with_reply("done"),
        );
        let connector = Arc::new(EchoConnector {
            seen: Mutex::new(Vec::new()),
        });
        let cache = Arc::new(AuthCache::new());
        let agent = agent_with(llm.clone())
            .with_connector(connector.clone())
            .with_auth(
                cache.clone(),
                Arc::new(StaticTokenSource::new().with_token("echo", "secret")),
            )
            .build()
            .unwrap();

        assert_eq!(agent.run("x").await.unwrap(), "done");
        assert_eq!(
            *connector.seen.lock().unwrap(),
            vec![Some("secret".to_string()), Some("secret".to_string())]
        );
        assert!(cache.get(&AuthKey::new("solver", ["echo"])).is_some());
        assert_eq!(
            llm.requests()[1].last().unwrap().content,
            r#"{"text":"a"}"#
        );
    }

    #[tokio::test]
    async fn test_missing_connector_token_is_tool_execution_error() {
        let llm = Arc::new(MockLlm::new("m").with_tool_call("echo__say", json!({})));
        let agent = agent_with(llm)
            .with_connector(Arc::new(EchoConnector {
                seen: Mutex::new(Vec::new()),
            }))
            .with_auth(Arc::new(AuthCache::new()), Arc::new(StaticTokenSource::new()))
            .build()
            .unwrap();

        match agent.run("x").await {
            Err(AgentError::ToolExecution { tool, source }) => {
                assert_eq!(tool, "echo__say");
                assert!(matches!(source, ToolError::Unauthorized { .. }));
            }
            other => panic!("expected ToolExecution, got {other:?}"),
        }
    }
}
