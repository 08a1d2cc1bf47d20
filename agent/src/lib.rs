//! Tool-using LLM agents with prompt templates, connectors and cached authorization

pub mod agent;
pub mod auth;
pub mod config;
pub mod connectors;
pub mod llm;
pub mod prompt;
pub mod text;
pub mod tools;

pub use agent::{
    Agent, AgentBuilder, AgentError, AgentLimits, AgentRunner, BuildError, FnAgent,
    DEFAULT_MAX_ITERATIONS,
};
pub use auth::{AuthCache, AuthKey, AuthPayload, Clock, EnvTokenSource, ManualClock, SystemClock};
pub use config::RelayConfig;
pub use connectors::{Connector, ConnectorAction, GitHubConnector};
pub use llm::{Llm, LlmError, MockLlm, OllamaClient};
pub use prompt::{resolve, Prompt, PromptError, PromptValue};
pub use tools::{CalculatorTool, DateTool, FunctionTool, Tool, ToolError};
