//! AgentBuilder - Ergonomic builder pattern for Agent construction
//!
//! # Example
//!
//! ```rust,ignore
//! use relay_agent::{AgentBuilder, OllamaClient, CalculatorTool, Prompt};
//!
//! let agent = AgentBuilder::new("math")
//!     .with_description("Answers arithmetic questions.")
//!     .with_llm(Arc::new(OllamaClient::new("http://localhost:11434", "qwen3:14b")?))
//!     .with_prompt(Prompt::template("tool_aware_template"))
//!     .with_tool(Arc::new(CalculatorTool))
//!     .build()?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use crate::auth::{AuthCache, TokenSource};
use crate::config::AgentSectionConfig;
use crate::connectors::Connector;
use crate::llm::Llm;
use crate::prompt::{resolve, Prompt, PromptError, PromptValue, Variables, DEFAULT_INSTRUCTION};
use crate::tools::Tool;

use super::{parsers::ToolCallParserRegistry, Agent, AgentAuth, AgentLimits};

/// Reasons an agent cannot be constructed
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("agent name must not be empty")]
    MissingName,

    #[error("agent '{0}' has no model - use .with_llm(...)")]
    MissingModel(String),

    #[error("agent '{agent}' exposes tool '{tool}' more than once")]
    DuplicateTool { agent: String, tool: String },

    #[error("agent '{0}' must allow at least one iteration")]
    ZeroIterations(String),

    #[error("agent '{agent}': {source}")]
    Prompt {
        agent: String,
        #[source]
        source: PromptError,
    },
}

/// Builder for constructing Agent instances
pub struct AgentBuilder {
    name: String,
    description: Option<String>,
    llm: Option<Arc<dyn Llm>>,
    prompt: Option<Prompt>,
    tools: Vec<Arc<dyn Tool>>,
    connectors: Vec<Arc<dyn Connector>>,
    limits: AgentLimits,
    auth: Option<AgentAuth>,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            llm: None,
            prompt: None,
            tools: Vec::new(),
            connectors: Vec::new(),
            limits: AgentLimits::default(),
            auth: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the model backend
    pub fn with_llm(mut self, llm: Arc<dyn Llm>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_prompt(mut self, prompt: Prompt) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connectors.push(connector);
        self
    }

    /// Set maximum iterations for tool-calling loop
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.limits.max_iterations = max;
        self
    }

    pub fn with_fail_on_tool_error(mut self, fail: bool) -> Self {
        self.limits.fail_on_tool_error = fail;
        self
    }

    /// Apply limits from an AgentSectionConfig
    pub fn with_agent_config(mut self, config: &AgentSectionConfig) -> Self {
        self.limits.max_iterations = config.max_iterations;
        self.limits.fail_on_tool_error = config.fail_on_tool_error;
        self
    }

    /// Authorize connector toolkits through `cache`, resolving misses from `tokens`
    pub fn with_auth(mut self, cache: Arc<AuthCache>, tokens: Arc<dyn TokenSource>) -> Self {
        self.auth = Some(AgentAuth { cache, tokens });
        self
    }

    /// Bindings every prompt can reference
    fn prompt_context(&self) -> Variables {
        let list_or = |names: Vec<String>, empty: &str| {
            if names.is_empty() {
                PromptValue::Text(empty.to_string())
            } else {
                PromptValue::List(names)
            }
        };

        let mut vars = Variables::new();
        vars.insert("name".into(), PromptValue::Text(self.name.clone()));
        vars.insert(
            "description".into(),
            PromptValue::Text(self.description.clone().unwrap_or_default()),
        );
        vars.insert(
            "tools".into(),
            list_or(
                self.tools.iter().map(|t| t.name().to_string()).collect(),
                "no tools",
            ),
        );
        vars.insert(
            "connectors".into(),
            list_or(
                self.connectors.iter().map(|c| c.name().to_string()).collect(),
                "no connectors",
            ),
        );
        vars
    }

    /// Build the Agent
    ///
    /// Validates the configuration and resolves the system instruction, so
    /// prompt problems surface here rather than on the first run.
    pub fn build(self) -> Result<Agent, BuildError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(BuildError::MissingName);
        }
        if self.limits.max_iterations == 0 {
            return Err(BuildError::ZeroIterations(name));
        }

        let specs: Vec<_> = self
            .tools
            .iter()
            .map(|t| t.spec())
            .chain(self.connectors.iter().flat_map(|c| c.tool_specs()))
            .collect();
        let mut seen = HashSet::new();
        if let Some(dup) = specs.iter().find(|s| !seen.insert(s.name.as_str())) {
            return Err(BuildError::DuplicateTool {
                agent: name,
                tool: dup.name.clone(),
            });
        }

        let context = self.prompt_context();
        let instruction = match &self.prompt {
            Some(prompt) => resolve(prompt, &context),
            None => {
                let mut context = context;
                if self.description.is_none() {
                    context.insert(
                        "description".into(),
                        PromptValue::Text("Help the user with their request.".into()),
                    );
                }
                resolve(&Prompt::raw(DEFAULT_INSTRUCTION), &context)
            }
        }
        .map_err(|source| BuildError::Prompt {
            agent: name.clone(),
            source,
        })?;

        let llm = self.llm.ok_or_else(|| BuildError::MissingModel(name.clone()))?;

        tracing::debug!(
            agent = %name,
            model = llm.model(),
            tools = specs.len(),
            "agent built"
        );

        Ok(Agent {
            name,
            description: self.description,
            llm,
            instruction,
            tools: self.tools,
            connectors: self.connectors,
            specs,
            limits: self.limits,
            auth: self.auth,
            parser_registry: ToolCallParserRegistry::new(),
        })
    }
}
