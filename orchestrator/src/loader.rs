//! TOML workflow definitions
//!
//! A definition file names the workflow and describes each agent:
//!
//! ```toml
//! [workflow]
//! name = "issue-digest"
//! mode = "supervised"
//! manager = "lead"
//! max_iterations = 6
//!
//! [[agents]]
//! name = "lead"
//! description = "Coordinates the team"
//!
//! [[agents]]
//! name = "triager"
//! description = "Reads GitHub issues"
//! connectors = ["github"]
//!
//! [agents.prompt]
//! template = "connector_aware_template"
//! ```
//!
//! Anything left unset falls back to the [`RelayConfig`] in effect.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use relay_agent::auth::TokenSource;
use relay_agent::connectors::{action_tool_name, Connector};
use relay_agent::llm::{Llm, LlmError};
use relay_agent::prompt::{ToolDescriptor, Variables};
use relay_agent::tools::{builtin_tool, BUILTIN_TOOLS};
use relay_agent::{AgentBuilder, AgentRunner, AuthCache, GitHubConnector, OllamaClient, Prompt, RelayConfig};
use serde::Deserialize;

use crate::error::WorkflowError;
use crate::supervised::{HistoryPolicy, SupervisorSettings};
use crate::workflow::{Workflow, WorkflowMode};

/// Connector names accepted in definitions
pub const KNOWN_CONNECTORS: &[&str] = &["github"];

/// A parsed workflow file
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowDefinition {
    pub workflow: WorkflowSection,
    #[serde(default)]
    pub agents: Vec<AgentDefinition>,
}

/// The `[workflow]` table
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSection {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_mode")]
    pub mode: WorkflowMode,
    /// Worker roster in order; empty means every agent except the manager
    #[serde(default)]
    pub agents: Vec<String>,
    #[serde(default)]
    pub manager: Option<String>,
    #[serde(default)]
    pub max_iterations: Option<usize>,
    #[serde(default)]
    pub logging: bool,
}

fn default_mode() -> WorkflowMode {
    WorkflowMode::Sequential
}

/// One `[[agents]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Model name; defaults to `[llm] model`
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub prompt: Option<PromptDefinition>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub connectors: Vec<String>,
    #[serde(default)]
    pub max_iterations: Option<usize>,
    #[serde(default)]
    pub fail_on_tool_error: Option<bool>,
}

/// The `[agents.prompt]` table
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptDefinition {
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub raw: Option<String>,
    #[serde(default)]
    pub variables: Variables,
    /// Append "Tools available" and "Connectors available" lines to a raw prompt
    #[serde(default)]
    pub surface_tools: bool,
}

type LlmFactory = dyn Fn(&str) -> Result<Arc<dyn Llm>, LlmError> + Send + Sync;

/// What a definition needs to become a runnable workflow
pub struct BuildEnv {
    config: RelayConfig,
    llm: Arc<LlmFactory>,
    auth: Option<(Arc<AuthCache>, Arc<dyn TokenSource>)>,
}

impl BuildEnv {
    /// Use `llm` to create the model backend for each agent's model name
    pub fn new<F>(config: RelayConfig, llm: F) -> Self
    where
        F: Fn(&str) -> Result<Arc<dyn Llm>, LlmError> + Send + Sync + 'static,
    {
        Self {
            config,
            llm: Arc::new(llm),
            auth: None,
        }
    }

    /// Every agent talks to the Ollama server from `[llm]`
    pub fn ollama(config: RelayConfig) -> Self {
        let url = config.llm.url.clone();
        let timeout = config.llm.timeout();
        Self::new(config, move |model| {
            let client = OllamaClient::with_timeout(&url, model, timeout)?;
            Ok(Arc::new(client) as Arc<dyn Llm>)
        })
    }

    pub fn with_auth(mut self, cache: Arc<AuthCache>, tokens: Arc<dyn TokenSource>) -> Self {
        self.auth = Some((cache, tokens));
        self
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

impl WorkflowDefinition {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("invalid workflow definition")
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read workflow file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("in {}", path.display()))
    }

    fn definition(&self, name: &str) -> Result<&AgentDefinition> {
        self.agents
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| WorkflowError::AgentNotFound(name.to_string()).into())
    }

    /// Worker names in roster order
    pub fn worker_names(&self) -> Vec<&str> {
        if self.workflow.agents.is_empty() {
            self.agents
                .iter()
                .map(|a| a.name.as_str())
                .filter(|name| Some(*name) != self.workflow.manager.as_deref())
                .collect()
        } else {
            self.workflow.agents.iter().map(String::as_str).collect()
        }
    }

    /// Construct every agent and validate the workflow
    pub fn build(&self, env: &BuildEnv) -> Result<Workflow> {
        let mut seen = HashSet::new();
        if let Some(dup) = self.agents.iter().find(|a| !seen.insert(a.name.as_str())) {
            return Err(WorkflowError::DuplicateAgentName(dup.name.clone()).into());
        }

        let section = &self.workflow;
        let config = &env.config.workflow;

        let mut builder = Workflow::builder(&section.name)
            .with_mode(section.mode)
            .with_max_iterations(section.max_iterations.unwrap_or(config.max_iterations))
            .with_logging(section.logging)
            .with_supervisor_settings(SupervisorSettings {
                max_consecutive_unparseable: config.max_consecutive_unparseable,
                history: HistoryPolicy {
                    window: config.history_window,
                    recent_chars: config.recent_output_chars,
                    summary_chars: config.summary_output_chars,
                },
            });
        if let Some(description) = &section.description {
            builder = builder.with_description(description);
        }

        for name in self.worker_names() {
            let agent = build_agent(self.definition(name)?, env, None)?;
            builder = builder.with_agent(agent);
        }

        if let Some(manager) = &section.manager {
            let default_prompt = Prompt::template("manager_template");
            let agent = build_agent(self.definition(manager)?, env, Some(default_prompt))?;
            builder = builder.with_manager(agent);
        }

        let workflow = builder.build()?;
        tracing::debug!(
            workflow = workflow.name(),
            mode = %workflow.mode(),
            agents = ?workflow.agent_names(),
            "workflow built"
        );
        Ok(workflow)
    }
}

fn build_prompt(
    definition: &PromptDefinition,
    tools: Vec<ToolDescriptor>,
    connectors: Vec<String>,
) -> Result<Prompt> {
    let prompt = Prompt::new(definition.template.clone(), definition.raw.clone())?
        .with_variables(definition.variables.clone());
    Ok(if definition.surface_tools {
        prompt.with_tools(tools).with_connectors(connectors)
    } else {
        prompt
    })
}

fn build_agent(
    definition: &AgentDefinition,
    env: &BuildEnv,
    default_prompt: Option<Prompt>,
) -> Result<Arc<dyn AgentRunner>> {
    let name = &definition.name;
    let model = definition
        .model
        .as_deref()
        .unwrap_or(env.config.llm.model.as_str());
    let llm = (env.llm)(model).with_context(|| format!("agent '{name}': cannot create model '{model}'"))?;

    let mut builder = AgentBuilder::new(name)
        .with_llm(llm)
        .with_agent_config(&env.config.agent);
    if let Some(description) = &definition.description {
        builder = builder.with_description(description);
    }
    if let Some(max) = definition.max_iterations {
        builder = builder.with_max_iterations(max);
    }
    if let Some(fail) = definition.fail_on_tool_error {
        builder = builder.with_fail_on_tool_error(fail);
    }

    let mut descriptors = Vec::new();
    let mut connector_names = Vec::new();
    for tool_name in &definition.tools {
        let Some(tool) = builtin_tool(tool_name) else {
            bail!(
                "agent '{name}': unknown tool '{tool_name}' (available: {})",
                BUILTIN_TOOLS.join(", ")
            );
        };
        descriptors.push(ToolDescriptor {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
        });
        builder = builder.with_tool(tool);
    }

    for connector_name in &definition.connectors {
        let connector: Arc<dyn Connector> = match connector_name.to_lowercase().as_str() {
            "github" => Arc::new(GitHubConnector::new()),
            _ => bail!(
                "agent '{name}': unknown connector '{connector_name}' (available: {})",
                KNOWN_CONNECTORS.join(", ")
            ),
        };
        for action in connector.actions() {
            descriptors.push(ToolDescriptor {
                name: action_tool_name(connector.name(), &action.name),
                description: action.description,
            });
        }
        connector_names.push(connector.name().to_string());
        builder = builder.with_connector(connector);
    }

    let prompt = match &definition.prompt {
        Some(prompt) => Some(build_prompt(prompt, descriptors, connector_names)?),
        None => default_prompt,
    };
    if let Some(prompt) = prompt {
        builder = builder.with_prompt(prompt);
    }

    if let Some((cache, tokens)) = &env.auth {
        builder = builder.with_auth(cache.clone(), tokens.clone());
    }

    Ok(Arc::new(builder.build()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_agent::MockLlm;

    /// Every model replies once with "<model> reply"
    fn mock_env() -> BuildEnv {
        BuildEnv::new(RelayConfig::default(), |model| {
            Ok(Arc::new(MockLlm::new(model).with_reply(format!("{model} reply"))) as Arc<dyn Llm>)
        })
    }

    const SEQUENTIAL: &str = r#"
[workflow]
name = "pipeline"
description = "Draft then polish"
max_iterations = 4

[[agents]]
name = "drafter"
model = "draft-model"
tools = ["calculator"]

[[agents]]
name = "polisher"
model = "polish-model"

[agents.prompt]
raw = "You polish text in a {tone} tone."
variables = { tone = "formal" }
"#;

    #[test]
    fn test_parse_defaults() {
        let def = WorkflowDefinition::from_toml(SEQUENTIAL).unwrap();
        assert_eq!(def.workflow.mode, WorkflowMode::Sequential);
        assert!(!def.workflow.logging);
        assert_eq!(def.agents.len(), 2);
        assert_eq!(
            def.agents[1].prompt.as_ref().unwrap().raw.as_deref(),
            Some("You polish text in a {tone} tone.")
        );
        assert_eq!(def.worker_names(), vec!["drafter", "polisher"]);
    }

    #[tokio::test]
    async fn test_build_and_run_sequential() {
        let def = WorkflowDefinition::from_toml(SEQUENTIAL).unwrap();
        let workflow = def.build(&mock_env()).unwrap();

        assert_eq!(workflow.name(), "pipeline");
        assert_eq!(workflow.description(), Some("Draft then polish"));
        assert_eq!(workflow.max_iterations(), 4);

        let result = workflow.run("write something").await;
        assert!(result.is_success());
        assert_eq!(result.final_output(), Some("polish-model reply"));
        assert_eq!(result.steps()[1].input, "draft-model reply");
    }

    #[test]
    fn test_supervised_roster_excludes_manager() {
        let def = WorkflowDefinition::from_toml(
            r#"
[workflow]
name = "team"
mode = "supervised"
manager = "lead"

[[agents]]
name = "lead"

[[agents]]
name = "worker"
"#,
        )
        .unwrap();

        let workflow = def.build(&mock_env()).unwrap();
        let summary = workflow.summary();
        assert_eq!(summary.agents, vec!["worker"]);
        assert_eq!(summary.manager_name.as_deref(), Some("lead"));
        assert_eq!(summary.max_iterations, RelayConfig::default().workflow.max_iterations);
    }

    #[test]
    fn test_unknown_references_are_rejected() {
        let unknown_tool = r#"
[workflow]
name = "w"
[[agents]]
name = "a"
tools = ["teleport"]
"#;
        let err = WorkflowDefinition::from_toml(unknown_tool)
            .unwrap()
            .build(&mock_env())
            .unwrap_err();
        assert!(err.to_string().contains("unknown tool 'teleport'"));

        let unknown_connector = r#"
[workflow]
name = "w"
[[agents]]
name = "a"
connectors = ["jira"]
"#;
        let err = WorkflowDefinition::from_toml(unknown_connector)
            .unwrap()
            .build(&mock_env())
            .unwrap_err();
        assert!(err.to_string().contains("unknown connector 'jira'"));

        let missing_agent = r#"
[workflow]
name = "w"
agents = ["ghost"]
[[agents]]
name = "a"
"#;
        let err = WorkflowDefinition::from_toml(missing_agent)
            .unwrap()
            .build(&mock_env())
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<WorkflowError>(),
            Some(&WorkflowError::AgentNotFound("ghost".into()))
        );
    }

    #[test]
    fn test_duplicate_definitions_are_rejected() {
        let def = WorkflowDefinition::from_toml(
            r#"
[workflow]
name = "w"
[[agents]]
name = "a"
[[agents]]
name = "a"
"#,
        )
        .unwrap();
        let err = def.build(&mock_env()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<WorkflowError>(),
            Some(&WorkflowError::DuplicateAgentName("a".into()))
        );
    }

    #[test]
    fn test_prompt_with_both_sources_is_rejected() {
        let def = WorkflowDefinition::from_toml(
            r#"
[workflow]
name = "w"
[[agents]]
name = "a"
[agents.prompt]
raw = "hi"
template = "basic_prompt_template"
"#,
        )
        .unwrap();
        assert!(def.build(&mock_env()).is_err());
    }

    #[test]
    fn test_demo_definitions_build() {
        for demo in [
            include_str!("../../demos/issue_digest.toml"),
            include_str!("../../demos/two_step.toml"),
        ] {
            let def = WorkflowDefinition::from_toml(demo).unwrap();
            def.build(&mock_env()).unwrap();
        }
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, SEQUENTIAL).unwrap();

        let def = WorkflowDefinition::from_toml_file(&path).unwrap();
        assert_eq!(def.workflow.name, "pipeline");
        assert!(WorkflowDefinition::from_toml_file(dir.path().join("missing.toml")).is_err());
    }
}
