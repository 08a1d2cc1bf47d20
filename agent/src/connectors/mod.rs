//! External-service connectors
//!
//! A connector groups actions against one service. Each action is surfaced
//! to the model as a tool named `{connector}__{action}`. Connectors that
//! declare a toolkit need an [`AuthPayload`] before the first call.

use async_trait::async_trait;

use crate::auth::AuthPayload;
use crate::llm::ToolSpec;
use crate::tools::ToolError;

mod github;

pub use github::GitHubConnector;

/// Separator between connector and action in surfaced tool names
pub const ACTION_SEPARATOR: &str = "__";

/// One action a connector exposes
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorAction {
    pub name: String,
    pub description: String,
    /// JSON schema for the action input
    pub parameters: serde_json::Value,
}

#[async_trait]
pub trait Connector: Send + Sync {
    fn name(&self) -> &str;

    /// Toolkit whose credentials this connector needs, if any
    fn toolkit(&self) -> Option<&str> {
        None
    }

    fn actions(&self) -> Vec<ConnectorAction>;

    async fn run(
        &self,
        action: &str,
        input: serde_json::Value,
        auth: Option<&AuthPayload>,
    ) -> Result<serde_json::Value, ToolError>;

    /// Actions as tool specs, named `{connector}__{action}`
    fn tool_specs(&self) -> Vec<ToolSpec> {
        self.actions()
            .into_iter()
            .map(|action| ToolSpec {
                name: action_tool_name(self.name(), &action.name),
                description: action.description,
                parameters: action.parameters,
            })
            .collect()
    }
}

pub fn action_tool_name(connector: &str, action: &str) -> String {
    format!("{connector}{ACTION_SEPARATOR}{action}")
}

/// Split a surfaced tool name back into `(connector, action)`
pub fn split_action_tool_name(tool_name: &str) -> Option<(&str, &str)> {
    tool_name
        .split_once(ACTION_SEPARATOR)
        .filter(|(connector, action)| !connector.is_empty() && !action.is_empty())
}
