//! Tools an agent may call while generating
//!
//! A tool is a named async function over a JSON arguments object. Its
//! schema is surfaced to the model as a [`ToolSpec`].

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;

use crate::llm::ToolSpec;

mod calculator;
mod date;
mod function;

pub use calculator::{evaluate, CalculatorTool};
pub use date::DateTool;
pub use function::FunctionTool;

/// Errors raised by tools and connectors
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Arguments did not match what the tool expects; the model can retry
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The call failed but the model may recover
    #[error("{0}")]
    Failed(String),

    /// The call failed and the agent run cannot continue
    #[error("fatal: {0}")]
    Fatal(String),

    /// Authorization for a connector toolkit could not be obtained
    #[error("authorization failed for toolkit '{toolkit}': {message}")]
    Unauthorized { toolkit: String, message: String },
}

impl ToolError {
    /// Whether the agent must abort instead of feeding the error back
    pub fn is_fatal(&self) -> bool {
        matches!(self, ToolError::Fatal(_) | ToolError::Unauthorized { .. })
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema for the arguments object
    fn parameters(&self) -> serde_json::Value;

    async fn call(&self, arguments: serde_json::Value) -> Result<String, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Look up a built-in tool by the name used in workflow definitions
pub fn builtin_tool(name: &str) -> Option<Arc<dyn Tool>> {
    match name {
        "calculator" | "calculator_tool" => Some(Arc::new(CalculatorTool)),
        "date" | "date_tool" => Some(Arc::new(DateTool)),
        _ => None,
    }
}

/// Names accepted by [`builtin_tool`]
pub const BUILTIN_TOOLS: &[&str] = &["calculator", "date"];

/// Generate a model-friendly JSON schema for an arguments type
pub fn schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(&schema)
        .map(|value| clean_schema(&value))
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

/// Remove schema keys that confuse smaller models
pub fn clean_schema(schema: &serde_json::Value) -> serde_json::Value {
    match schema {
        serde_json::Value::Object(obj) => serde_json::Value::Object(
            obj.iter()
                .filter(|(key, _)| !matches!(key.as_str(), "$schema" | "title" | "additionalProperties"))
                .map(|(key, value)| (key.clone(), clean_schema(value)))
                .collect(),
        ),
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(clean_schema).collect())
        }
        other => other.clone(),
    }
}

/// Deserialize tool arguments, mapping failures to [`ToolError::InvalidArguments`]
pub(crate) fn parse_arguments<T: serde::de::DeserializeOwned>(
    arguments: serde_json::Value,
) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_schema_strips_noise_recursively() {
        let schema = serde_json::json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "title": "Args",
            "type": "object",
            "properties": {
                "nested": {"title": "Nested", "type": "object", "additionalProperties": false}
            }
        });

        let cleaned = clean_schema(&schema);
        assert!(cleaned.get("$schema").is_none());
        assert!(cleaned.get("title").is_none());
        assert_eq!(cleaned["properties"]["nested"], serde_json::json!({"type": "object"}));
    }

    #[test]
    fn test_builtin_lookup() {
        for name in BUILTIN_TOOLS {
            assert!(builtin_tool(name).is_some(), "missing builtin {name}");
        }
        assert!(builtin_tool("code_exec").is_none());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(ToolError::Fatal("x".into()).is_fatal());
        assert!(!ToolError::Failed("x".into()).is_fatal());
        assert!(!ToolError::InvalidArguments("x".into()).is_fatal());
    }
}
