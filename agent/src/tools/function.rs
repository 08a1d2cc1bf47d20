use std::sync::Arc;

use async_trait::async_trait;

use super::{Tool, ToolError};

type Handler = Arc<dyn Fn(serde_json::Value) -> Result<String, ToolError> + Send + Sync>;

/// Wraps a plain closure as a tool
///
/// ```rust,ignore
/// let upper = FunctionTool::new("upper", "Uppercase the `text` argument", |args| {
///     Ok(args["text"].as_str().unwrap_or_default().to_uppercase())
/// });
/// ```
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: serde_json::Value,
    handler: Handler,
}

impl FunctionTool {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(serde_json::Value) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
            handler: Arc::new(handler),
        }
    }

    /// Set the JSON schema advertised to the model
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> serde_json::Value {
        self.parameters.clone()
    }

    async fn call(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        (self.handler)(arguments)
    }
}
