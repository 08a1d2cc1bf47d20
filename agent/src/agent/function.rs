use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use super::{AgentError, AgentRunner};

type BoxedRun = Pin<Box<dyn Future<Output = Result<String, AgentError>> + Send>>;
type Handler = Arc<dyn Fn(String) -> BoxedRun + Send + Sync>;

/// Wraps an async closure as an agent
///
/// ```rust,ignore
/// let shout = FnAgent::new("shout", |input| async move { Ok(input.to_uppercase()) });
/// ```
#[derive(Clone)]
pub struct FnAgent {
    name: String,
    description: Option<String>,
    handler: Handler,
}

impl FnAgent {
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, AgentError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            handler: Arc::new(move |input: String| -> BoxedRun { Box::pin(handler(input)) }),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[async_trait]
impl AgentRunner for FnAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    async fn run(&self, input: &str) -> Result<String, AgentError> {
        (self.handler)(input.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closure_agent() {
        let agent = FnAgent::new("suffix", |input| async move { Ok(format!("{input}_done")) })
            .with_description("Appends a marker");

        assert_eq!(agent.name(), "suffix");
        assert_eq!(agent.description(), Some("Appends a marker"));
        assert_eq!(agent.run("A").await.unwrap(), "A_done");
    }
}
