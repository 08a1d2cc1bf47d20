//! Prompt resolution
//!
//! A [`Prompt`] is either a reference to a built-in template or a raw
//! instruction, plus variable bindings. [`resolve`] turns it into the final
//! system instruction. Placeholders are written `{identifier}`.
//!
//! Template mode is strict: every placeholder must be bound. Raw mode is
//! lenient: unbound braces are left as written, so raw prompts may contain
//! JSON or code.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

mod templates;

pub use templates::TEMPLATE_NAMES;
pub(crate) use templates::DEFAULT_INSTRUCTION;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    #[error("prompt template '{0}' not found")]
    TemplateNotFound(String),

    #[error("template '{template}' requires variable '{variable}'")]
    MissingVariable { template: String, variable: String },

    #[error("invalid prompt: {0}")]
    InvalidPrompt(String),
}

/// A variable binding: a string or a list of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptValue {
    Text(String),
    List(Vec<String>),
}

impl fmt::Display for PromptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptValue::Text(text) => f.write_str(text),
            PromptValue::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

impl From<&str> for PromptValue {
    fn from(value: &str) -> Self {
        PromptValue::Text(value.to_string())
    }
}

impl From<String> for PromptValue {
    fn from(value: String) -> Self {
        PromptValue::Text(value)
    }
}

impl From<Vec<String>> for PromptValue {
    fn from(value: Vec<String>) -> Self {
        PromptValue::List(value)
    }
}

pub type Variables = BTreeMap<String, PromptValue>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSource {
    Template(String),
    Raw(String),
}

/// Tool surfaced in a raw prompt's "Tools available" line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    source: PromptSource,
    variables: Variables,
    tools: Vec<ToolDescriptor>,
    connectors: Vec<String>,
}

impl Prompt {
    /// Exactly one of `template` and `raw` must be given
    pub fn new(template: Option<String>, raw: Option<String>) -> Result<Self, PromptError> {
        let source = match (template, raw) {
            (Some(template), None) => PromptSource::Template(template),
            (None, Some(raw)) => PromptSource::Raw(raw),
            (Some(_), Some(_)) => {
                return Err(PromptError::InvalidPrompt(
                    "provide only one of template or raw prompt, not both".to_string(),
                ))
            }
            (None, None) => {
                return Err(PromptError::InvalidPrompt(
                    "either a template or a raw prompt must be provided".to_string(),
                ))
            }
        };
        Ok(Self {
            source,
            variables: Variables::new(),
            tools: Vec::new(),
            connectors: Vec::new(),
        })
    }

    pub fn template(identifier: impl Into<String>) -> Self {
        Self {
            source: PromptSource::Template(identifier.into()),
            variables: Variables::new(),
            tools: Vec::new(),
            connectors: Vec::new(),
        }
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            source: PromptSource::Raw(text.into()),
            variables: Variables::new(),
            tools: Vec::new(),
            connectors: Vec::new(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<PromptValue>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables.extend(variables);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }

    /// Connector names surfaced in a raw prompt's "Connectors available" line
    pub fn with_connectors(mut self, connectors: Vec<String>) -> Self {
        self.connectors = connectors;
        self
    }

    pub fn source(&self) -> &PromptSource {
        &self.source
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn connectors(&self) -> &[String] {
        &self.connectors
    }
}

/// Resolve a prompt to its instruction text.
///
/// `context` holds ambient bindings (agent name, description, tools,
/// connectors); the prompt's own variables take precedence.
pub fn resolve(prompt: &Prompt, context: &Variables) -> Result<String, PromptError> {
    let lookup = |name: &str| prompt.variables.get(name).or_else(|| context.get(name));

    match &prompt.source {
        PromptSource::Template(identifier) => {
            let text = templates::template_text(identifier)
                .ok_or_else(|| PromptError::TemplateNotFound(identifier.clone()))?;

            if let Some(missing) = PLACEHOLDER
                .captures_iter(text)
                .map(|caps| caps[1].to_string())
                .find(|name| lookup(name.as_str()).is_none())
            {
                return Err(PromptError::MissingVariable {
                    template: identifier.clone(),
                    variable: missing,
                });
            }

            Ok(substitute(text, &lookup))
        }
        PromptSource::Raw(text) => {
            let mut rendered = substitute(text, &lookup);
            if !prompt.tools.is_empty() {
                let names: Vec<&str> = prompt.tools.iter().map(|t| t.name.as_str()).collect();
                rendered.push_str("\nTools available: ");
                rendered.push_str(&names.join(", "));
            }
            if !prompt.connectors.is_empty() {
                rendered.push_str("\nConnectors available: ");
                rendered.push_str(&prompt.connectors.join(", "));
            }
            Ok(rendered)
        }
    }
}

/// Replace bound placeholders, leaving unbound ones as written
fn substitute<'a>(text: &str, lookup: &dyn Fn(&str) -> Option<&'a PromptValue>) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| match lookup(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
