//! Where authorization tokens come from

use std::collections::HashMap;

use super::AuthPayload;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("no token available for toolkit(s): {}", .0.join(", "))]
    MissingTokens(Vec<String>),
}

/// Supplies a token for a toolkit name
pub trait TokenSource: Send + Sync {
    fn token_for(&self, toolkit: &str) -> Option<String>;
}

/// Reads `RELAY_AUTH_<TOOLKIT>`, falling back to `<TOOLKIT>_TOKEN`
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvTokenSource;

impl EnvTokenSource {
    fn env_suffix(toolkit: &str) -> String {
        toolkit
            .trim()
            .to_uppercase()
            .replace(['-', ' ', '.'], "_")
    }

    /// Environment variables consulted for a toolkit, in order
    pub fn variables_for(toolkit: &str) -> [String; 2] {
        let suffix = Self::env_suffix(toolkit);
        [format!("RELAY_AUTH_{suffix}"), format!("{suffix}_TOKEN")]
    }
}

impl TokenSource for EnvTokenSource {
    fn token_for(&self, toolkit: &str) -> Option<String> {
        Self::variables_for(toolkit)
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|token| !token.trim().is_empty())
    }
}

/// Fixed token table, used in tests and embedding
#[derive(Debug, Default, Clone)]
pub struct StaticTokenSource {
    tokens: HashMap<String, String>,
}

impl StaticTokenSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, toolkit: impl AsRef<str>, token: impl Into<String>) -> Self {
        self.tokens
            .insert(toolkit.as_ref().to_lowercase(), token.into());
        self
    }
}

impl TokenSource for StaticTokenSource {
    fn token_for(&self, toolkit: &str) -> Option<String> {
        self.tokens.get(&toolkit.to_lowercase()).cloned()
    }
}

/// Toolkits for which `source` has no token
pub fn missing_tokens<'a, I>(source: &dyn TokenSource, toolkits: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    toolkits
        .into_iter()
        .filter(|toolkit| source.token_for(toolkit).is_none())
        .map(str::to_string)
        .collect()
}

/// Collect a token for every toolkit, failing with the full list of gaps
pub fn authorize<'a, I>(source: &dyn TokenSource, toolkits: I) -> Result<AuthPayload, AuthError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut payload = AuthPayload::new();
    let mut missing = Vec::new();

    for toolkit in toolkits {
        match source.token_for(toolkit) {
            Some(token) => payload = payload.with_token(toolkit, token),
            None => missing.push(toolkit.to_string()),
        }
    }

    if missing.is_empty() {
        Ok(payload)
    } else {
        Err(AuthError::MissingTokens(missing))
    }
}
