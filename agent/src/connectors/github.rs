//! GitHub REST connector

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use super::{Connector, ConnectorAction};
use crate::auth::AuthPayload;
use crate::tools::{parse_arguments, schema_for, ToolError};

const DEFAULT_API_URL: &str = "https://api.github.com";
const TOOLKIT: &str = "github";
const USER_AGENT: &str = concat!("relay/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Parameter Types
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
struct ListReposParams {
    #[schemars(description = "User or organisation; omit for the authenticated user")]
    owner: Option<String>,

    #[schemars(description = "Maximum number of repositories (default 30)")]
    limit: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RepoParams {
    #[schemars(description = "Repository owner")]
    owner: String,

    #[schemars(description = "Repository name")]
    repo: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ListIssuesParams {
    #[schemars(description = "Repository owner")]
    owner: String,

    #[schemars(description = "Repository name")]
    repo: String,

    #[schemars(description = "Issue state: 'open', 'closed' or 'all'")]
    #[serde(default = "default_state")]
    state: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct IssueCommentParams {
    #[schemars(description = "Repository owner")]
    owner: String,

    #[schemars(description = "Repository name")]
    repo: String,

    #[schemars(description = "Issue or pull request number")]
    issue_number: u64,

    #[schemars(description = "Comment body (markdown)")]
    body: String,
}

fn default_state() -> String {
    "open".to_string()
}

fn require(field: &str, value: &str) -> Result<(), ToolError> {
    if value.trim().is_empty() {
        return Err(ToolError::InvalidArguments(format!("'{field}' must not be empty")));
    }
    Ok(())
}

// ============================================================================
// Connector
// ============================================================================

/// Requests a GitHub API endpoint will serve
enum Request {
    Get(String),
    Post(String, serde_json::Value),
}

pub struct GitHubConnector {
    api_url: String,
    token: Option<String>,
    http_client: reqwest::Client,
}

impl Default for GitHubConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl GitHubConnector {
    pub fn new() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            http_client: reqwest::Client::new(),
        }
    }

    /// Point at a GitHub Enterprise API root
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Token used when no auth payload is supplied
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Validate input and map an action to its request
    fn plan(&self, action: &str, input: serde_json::Value) -> Result<Request, ToolError> {
        let api = &self.api_url;
        match action {
            "list_repos" => {
                let params: ListReposParams = parse_arguments(input)?;
                let limit = params.limit.unwrap_or(30).clamp(1, 100);
                let url = match params.owner.as_deref().map(str::trim) {
                    Some(owner) if !owner.is_empty() => {
                        format!("{api}/users/{owner}/repos?per_page={limit}")
                    }
                    _ => format!("{api}/user/repos?per_page={limit}"),
                };
                Ok(Request::Get(url))
            }
            "list_issues" => {
                let params: ListIssuesParams = parse_arguments(input)?;
                require("owner", &params.owner)?;
                require("repo", &params.repo)?;
                if !matches!(params.state.as_str(), "open" | "closed" | "all") {
                    return Err(ToolError::InvalidArguments(format!(
                        "unknown issue state '{}'",
                        params.state
                    )));
                }
                Ok(Request::Get(format!(
                    "{api}/repos/{}/{}/issues?state={}",
                    params.owner, params.repo, params.state
                )))
            }
            "get_repo_info" => {
                let params: RepoParams = parse_arguments(input)?;
                require("owner", &params.owner)?;
                require("repo", &params.repo)?;
                Ok(Request::Get(format!(
                    "{api}/repos/{}/{}",
                    params.owner, params.repo
                )))
            }
            "create_issue_comment" => {
                let params: IssueCommentParams = parse_arguments(input)?;
                require("owner", &params.owner)?;
                require("repo", &params.repo)?;
                require("body", &params.body)?;
                Ok(Request::Post(
                    format!(
                        "{api}/repos/{}/{}/issues/{}/comments",
                        params.owner, params.repo, params.issue_number
                    ),
                    serde_json::json!({ "body": params.body }),
                ))
            }
            other => Err(ToolError::InvalidArguments(format!(
                "unknown github action '{other}'"
            ))),
        }
    }

    async fn send(&self, request: Request, token: Option<&str>) -> Result<serde_json::Value, ToolError> {
        let builder = match request {
            Request::Get(url) => self.http_client.get(url),
            Request::Post(url, body) => self.http_client.post(url).json(&body),
        };
        let mut builder = builder
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ToolError::Failed(format!("GitHub API request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ToolError::Unauthorized {
                toolkit: TOOLKIT.to_string(),
                message: "GitHub rejected the token".to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Failed(format!(
                "GitHub API error: HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ToolError::Failed(format!("Failed to parse GitHub response: {e}")))
    }
}

#[async_trait]
impl Connector for GitHubConnector {
    fn name(&self) -> &str {
        "github"
    }

    fn toolkit(&self) -> Option<&str> {
        Some(TOOLKIT)
    }

    fn actions(&self) -> Vec<ConnectorAction> {
        let action = |name: &str, description: &str, parameters: serde_json::Value| ConnectorAction {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        };
        vec![
            action(
                "list_repos",
                "List repositories of a user or of the authenticated account",
                schema_for::<ListReposParams>(),
            ),
            action(
                "list_issues",
                "List issues of a repository",
                schema_for::<ListIssuesParams>(),
            ),
            action(
                "get_repo_info",
                "Get metadata about a repository",
                schema_for::<RepoParams>(),
            ),
            action(
                "create_issue_comment",
                "Comment on an issue or pull request",
                schema_for::<IssueCommentParams>(),
            ),
        ]
    }

    async fn run(
        &self,
        action: &str,
        input: serde_json::Value,
        auth: Option<&AuthPayload>,
    ) -> Result<serde_json::Value, ToolError> {
        let request = self.plan(action, input)?;
        let token = auth
            .and_then(|payload| payload.token_for(TOOLKIT))
            .or(self.token.as_deref());
        tracing::debug!(action, authenticated = token.is_some(), "github request");
        self.send(request, token).await
    }
}
