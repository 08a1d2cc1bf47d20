//! Multi-agent workflow orchestration on top of relay-agent
//!
//! This crate provides:
//! - Workflows over an ordered roster of agents
//! - A sequential executor (each agent consumes the previous output)
//! - A supervised executor (a manager agent delegates step by step)
//! - Step-by-step run results with captured failures
//! - TOML workflow definitions for the `relay` CLI
//!
//! # Example
//!
//! ```rust,ignore
//! use relay_orchestrator::{Workflow, WorkflowMode};
//!
//! let workflow = Workflow::builder("report")
//!     .with_mode(WorkflowMode::Supervised)
//!     .with_agents([researcher, writer])
//!     .with_manager(lead)
//!     .build()?;
//!
//! let result = workflow.run("Summarise this week's issues").await;
//! ```

pub mod error;
pub mod loader;
pub mod prompts;
pub mod result;
pub mod roster;
mod sequential;
pub mod supervised;
pub mod workflow;

pub use error::WorkflowError;
pub use loader::{AgentDefinition, BuildEnv, WorkflowDefinition};
pub use result::{Outcome, ResultAggregator, RunError, StepRecord, WorkflowResult, WorkflowSummary};
pub use roster::AgentRoster;
pub use supervised::{Decision, DecisionParserRegistry, HistoryPolicy, SupervisorSettings};
pub use workflow::{Workflow, WorkflowBuilder, WorkflowMode, DEFAULT_MAX_ITERATIONS};

/// Re-export commonly used types from the agent crate
pub use relay_agent::{Agent, AgentBuilder, AgentError, AgentRunner, FnAgent};
