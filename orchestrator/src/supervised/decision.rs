//! Manager decision parsing
//!
//! Managers answer in free text. Parsers turn that text into a [`Decision`];
//! the registry tries them in priority order and the first parser that finds
//! anything decides. A parser that finds two different decisions reports
//! the response as ambiguous. Nothing is ever guessed: a response without a
//! single clear decision becomes [`Decision::Unparseable`].

use std::sync::LazyLock;

use regex::Regex;
use relay_agent::text::json_objects;
use serde::Deserialize;

/// What the manager asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Delegate { agent: String, input: String },
    Complete { output: String },
    Unparseable { reason: String },
}

/// Result of one parser looking at a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAttempt {
    Decided(Decision),
    Ambiguous(String),
    NoMatch,
}

impl ParseAttempt {
    /// Collapse candidate decisions: none, exactly one distinct, or ambiguous
    fn from_candidates(parser: &str, candidates: Vec<Decision>) -> Self {
        let mut distinct: Vec<Decision> = Vec::new();
        for candidate in candidates {
            if !distinct.contains(&candidate) {
                distinct.push(candidate);
            }
        }

        match distinct.len() {
            0 => ParseAttempt::NoMatch,
            1 => ParseAttempt::Decided(distinct.remove(0)),
            n => ParseAttempt::Ambiguous(format!("{parser} found {n} conflicting decisions")),
        }
    }
}

/// Trait for parsing manager decisions from a response
pub trait DecisionParser: Send + Sync {
    fn parse(&self, response: &str) -> ParseAttempt;

    /// Parser name for logging/debugging
    fn name(&self) -> &'static str;

    /// Priority (higher = try first)
    fn priority(&self) -> u32;
}

// ============================================================================
// JSON: {"action": "delegate" | "complete", ...}
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum JsonDecision {
    #[serde(alias = "delegate_to", alias = "assign")]
    Delegate {
        #[serde(alias = "agent_name", alias = "worker", alias = "to")]
        agent: String,
        #[serde(default, alias = "task", alias = "instruction", alias = "message")]
        input: String,
    },
    #[serde(alias = "finish", alias = "final_answer", alias = "done")]
    Complete {
        #[serde(alias = "final_output", alias = "answer", alias = "result")]
        output: String,
    },
}

/// Parses decisions written as JSON objects with an `action` field
pub struct JsonDecisionParser;

impl JsonDecisionParser {
    fn decode(object: &str) -> Option<Decision> {
        let mut value: serde_json::Value = serde_json::from_str(object).ok()?;
        // Normalise "Delegate" / "COMPLETE"
        let action = value.get("action")?.as_str()?.trim().to_lowercase();
        value["action"] = serde_json::Value::String(action);

        match serde_json::from_value(value).ok()? {
            JsonDecision::Delegate { agent, input } if !agent.trim().is_empty() => {
                Some(Decision::Delegate {
                    agent: agent.trim().to_string(),
                    input,
                })
            }
            JsonDecision::Delegate { .. } => None,
            JsonDecision::Complete { output } => Some(Decision::Complete { output }),
        }
    }
}

impl DecisionParser for JsonDecisionParser {
    fn parse(&self, response: &str) -> ParseAttempt {
        let candidates = json_objects(response)
            .into_iter()
            .filter_map(Self::decode)
            .collect();
        ParseAttempt::from_candidates(self.name(), candidates)
    }

    fn name(&self) -> &'static str {
        "JsonDecisionParser"
    }

    fn priority(&self) -> u32 {
        100
    }
}

// ============================================================================
// Tags: <delegate agent="name">input</delegate>, <complete>output</complete>
// ============================================================================

static DELEGATE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?si)<delegate\s+agent\s*=\s*"([^"]*)"\s*>(.*?)</delegate>"#)
        .expect("delegate tag pattern is valid")
});

static COMPLETE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?si)<complete>(.*?)</complete>").expect("complete tag pattern is valid")
});

/// Parses XML-style decision tags
pub struct TaggedDecisionParser;

impl DecisionParser for TaggedDecisionParser {
    fn parse(&self, response: &str) -> ParseAttempt {
        let delegates = DELEGATE_TAG
            .captures_iter(response)
            .filter(|caps| !caps[1].trim().is_empty())
            .map(|caps| Decision::Delegate {
                agent: caps[1].trim().to_string(),
                input: caps[2].trim().to_string(),
            });
        let completions = COMPLETE_TAG
            .captures_iter(response)
            .map(|caps| Decision::Complete {
                output: caps[1].trim().to_string(),
            });

        ParseAttempt::from_candidates(self.name(), delegates.chain(completions).collect())
    }

    fn name(&self) -> &'static str {
        "TaggedDecisionParser"
    }

    fn priority(&self) -> u32 {
        75
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Registry of decision parsers
pub struct DecisionParserRegistry {
    parsers: Vec<Box<dyn DecisionParser>>,
}

impl Default for DecisionParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionParserRegistry {
    /// Create a new registry with all built-in parsers
    pub fn new() -> Self {
        let mut parsers: Vec<Box<dyn DecisionParser>> =
            vec![Box::new(JsonDecisionParser), Box::new(TaggedDecisionParser)];

        parsers.sort_by_key(|p| std::cmp::Reverse(p.priority()));

        Self { parsers }
    }

    /// Parse a manager response; never fails, never guesses
    pub fn parse(&self, response: &str) -> Decision {
        if response.trim().is_empty() {
            return Decision::Unparseable {
                reason: "empty response".to_string(),
            };
        }

        for parser in &self.parsers {
            match parser.parse(response) {
                ParseAttempt::Decided(decision) => {
                    tracing::debug!(parser = parser.name(), ?decision, "manager decision parsed");
                    return decision;
                }
                ParseAttempt::Ambiguous(reason) => return Decision::Unparseable { reason },
                ParseAttempt::NoMatch => continue,
            }
        }

        Decision::Unparseable {
            reason: "no delegate or complete decision found".to_string(),
        }
    }

    /// Get list of registered parser names (for debugging)
    pub fn parser_names(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.name()).collect()
    }
}
