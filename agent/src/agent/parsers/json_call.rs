//! JSON tool call parser
//!
//! Accepts the three spellings models commonly print:
//! `{"name": .., "arguments": {..}}`, `{"tool": .., "args": {..}}` and
//! `{"function": .., "parameters": {..}}`, optionally inside a fenced block.

use serde::Deserialize;

use super::ToolCallParser;
use crate::llm::ToolCall;
use crate::text::json_objects;

/// Parser for JSON-shaped tool calls
pub struct JsonCallParser;

#[derive(Deserialize)]
struct JsonCall {
    #[serde(alias = "tool", alias = "function")]
    name: String,
    #[serde(default, alias = "args", alias = "parameters")]
    arguments: serde_json::Value,
}

impl ToolCallParser for JsonCallParser {
    fn parse(&self, content: &str) -> Option<ToolCall> {
        // Only the first object is considered; prose around it is fine.
        let candidate = json_objects(content).into_iter().next()?;
        let parsed: JsonCall = serde_json::from_str(candidate).ok()?;

        if parsed.name.trim().is_empty() {
            return None;
        }

        let arguments = if parsed.arguments.is_null() {
            serde_json::json!({})
        } else {
            parsed.arguments
        };

        Some(ToolCall::new(parsed.name.trim(), arguments))
    }

    fn name(&self) -> &'static str {
        "JsonCallParser"
    }

    fn priority(&self) -> u32 {
        100
    }
}
