//! XML function call format parser
//!
//! Handles `<function=tool_name><parameter=key>value</parameter></function>`,
//! which some models emit when they do not use JSON tool calling.

use std::sync::LazyLock;

use regex::Regex;

use super::ToolCallParser;
use crate::llm::ToolCall;

static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<function=([^>]+)>([\s\S]*?)</function>").expect("function pattern is valid")
});

static PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<parameter=([^>]+)>([^<]*)</parameter>").expect("parameter pattern is valid")
});

/// Parser for XML-style function calls
pub struct XmlFunctionParser;

impl ToolCallParser for XmlFunctionParser {
    fn parse(&self, content: &str) -> Option<ToolCall> {
        let caps = FUNCTION_RE.captures(content)?;
        let name = caps.get(1)?.as_str().trim();
        if name.is_empty() {
            return None;
        }
        let body = caps.get(2).map(|m| m.as_str()).unwrap_or("");

        let mut args = serde_json::Map::new();
        for param in PARAM_RE.captures_iter(body) {
            if let (Some(key), Some(value)) = (param.get(1), param.get(2)) {
                let value = value.as_str().trim();
                // Numbers and booleans keep their JSON type
                let json_value = serde_json::from_str(value)
                    .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
                args.insert(key.as_str().trim().to_string(), json_value);
            }
        }

        Some(ToolCall::new(name, serde_json::Value::Object(args)))
    }

    fn name(&self) -> &'static str {
        "XmlFunctionParser"
    }

    fn priority(&self) -> u32 {
        75
    }
}
