//! Arithmetic calculator tool
//!
//! Grammar (lowest to highest precedence):
//! `expr := term (('+' | '-') term)*`,
//! `term := power (('*' | '/' | '%') power)*`,
//! `power := unary ('^' power)?`,
//! `unary := '-' unary | atom`, `atom := number | '(' expr ')'`.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use super::{parse_arguments, schema_for, Tool, ToolError};

#[derive(Debug, Deserialize, JsonSchema)]
struct CalculatorArgs {
    /// Arithmetic expression, e.g. `(2 + 3) * 4`
    expression: String,
}

/// Evaluates arithmetic expressions
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Performs basic calculations: + - * / % ^ and parentheses."
    }

    fn parameters(&self) -> serde_json::Value {
        schema_for::<CalculatorArgs>()
    }

    async fn call(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let args: CalculatorArgs = parse_arguments(arguments)?;
        let value = evaluate(&args.expression).map_err(ToolError::InvalidArguments)?;
        Ok(format!("The result of the calculation is: {}", format_number(value)))
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Evaluate an arithmetic expression
pub fn evaluate(expression: &str) -> Result<f64, String> {
    let mut parser = Parser {
        chars: expression.chars().filter(|c| !c.is_whitespace()).collect(),
        pos: 0,
        depth: 0,
    };
    if parser.chars.is_empty() {
        return Err("empty expression".to_string());
    }

    let value = parser.expr()?;
    if let Some(c) = parser.peek() {
        return Err(format!("unexpected '{}' at position {}", c, parser.pos));
    }
    if !value.is_finite() {
        return Err("result is not a finite number".to_string());
    }
    Ok(value)
}

/// Deepest nesting of parentheses, signs and exponents accepted
const MAX_DEPTH: usize = 64;

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    /// Run `f` one nesting level deeper; the error aborts the whole parse
    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Result<f64, String>) -> Result<f64, String> {
        if self.depth >= MAX_DEPTH {
            return Err("expression nested too deeply".to_string());
        }
        self.depth += 1;
        let value = f(self)?;
        self.depth -= 1;
        Ok(value)
    }

    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.power()?;
        while let Some(op @ ('*' | '/' | '%')) = self.peek() {
            self.pos += 1;
            let rhs = self.power()?;
            value = match op {
                '*' => value * rhs,
                _ if rhs == 0.0 => return Err("division by zero".to_string()),
                '/' => value / rhs,
                _ => value % rhs,
            };
        }
        Ok(value)
    }

    fn power(&mut self) -> Result<f64, String> {
        let base = self.unary()?;
        if self.peek() == Some('^') {
            self.pos += 1;
            let exponent = self.nested(Self::power)?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(-self.nested(Self::unary)?)
            }
            Some('+') => {
                self.pos += 1;
                self.nested(Self::unary)
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let value = self.nested(Self::expr)?;
                match self.bump() {
                    Some(')') => Ok(value),
                    _ => Err("missing closing parenthesis".to_string()),
                }
            }
            Some(c) if c.is_ascii_digit() || c == '.' => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
                    self.pos += 1;
                }
                let literal: String = self.chars[start..self.pos].iter().collect();
                literal
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{}'", literal))
            }
            Some(c) => Err(format!("unexpected '{}' at position {}", c, self.pos)),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_and_parentheses() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("2 ^ 3 ^ 2").unwrap(), 512.0);
        assert_eq!(evaluate("-3 + 10 % 4").unwrap(), -1.0);
        assert_eq!(evaluate("1.5 * 2").unwrap(), 3.0);
    }

    #[test]
    fn test_errors() {
        assert!(evaluate("").is_err());
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("2 + abc").is_err());
        assert!(evaluate("1..2").is_err());
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let parens = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
        assert_eq!(evaluate(&parens).unwrap_err(), "expression nested too deeply");
        assert!(evaluate(&"-".repeat(100_000)).is_err());
        assert!(evaluate(&["2"; 100_000].join("^")).is_err());

        let shallow = format!("{}7{}", "(".repeat(MAX_DEPTH - 1), ")".repeat(MAX_DEPTH - 1));
        assert_eq!(evaluate(&shallow).unwrap(), 7.0);
    }

    #[tokio::test]
    async fn test_tool_call_formats_result() {
        let out = CalculatorTool
            .call(serde_json::json!({"expression": "6 * 7"}))
            .await
            .unwrap();
        assert_eq!(out, "The result of the calculation is: 42");

        let err = CalculatorTool.call(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn test_schema_names_expression() {
        let schema = CalculatorTool.parameters();
        assert!(schema["properties"]["expression"].is_object());
    }
}
