use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};

use super::{Tool, ToolError};

/// Reports the current local date, weekday and time
pub struct DateTool;

pub(crate) fn describe<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "Today's date is {}. Today's day is {}. The current time is {}.",
        now.format("%Y-%m-%d"),
        now.format("%A"),
        now.format("%H:%M:%S")
    )
}

#[async_trait]
impl Tool for DateTool {
    fn name(&self) -> &str {
        "date"
    }

    fn description(&self) -> &str {
        "Returns the current date, weekday and time."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn call(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        Ok(describe(&Local::now()))
    }
}
