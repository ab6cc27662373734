//! Argument parsing and validation shared by the subcommands.
//!
//! The `parse_*` functions are clap value parsers: they turn one raw
//! argument into a typed value or a one-line message that clap prints next
//! to the offending flag.

use serde_json::Value;
use tdag_core::{Status, TaskId, Timestamp};

use crate::output::CliError;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_TAG_LEN: usize = 50;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: &'static str,
    pub value: String,
    pub reason: String,
    pub suggestion: String,
}

impl ValidationError {
    pub fn new(
        field: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            field,
            value: value.into(),
            reason: reason.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn to_cli_error(&self) -> CliError {
        let mut err = CliError::new(format!(
            "invalid {} '{}': {}",
            self.field, self.value, self.reason
        ));
        err.suggestion = Some(self.suggestion.clone());
        err.error_code = Some(tdag_core::ErrorCode::InvalidTask.code().to_string());
        err
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {} '{}': {}", self.field, self.value, self.reason)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_title(s: &str) -> Result<(), ValidationError> {
    if s.trim().is_empty() {
        return Err(ValidationError::new(
            "title",
            s,
            "must not be empty",
            "provide a non-empty title",
        ));
    }
    if s.chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::new(
            "title",
            s,
            format!("must be <= {MAX_TITLE_LEN} characters"),
            "shorten the title and move detail into --description",
        ));
    }
    if s.chars().any(char::is_control) {
        return Err(ValidationError::new(
            "title",
            s,
            "must not contain control characters",
            "remove control characters from the title",
        ));
    }
    Ok(())
}

pub fn validate_tag(s: &str) -> Result<(), ValidationError> {
    if s.is_empty() || s.chars().count() > MAX_TAG_LEN {
        return Err(ValidationError::new(
            "tag",
            s,
            format!("must be 1..={MAX_TAG_LEN} characters"),
            "use short tags like backend or urgent",
        ));
    }
    if s.chars().any(|c| c.is_whitespace() || c.is_control() || c == ',') {
        return Err(ValidationError::new(
            "tag",
            s,
            "must not contain whitespace, commas or control characters",
            "use '-' or '_' instead of spaces",
        ));
    }
    Ok(())
}

/// Clap value parser for date arguments.
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, String> {
    Timestamp::parse(raw).map_err(|err| err.to_string())
}

/// Clap value parser for `--id` overrides.
pub fn parse_task_id(raw: &str) -> Result<TaskId, String> {
    TaskId::new(raw).map_err(|err| err.to_string())
}

/// Clap value parser for status names, accepting the same aliases as the
/// core (`todo`, `doing`, ...).
pub fn parse_status(raw: &str) -> Result<Status, String> {
    raw.parse::<Status>().map_err(|err| {
        format!("{err}; expected one of pending, in_progress, done, requested, removed")
    })
}

/// Clap value parser for `key=value` metadata. The value is read as YAML,
/// so `n=3` stores a number, `flag=true` a bool and `note=hello` a string.
pub fn parse_metadata(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty metadata key in '{raw}'"));
    }
    if value.trim().is_empty() {
        return Ok((key.to_string(), Value::String(String::new())));
    }
    let value: Value = serde_yaml::from_str(value)
        .unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_rules() {
        assert!(validate_title("Ship it").is_ok());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LEN + 1)).is_err());
        assert!(validate_title("line\nbreak").is_err());
    }

    #[test]
    fn tag_rules() {
        assert!(validate_tag("backend").is_ok());
        assert!(validate_tag("").is_err());
        assert!(validate_tag("two words").is_err());
        assert!(validate_tag("a,b").is_err());
    }

    #[test]
    fn validation_error_carries_code_and_suggestion() {
        let err = validate_title("").unwrap_err().to_cli_error();
        assert_eq!(err.error_code.as_deref(), Some("E2006"));
        assert!(err.suggestion.is_some());
    }

    #[test]
    fn timestamps_accept_dates_and_rfc3339() {
        assert_eq!(
            parse_timestamp("2024-05-01").unwrap(),
            parse_timestamp("2024-05-01T00:00:00Z").unwrap()
        );
        assert!(parse_timestamp("next week").is_err());
    }

    #[test]
    fn status_aliases() {
        assert_eq!(parse_status("doing").unwrap(), Status::InProgress);
        assert!(parse_status("blocked").unwrap_err().contains("expected one of"));
    }

    #[test]
    fn ids_reject_whitespace() {
        assert!(parse_task_id("abc").is_ok());
        assert!(parse_task_id("a b").is_err());
    }

    #[test]
    fn metadata_values_are_typed() {
        assert_eq!(parse_metadata("n=3").unwrap(), ("n".into(), serde_json::json!(3)));
        assert_eq!(parse_metadata("ok=true").unwrap().1, serde_json::json!(true));
        assert_eq!(parse_metadata("note=hello world").unwrap().1, serde_json::json!("hello world"));
        assert_eq!(parse_metadata("list=[1, 2]").unwrap().1, serde_json::json!([1, 2]));
        assert_eq!(parse_metadata("empty=").unwrap().1, serde_json::json!(""));
        assert!(parse_metadata("novalue").is_err());
        assert!(parse_metadata("=3").is_err());
    }
}
