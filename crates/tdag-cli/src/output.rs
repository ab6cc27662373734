//! Shared output layer for pretty/text/JSON parity across all `td` commands.
//!
//! Every command handler receives an [`OutputMode`] and formats its output
//! accordingly: pretty output for humans, compact text for scripts and
//! agents, or stable JSON.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--format` / hidden `--json` flag
//! 2. `FORMAT` env var → `"pretty"` | `"text"` | `"json"`
//! 3. `output` key in `config.toml`
//! 4. Default: [`OutputMode::Pretty`] if stdout is a TTY; [`OutputMode::Text`] if piped.

use clap::ValueEnum;
use serde::Serialize;
use std::io::{self, IsTerminal, Write};
use tdag_core::error::ModelError;
use tdag_core::ops::RequestAge;
use tdag_core::{ErrorCode, GraphError, StoreError, Task, TaskId};

use crate::config::ConfigError;
use crate::validate::ValidationError;

/// Shared width for human pretty separators.
pub const PRETTY_RULE_WIDTH: usize = 72;

/// How many id characters list views show. Full ids are always accepted as
/// input, and so is any unique prefix.
pub const SHORT_ID_LEN: usize = 8;

/// Write a horizontal separator used by pretty human output.
pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

/// Write a section heading followed by a separator.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// Render a left-aligned key/value line in human output.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<12} {}", format!("{key}:"), value.as_ref())
}

/// First [`SHORT_ID_LEN`] characters of an id.
#[must_use]
pub fn short_id(id: &TaskId) -> &str {
    let raw = id.as_str();
    raw.char_indices()
        .nth(SHORT_ID_LEN)
        .map_or(raw, |(cut, _)| &raw[..cut])
}

/// The three output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Human-optimized output (tables, sections, visual framing).
    Pretty,
    /// Token-efficient plain text for scripts and pipes.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputMode {
    fn parse_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "text" => Some(Self::Text),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Core resolution logic, separated from I/O for testability.
fn resolve_output_mode_inner(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    format_env: Option<&str>,
    config_output: Option<&str>,
    is_tty: bool,
) -> OutputMode {
    if let Some(mode) = format_flag {
        return mode;
    }
    if json_flag {
        return OutputMode::Json;
    }
    // Unknown values fall through to the next source.
    if let Some(mode) = format_env.and_then(OutputMode::parse_loose) {
        return mode;
    }
    if let Some(mode) = config_output.and_then(OutputMode::parse_loose) {
        return mode;
    }
    if is_tty {
        OutputMode::Pretty
    } else {
        OutputMode::Text
    }
}

/// Resolve the output mode from CLI flags, environment, config and TTY
/// defaults.
pub fn resolve_output_mode(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    config_output: Option<&str>,
) -> OutputMode {
    let env_val = std::env::var("FORMAT").ok();
    let is_tty = io::stdout().is_terminal();
    resolve_output_mode_inner(
        format_flag,
        json_flag,
        env_val.as_deref(),
        config_output,
        is_tty,
    )
}

/// Trait implemented by row types that list commands render in all modes.
pub trait Renderable: Serialize {
    /// Render for human consumption.
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()>;

    /// Render as a single text row (see [`Renderable::table_headers`]).
    fn render_table(&self, w: &mut dyn Write) -> io::Result<()>;

    /// Column headers for text and pretty tables.
    fn table_headers() -> &'static [&'static str]
    where
        Self: Sized,
    {
        &[]
    }
}

/// Render a list of [`Renderable`] items to stdout.
///
/// - JSON wraps the items in an array.
/// - Pretty prints a header and a rule above the rows.
/// - Text prints bare rows.
pub fn render_list<R: Renderable>(items: &[R], mode: OutputMode) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, items)?;
            writeln!(out)?;
        }
        OutputMode::Pretty => {
            if items.is_empty() {
                writeln!(out, "(no tasks)")?;
                return Ok(());
            }
            let headers = R::table_headers();
            if !headers.is_empty() {
                writeln!(out, "{}", headers.join("  "))?;
                pretty_rule(&mut out)?;
            }
            for item in items {
                item.render_human(&mut out)?;
            }
        }
        OutputMode::Text => {
            for item in items {
                item.render_table(&mut out)?;
            }
        }
    }
    Ok(())
}

/// Render a serializable value with explicit pretty/text renderers.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text_fn(value, &mut out)?,
        OutputMode::Pretty => pretty_fn(value, &mut out)?,
    }
    Ok(())
}

/// Render a serializable value; pretty and text share `human_fn`.
pub fn render<T: Serialize>(
    mode: OutputMode,
    value: &T,
    human_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => human_fn(value, &mut out)?,
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Task views
// ────────────────────────────────────────────────────────────────────────────

/// One task plus the values `td` derives for display.
#[derive(Debug, Serialize)]
pub struct TaskView<'a> {
    #[serde(flatten)]
    pub task: &'a Task,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_age: Option<RequestAge>,
}

impl<'a> TaskView<'a> {
    pub fn new(task: &'a Task, now: tdag_core::Timestamp) -> Self {
        Self {
            task,
            request_age: tdag_core::ops::request_age(task, now),
        }
    }

    /// Single-letter markers: archived, then status.
    fn marks(&self) -> String {
        let mut marks = String::new();
        if self.task.is_archived {
            marks.push('A');
        }
        marks.push(match self.task.status {
            tdag_core::Status::Pending => 'P',
            tdag_core::Status::InProgress => 'I',
            tdag_core::Status::Done => 'D',
            tdag_core::Status::Requested => 'R',
            tdag_core::Status::Removed => 'X',
        });
        marks
    }

    fn suffix(&self) -> String {
        let mut suffix = String::new();
        if let Some(to) = &self.task.assigned_to {
            suffix.push_str(" -> ");
            suffix.push_str(to);
        }
        if let Some(age) = &self.request_age {
            suffix.push_str(&format!(" ({age})"));
        }
        suffix
    }
}

impl Renderable for TaskView<'_> {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "[{:<2}] {:<8}  {:>3}  {:<11}  {}{}",
            self.marks(),
            short_id(&self.task.id),
            self.task.priority,
            self.task.status.as_str(),
            self.task.title,
            self.suffix()
        )
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\tp={}\t{}\t{}{}",
            self.marks(),
            self.task.id,
            self.task.priority,
            self.task.status,
            self.task.title,
            self.suffix()
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["FLAG", "ID      ", "PRI", "STATUS     ", "TITLE"]
    }
}

/// Full detail block for `td show`.
pub fn pretty_task(w: &mut dyn Write, view: &TaskView<'_>) -> io::Result<()> {
    let task = view.task;
    pretty_section(w, &format!("{}  {}", task.id, task.title))?;
    pretty_kv(w, "Status", task.status.as_str())?;
    pretty_kv(w, "Priority", task.priority.to_string())?;
    if task.is_archived {
        pretty_kv(w, "Archived", "yes")?;
    }
    if let Some(start) = task.start_date {
        pretty_kv(w, "Start", start.to_canonical())?;
    }
    if let Some(due) = task.due_date {
        pretty_kv(w, "Due", due.to_canonical())?;
    }
    if !task.tags.is_empty() {
        let tags: Vec<&str> = task.tags.iter().map(String::as_str).collect();
        pretty_kv(w, "Tags", tags.join(", "))?;
    }
    if let Some(to) = &task.assigned_to {
        pretty_kv(w, "Assigned", to)?;
    }
    if let Some(by) = &task.requested_by {
        pretty_kv(w, "Requested", by)?;
    }
    if let Some(note) = &task.requested_note {
        pretty_kv(w, "Note", note)?;
    }
    if let Some(age) = &view.request_age {
        pretty_kv(w, "Age", age.to_string())?;
    }
    pretty_kv(w, "Created", task.created_at.to_canonical())?;
    pretty_kv(w, "Updated", task.updated_at.to_canonical())?;
    for (key, value) in &task.metadata {
        pretty_kv(w, &format!("meta.{key}"), value.to_string())?;
    }
    if !task.depends_on.is_empty() {
        writeln!(w)?;
        writeln!(w, "Depends on:")?;
        for parent in &task.depends_on {
            writeln!(w, "  - {parent}")?;
        }
    }
    if !task.children.is_empty() {
        writeln!(w)?;
        writeln!(w, "Children:")?;
        for child in &task.children {
            writeln!(w, "  - {child}")?;
        }
    }
    if let Some(description) = &task.description {
        writeln!(w)?;
        writeln!(w, "{description}")?;
    }
    Ok(())
}

/// `key: value` lines for `td show` in text mode.
pub fn text_task(w: &mut dyn Write, view: &TaskView<'_>) -> io::Result<()> {
    let task = view.task;
    writeln!(w, "id: {}", task.id)?;
    writeln!(w, "title: {}", task.title)?;
    writeln!(w, "status: {}", task.status)?;
    writeln!(w, "priority: {}", task.priority)?;
    writeln!(w, "archived: {}", task.is_archived)?;
    if let Some(start) = task.start_date {
        writeln!(w, "start: {start}")?;
    }
    if let Some(due) = task.due_date {
        writeln!(w, "due: {due}")?;
    }
    if let Some(to) = &task.assigned_to {
        writeln!(w, "assigned_to: {to}")?;
    }
    if let Some(age) = &view.request_age {
        writeln!(w, "request_age: {age}")?;
    }
    writeln!(w, "depends_on: {}", join_ids(&task.depends_on))?;
    writeln!(w, "children: {}", join_ids(&task.children))?;
    if let Some(description) = &task.description {
        writeln!(w, "description: {description}")?;
    }
    Ok(())
}

fn join_ids(ids: &[TaskId]) -> String {
    ids.iter().map(TaskId::as_str).collect::<Vec<_>>().join(",")
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// A structured error with optional suggestion and error code.
#[derive(Debug, Clone, Serialize)]
pub struct CliError {
    /// Human-readable error message.
    pub message: String,
    /// Optional suggestion for how to fix the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Machine-readable error code (`E####`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Extra lines, one per finding, for errors that carry several.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl CliError {
    /// Create a simple error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            error_code: None,
            details: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn coded(message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            message: message.into(),
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
            details: Vec::new(),
        }
    }

    /// Classify a top-level failure.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        if let Some(cli) = err.downcast_ref::<Self>() {
            return cli.clone();
        }
        if let Some(store) = err.downcast_ref::<StoreError>() {
            return Self::from(store);
        }
        if let Some(graph) = err.downcast_ref::<GraphError>() {
            return Self::from(graph);
        }
        if let Some(config) = err.downcast_ref::<ConfigError>() {
            return Self::coded(config.to_string(), ErrorCode::ConfigInvalid);
        }
        if let Some(invalid) = err.downcast_ref::<ValidationError>() {
            return invalid.to_cli_error();
        }
        if let Some(model) = err.downcast_ref::<ModelError>() {
            return Self::from(&GraphError::InvalidTask(model.clone()));
        }
        Self::new(format!("{err:#}"))
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CliError {}

impl From<&GraphError> for CliError {
    fn from(err: &GraphError) -> Self {
        let mut cli = Self::coded(err.to_string(), err.code());
        if let GraphError::InconsistentGraph { violations } = err {
            cli.details = violations.iter().map(ToString::to_string).collect();
        }
        cli
    }
}

impl From<&StoreError> for CliError {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::Graph(graph) => Self::from(graph),
            other => Self::coded(other.to_string(), other.code()),
        }
    }
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({
                "error": error,
            });
            serde_json::to_writer_pretty(&mut out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            match &error.error_code {
                Some(code) => writeln!(out, "error[{code}]: {}", error.message)?,
                None => writeln!(out, "error: {}", error.message)?,
            }
            for line in &error.details {
                writeln!(out, "  - {line}")?;
            }
            if let Some(ref suggestion) = error.suggestion {
                writeln!(out, "  suggestion: {suggestion}")?;
            }
        }
    }
    Ok(())
}
