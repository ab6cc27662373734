//! The task entity and its value types.
//!
//! A [`Task`] is a plain data container. Structural validation (duplicate
//! references, self-loops, empty titles) happens when a task is constructed
//! from a [`TaskDraft`] or checked with [`Task::validate`]; graph-wide rules
//! such as acyclicity belong to [`crate::graph`].

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ModelError;

// ---------------------------------------------------------------------------
// TaskId
// ---------------------------------------------------------------------------

/// Opaque, never-reused task identifier.
///
/// Any non-empty string without whitespace, control characters or commas is
/// accepted, so ids imported from other tools survive unchanged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

impl TaskId {
    /// Validate and wrap a raw identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidId`] when `raw` is empty or contains
    /// whitespace, control characters or commas.
    pub fn new(raw: impl Into<String>) -> Result<Self, ModelError> {
        let raw = raw.into();
        let reason = if raw.is_empty() {
            Some("must not be empty")
        } else if raw.chars().any(char::is_whitespace) {
            Some("must not contain whitespace")
        } else if raw.chars().any(char::is_control) {
            Some("must not contain control characters")
        } else if raw.contains(',') {
            Some("must not contain commas")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(ModelError::InvalidId { raw, reason }),
            None => Ok(Self(raw)),
        }
    }

    /// Wrap a value already known to satisfy the id rules.
    pub(crate) const fn from_trusted(raw: String) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TaskId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TaskId {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// UTC instant truncated to whole seconds.
///
/// The canonical text form is `YYYY-MM-DDTHH:MM:SSZ`; every timestamp is
/// normalized to it on construction, so two timestamps that print the same
/// compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    const CANONICAL: &'static str = "%Y-%m-%dT%H:%M:%SZ";

    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.with_nanosecond(0).unwrap_or(dt))
    }

    /// Parse any of the accepted input forms.
    ///
    /// Accepts RFC 3339 with any offset, a naive `YYYY-MM-DDTHH:MM:SS` or
    /// `YYYY-MM-DD HH:MM[:SS]` (read as UTC), and a bare `YYYY-MM-DD`
    /// (midnight UTC).
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidTimestamp`] for anything else.
    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        let trimmed = raw.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self::from_datetime(dt.with_timezone(&Utc)));
        }

        for pattern in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, pattern) {
                return Ok(Self::from_datetime(naive.and_utc()));
            }
        }

        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| Self::from_datetime(naive.and_utc()))
            .ok_or_else(|| ModelError::InvalidTimestamp {
                raw: raw.to_string(),
            })
    }

    #[must_use]
    pub const fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Seconds since the Unix epoch.
    #[must_use]
    pub fn unix_seconds(&self) -> i64 {
        self.0.timestamp()
    }

    /// Build from seconds since the Unix epoch.
    #[must_use]
    pub fn from_unix_seconds(secs: i64) -> Option<Self> {
        DateTime::from_timestamp(secs, 0).map(Self)
    }

    #[must_use]
    pub fn to_canonical(&self) -> String {
        self.0.format(Self::CANONICAL).to_string()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::CANONICAL))
    }
}

impl FromStr for Timestamp {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_datetime(dt)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status. Orthogonal to [`Task::is_archived`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Pending,
    InProgress,
    Done,
    Requested,
    Removed,
}

impl Status {
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::InProgress,
        Self::Done,
        Self::Requested,
        Self::Removed,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Requested => "requested",
            Self::Removed => "removed",
        }
    }

    #[must_use]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Done)
    }

    #[must_use]
    pub const fn is_removed(self) -> bool {
        matches!(self, Self::Removed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a closed enumeration from text fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "pending" | "todo" => Ok(Self::Pending),
            "in_progress" | "doing" | "started" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "requested" => Ok(Self::Requested),
            "removed" => Ok(Self::Removed),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// A directed dependency `from -> to`: `to` depends on `from`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: TaskId,
    pub to: TaskId,
}

impl Edge {
    #[must_use]
    pub const fn new(from: TaskId, to: TaskId) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// One unit of work.
///
/// Equality and hashing use the id only; compare full contents with
/// [`Task::deep_eq`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub start_date: Option<Timestamp>,
    #[serde(default)]
    pub due_date: Option<Timestamp>,
    #[serde(default)]
    pub status: Status,
    /// Parent ids, in insertion order.
    #[serde(default)]
    pub depends_on: Vec<TaskId>,
    /// Child ids, in insertion order.
    #[serde(default)]
    pub children: Vec<TaskId>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub requested_by: Option<String>,
    #[serde(default)]
    pub requested_at: Option<Timestamp>,
    #[serde(default)]
    pub requested_note: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Task {
    /// A pending task with no links, created and updated at `now`.
    #[must_use]
    pub fn new(id: TaskId, title: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            priority: 0,
            start_date: None,
            due_date: None,
            status: Status::Pending,
            depends_on: Vec::new(),
            children: Vec::new(),
            is_archived: false,
            assigned_to: None,
            requested_by: None,
            requested_at: None,
            requested_note: None,
            created_at: now,
            updated_at: now,
            tags: BTreeSet::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Check the per-task structural rules.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::SelfLoop`] when the task references itself and
    /// [`ModelError::DuplicateReference`] when a parent or child is listed
    /// twice.
    pub fn validate(&self) -> Result<(), ModelError> {
        check_references(&self.id, &self.depends_on, "depends_on")?;
        check_references(&self.id, &self.children, "children")
    }

    /// Field-by-field equality, unlike `==` which compares ids.
    #[must_use]
    pub fn deep_eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.description == other.description
            && self.priority == other.priority
            && self.start_date == other.start_date
            && self.due_date == other.due_date
            && self.status == other.status
            && self.depends_on == other.depends_on
            && self.children == other.children
            && self.is_archived == other.is_archived
            && self.assigned_to == other.assigned_to
            && self.requested_by == other.requested_by
            && self.requested_at == other.requested_at
            && self.requested_note == other.requested_note
            && self.created_at == other.created_at
            && self.updated_at == other.updated_at
            && self.tags == other.tags
            && self.metadata == other.metadata
    }

    #[must_use]
    pub fn description_or_empty(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Task {}

impl std::hash::Hash for Task {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

fn check_references(id: &TaskId, refs: &[TaskId], list: &'static str) -> Result<(), ModelError> {
    let mut seen = HashSet::with_capacity(refs.len());
    for related in refs {
        if related == id {
            return Err(ModelError::SelfLoop { task: id.clone() });
        }
        if !seen.insert(related) {
            return Err(ModelError::DuplicateReference {
                task: id.clone(),
                related: related.clone(),
                list,
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// TaskDraft
// ---------------------------------------------------------------------------

/// Caller-supplied fields for a task that does not exist yet.
///
/// The id is generated unless [`TaskDraft::id`] is set. `parents` and
/// `children` are linked in the same transaction that inserts the task.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub id: Option<TaskId>,
    pub title: String,
    pub description: Option<String>,
    pub priority: i64,
    pub start_date: Option<Timestamp>,
    pub due_date: Option<Timestamp>,
    pub status: Status,
    pub assigned_to: Option<String>,
    pub tags: BTreeSet<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub parents: Vec<TaskId>,
    pub children: Vec<TaskId>,
}

impl TaskDraft {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub const fn with_start_date(mut self, start: Timestamp) -> Self {
        self.start_date = Some(start);
        self
    }

    #[must_use]
    pub const fn with_due_date(mut self, due: Timestamp) -> Self {
        self.due_date = Some(due);
        self
    }

    #[must_use]
    pub const fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_parents(mut self, parents: Vec<TaskId>) -> Self {
        self.parents = parents;
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<TaskId>) -> Self {
        self.children = children;
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Build the unlinked task and validate the requested links.
    ///
    /// The returned task has empty `depends_on`/`children`; the caller links
    /// the returned parent and child lists afterwards so both edge sides are
    /// written together.
    pub(crate) fn into_task(
        self,
        id: TaskId,
        now: Timestamp,
    ) -> Result<(Task, Vec<TaskId>, Vec<TaskId>), ModelError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ModelError::EmptyTitle);
        }
        check_references(&id, &self.parents, "depends_on")?;
        check_references(&id, &self.children, "children")?;

        let mut task = Task::new(id, title, now);
        task.description = self.description;
        task.priority = self.priority;
        task.start_date = self.start_date;
        task.due_date = self.due_date;
        task.status = self.status;
        task.assigned_to = self.assigned_to;
        task.tags = self.tags;
        task.metadata = self.metadata;
        Ok((task, self.parents, self.children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> TaskId {
        TaskId::new(raw).expect("valid id")
    }

    fn ts(raw: &str) -> Timestamp {
        Timestamp::parse(raw).expect("valid timestamp")
    }

    #[test]
    fn task_id_rejects_malformed_input() {
        for bad in ["", "a b", "a,b", "tab\there", "nul\u{0}"] {
            assert!(TaskId::new(bad).is_err(), "accepted {bad:?}");
        }
        assert_eq!(id("abc_20240101000000_me").as_str(), "abc_20240101000000_me");
    }

    #[test]
    fn timestamp_normalizes_to_canonical_utc() {
        assert_eq!(ts("2024-01-02T03:04:05Z").to_string(), "2024-01-02T03:04:05Z");
        assert_eq!(
            ts("2024-01-02T12:04:05+09:00").to_string(),
            "2024-01-02T03:04:05Z"
        );
        assert_eq!(
            ts("2024-01-02T03:04:05.999Z").to_string(),
            "2024-01-02T03:04:05Z"
        );
        assert_eq!(ts("2024-01-02T03:04:05").to_string(), "2024-01-02T03:04:05Z");
        assert_eq!(ts("2024-01-02 03:04").to_string(), "2024-01-02T03:04:00Z");
        assert_eq!(ts("2024-01-02").to_string(), "2024-01-02T00:00:00Z");
    }

    #[test]
    fn timestamp_rejects_garbage() {
        assert!(matches!(
            Timestamp::parse("next tuesday"),
            Err(ModelError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn timestamp_unix_round_trip() {
        let t = ts("2024-03-01T10:00:00Z");
        assert_eq!(Timestamp::from_unix_seconds(t.unix_seconds()), Some(t));
    }

    #[test]
    fn status_parses_aliases_and_rejects_unknown() {
        assert_eq!("In-Progress".parse::<Status>(), Ok(Status::InProgress));
        assert_eq!(" DONE ".parse::<Status>(), Ok(Status::Done));
        let err = "blocked".parse::<Status>().unwrap_err();
        assert_eq!(err.expected, "status");
        assert_eq!(err.to_string(), "invalid status: 'blocked'");
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Status::InProgress).unwrap(),
            "\"in_progress\""
        );
        for status in Status::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn task_equality_is_by_id_only() {
        let now = ts("2024-01-01T00:00:00Z");
        let a = Task::new(id("a"), "first", now);
        let mut b = a.clone();
        b.title = "renamed".to_string();

        assert_eq!(a, b);
        assert!(!a.deep_eq(&b));
        assert!(a.deep_eq(&a.clone()));
    }

    #[test]
    fn validate_rejects_self_loop_and_duplicates() {
        let now = ts("2024-01-01T00:00:00Z");
        let mut task = Task::new(id("a"), "t", now);
        task.depends_on = vec![id("a")];
        assert_eq!(task.validate(), Err(ModelError::SelfLoop { task: id("a") }));

        task.depends_on = vec![id("b"), id("b")];
        assert!(matches!(
            task.validate(),
            Err(ModelError::DuplicateReference { list: "depends_on", .. })
        ));

        task.depends_on = vec![id("b")];
        task.children = vec![id("c"), id("c")];
        assert!(matches!(
            task.validate(),
            Err(ModelError::DuplicateReference { list: "children", .. })
        ));
    }

    #[test]
    fn task_json_round_trip_keeps_every_field() {
        let now = ts("2024-01-01T00:00:00Z");
        let mut task = Task::new(id("a"), "write docs", now);
        task.description = Some(String::new());
        task.priority = -3;
        task.due_date = Some(ts("2024-02-01"));
        task.status = Status::Requested;
        task.depends_on = vec![id("p")];
        task.is_archived = true;
        task.requested_by = Some("kim".to_string());
        task.requested_at = Some(now);
        task.tags.insert("docs".to_string());
        task.metadata
            .insert("estimate".to_string(), serde_json::json!({"hours": 2}));

        let json = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert!(task.deep_eq(&back));
    }

    #[test]
    fn task_deserialize_fills_defaults() {
        let json = r#"{"id":"x","title":"bare","created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z"}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.status, Status::Pending);
        assert!(task.depends_on.is_empty());
        assert!(task.description.is_none());
        assert!(!task.is_archived);
    }

    #[test]
    fn deserialize_rejects_invalid_id() {
        let json = r#"{"id":"has space","title":"t","created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<Task>(json).is_err());
    }

    #[test]
    fn draft_trims_title_and_rejects_empty() {
        let now = ts("2024-01-01T00:00:00Z");
        let (task, parents, children) = TaskDraft::new("  ship it  ")
            .with_priority(2)
            .with_parents(vec![id("p")])
            .into_task(id("n"), now)
            .unwrap();
        assert_eq!(task.title, "ship it");
        assert_eq!(task.priority, 2);
        assert!(task.depends_on.is_empty());
        assert_eq!(parents, vec![id("p")]);
        assert!(children.is_empty());

        assert_eq!(
            TaskDraft::new("   ").into_task(id("m"), now).unwrap_err(),
            ModelError::EmptyTitle
        );
    }

    #[test]
    fn draft_rejects_self_reference() {
        let now = ts("2024-01-01T00:00:00Z");
        let err = TaskDraft::new("loop")
            .with_children(vec![id("n")])
            .into_task(id("n"), now)
            .unwrap_err();
        assert_eq!(err, ModelError::SelfLoop { task: id("n") });
    }
}
