//! SQLite schema for task snapshots.
//!
//! - `tasks` keeps the scalar fields of each task, with `metadata_json`
//!   holding the metadata map
//! - `task_parents` and `task_children` store the two redundant edge lists
//!   separately, with a `position` column, so drift between them and stored
//!   order both survive a round trip
//! - `task_tags` holds the tag set
//! - `store_meta` records the schema version next to `PRAGMA user_version`

/// Migration v1: core tables.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    priority INTEGER NOT NULL DEFAULT 0,
    start_date TEXT,
    due_date TEXT,
    status TEXT NOT NULL CHECK (status IN ('pending', 'in_progress', 'done', 'requested', 'removed')),
    is_archived INTEGER NOT NULL DEFAULT 0 CHECK (is_archived IN (0, 1)),
    assigned_to TEXT,
    requested_by TEXT,
    requested_at TEXT,
    requested_note TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    metadata_json TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS task_parents (
    task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    parent_id TEXT NOT NULL,
    PRIMARY KEY (task_id, position)
);

CREATE TABLE IF NOT EXISTS task_children (
    task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    child_id TEXT NOT NULL,
    PRIMARY KEY (task_id, position)
);

CREATE TABLE IF NOT EXISTS task_tags (
    task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    tag TEXT NOT NULL,
    PRIMARY KEY (task_id, tag)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: reverse-lookup indexes for component and neighbor queries.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_task_parents_parent
    ON task_parents(parent_id, task_id);

CREATE INDEX IF NOT EXISTS idx_task_children_child
    ON task_children(child_id, task_id);

CREATE INDEX IF NOT EXISTS idx_tasks_status_archived
    ON tasks(status, is_archived);
";

/// Indexes the query paths rely on.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_task_parents_parent",
    "idx_task_children_child",
    "idx_tasks_status_archived",
];
