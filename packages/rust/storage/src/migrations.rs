//! SQL migration definitions for the studygen database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: subjects, lessons, lesson_artifacts",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Study subjects, owned by one user
CREATE TABLE IF NOT EXISTS subjects (
    id          TEXT PRIMARY KEY,
    owner       TEXT NOT NULL,
    name        TEXT NOT NULL,
    description TEXT,
    color       TEXT,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_subjects_owner ON subjects(owner);

-- Lessons: the original content a pipeline run was fed
CREATE TABLE IF NOT EXISTS lessons (
    id           TEXT PRIMARY KEY,
    subject_id   TEXT NOT NULL REFERENCES subjects(id) ON DELETE CASCADE,
    title        TEXT NOT NULL,
    raw_content  TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    source       TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_lessons_subject ON lessons(subject_id);

-- One generated payload per lesson and mode
CREATE TABLE IF NOT EXISTS lesson_artifacts (
    lesson_id    TEXT NOT NULL REFERENCES lessons(id) ON DELETE CASCADE,
    mode         TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    PRIMARY KEY (lesson_id, mode)
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
