//! libSQL storage layer for subjects, lessons, and generated artifacts.
//!
//! The [`Storage`] struct wraps a local libSQL database. It is the concrete
//! content store behind the CLI; the pipeline itself never touches it.

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};

use studygen_shared::{
    ContentMode, Lesson, LessonId, LessonSource, Payload, Result, StudyGenError, Subject,
    SubjectId, UserId,
};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

fn storage_err(e: impl std::fmt::Display) -> StudyGenError {
    StudyGenError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StudyGenError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        StudyGenError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Subject operations
    // -----------------------------------------------------------------------

    /// Insert a new subject record.
    pub async fn insert_subject(&self, subject: &Subject) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO subjects (id, owner, name, description, color, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    subject.id.to_string(),
                    subject.owner.0.as_str(),
                    subject.name.as_str(),
                    subject.description.as_deref(),
                    subject.color.as_deref(),
                    subject.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Get a subject by ID.
    pub async fn get_subject(&self, id: &SubjectId) -> Result<Option<Subject>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, owner, name, description, color, created_at
                 FROM subjects WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_subject(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// List a user's subjects, alphabetically.
    pub async fn list_subjects(&self, owner: &UserId) -> Result<Vec<Subject>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, owner, name, description, color, created_at
                 FROM subjects WHERE owner = ?1 ORDER BY name",
                params![owner.0.as_str()],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_subject(&row)?);
        }
        Ok(results)
    }

    /// Delete a subject with all its lessons and artifacts.
    /// Returns whether the subject existed.
    pub async fn delete_subject(&self, id: &SubjectId) -> Result<bool> {
        let id = id.to_string();
        let tx = self.conn.transaction().await.map_err(storage_err)?;
        tx.execute(
            "DELETE FROM lesson_artifacts
             WHERE lesson_id IN (SELECT id FROM lessons WHERE subject_id = ?1)",
            params![id.as_str()],
        )
        .await
        .map_err(storage_err)?;
        tx.execute(
            "DELETE FROM lessons WHERE subject_id = ?1",
            params![id.as_str()],
        )
        .await
        .map_err(storage_err)?;
        let deleted = tx
            .execute("DELETE FROM subjects WHERE id = ?1", params![id.as_str()])
            .await
            .map_err(storage_err)?;
        tx.commit().await.map_err(storage_err)?;
        Ok(deleted > 0)
    }

    // -----------------------------------------------------------------------
    // Lesson operations
    // -----------------------------------------------------------------------

    /// Insert a lesson together with its generated artifacts, atomically.
    pub async fn insert_lesson(&self, lesson: &Lesson, artifacts: &[Payload]) -> Result<()> {
        let lesson_id = lesson.id.to_string();
        let now = Utc::now().to_rfc3339();

        let tx = self.conn.transaction().await.map_err(storage_err)?;
        tx.execute(
            "INSERT INTO lessons (id, subject_id, title, raw_content, content_hash, source, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                lesson_id.as_str(),
                lesson.subject_id.to_string(),
                lesson.title.as_str(),
                lesson.raw_content.as_str(),
                lesson.content_hash.as_str(),
                lesson.source.as_str(),
                lesson.created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(storage_err)?;

        for payload in artifacts {
            let json = serde_json::to_string(payload).map_err(storage_err)?;
            tx.execute(
                "INSERT INTO lesson_artifacts (lesson_id, mode, payload_json, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(lesson_id, mode) DO UPDATE SET
                   payload_json = excluded.payload_json,
                   created_at = excluded.created_at",
                params![
                    lesson_id.as_str(),
                    payload.mode().as_str(),
                    json,
                    now.as_str()
                ],
            )
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    /// Get a lesson by ID.
    pub async fn get_lesson(&self, id: &LessonId) -> Result<Option<Lesson>> {
        let mut rows = self
            .conn
            .query(
                "SELECT l.id, l.subject_id, l.title, l.raw_content, l.content_hash, l.source,
                        l.created_at, GROUP_CONCAT(a.mode)
                 FROM lessons l
                 LEFT JOIN lesson_artifacts a ON a.lesson_id = l.id
                 WHERE l.id = ?1
                 GROUP BY l.id",
                params![id.to_string()],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_lesson(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// List a subject's lessons, oldest first.
    pub async fn list_lessons(&self, subject_id: &SubjectId) -> Result<Vec<Lesson>> {
        let mut rows = self
            .conn
            .query(
                "SELECT l.id, l.subject_id, l.title, l.raw_content, l.content_hash, l.source,
                        l.created_at, GROUP_CONCAT(a.mode)
                 FROM lessons l
                 LEFT JOIN lesson_artifacts a ON a.lesson_id = l.id
                 WHERE l.subject_id = ?1
                 GROUP BY l.id
                 ORDER BY l.created_at, l.id",
                params![subject_id.to_string()],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_lesson(&row)?);
        }
        Ok(results)
    }

    /// Delete a lesson and its artifacts. Returns whether the lesson existed.
    pub async fn delete_lesson(&self, id: &LessonId) -> Result<bool> {
        let id = id.to_string();
        let tx = self.conn.transaction().await.map_err(storage_err)?;
        tx.execute(
            "DELETE FROM lesson_artifacts WHERE lesson_id = ?1",
            params![id.as_str()],
        )
        .await
        .map_err(storage_err)?;
        let deleted = tx
            .execute("DELETE FROM lessons WHERE id = ?1", params![id.as_str()])
            .await
            .map_err(storage_err)?;
        tx.commit().await.map_err(storage_err)?;
        Ok(deleted > 0)
    }

    /// Load the generated payloads of a lesson, in pipeline order.
    pub async fn list_artifacts(&self, lesson_id: &LessonId) -> Result<Vec<Payload>> {
        let mut rows = self
            .conn
            .query(
                "SELECT mode, payload_json FROM lesson_artifacts WHERE lesson_id = ?1",
                params![lesson_id.to_string()],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let mode: String = row.get(0).map_err(storage_err)?;
            let json: String = row.get(1).map_err(storage_err)?;
            let mode = parse_mode(&mode)?;
            let value: serde_json::Value = serde_json::from_str(&json).map_err(storage_err)?;
            let payload = Payload::from_value(mode, value).map_err(|e| {
                StudyGenError::Storage(format!("corrupt {} artifact: {e}", mode.as_str()))
            })?;
            results.push(payload);
        }
        results.sort_by_key(|p| p.mode());
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn parse_mode(s: &str) -> Result<ContentMode> {
    s.parse()
        .map_err(|e: String| StudyGenError::Storage(format!("invalid mode in database: {e}")))
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StudyGenError::Storage(format!("invalid date: {e}")))
}

fn parse_id<T: std::str::FromStr<Err = uuid::Error>>(s: &str) -> Result<T> {
    s.parse()
        .map_err(|e| StudyGenError::Storage(format!("invalid id '{s}': {e}")))
}

/// Convert a database row to a [`Subject`].
fn row_to_subject(row: &libsql::Row) -> Result<Subject> {
    let id: String = row.get(0).map_err(storage_err)?;
    let created_at: String = row.get(5).map_err(storage_err)?;
    Ok(Subject {
        id: parse_id(&id)?,
        owner: UserId(row.get::<String>(1).map_err(storage_err)?),
        name: row.get::<String>(2).map_err(storage_err)?,
        description: row.get::<String>(3).ok(),
        color: row.get::<String>(4).ok(),
        created_at: parse_time(&created_at)?,
    })
}

/// Convert a database row to a [`Lesson`]. Column 7 is the
/// comma-separated list of artifact modes (NULL when there are none).
fn row_to_lesson(row: &libsql::Row) -> Result<Lesson> {
    let id: String = row.get(0).map_err(storage_err)?;
    let subject_id: String = row.get(1).map_err(storage_err)?;
    let source: String = row.get(5).map_err(storage_err)?;
    let created_at: String = row.get(6).map_err(storage_err)?;

    let mut generated = match row.get::<String>(7) {
        Ok(modes) => modes
            .split(',')
            .filter(|m| !m.is_empty())
            .map(parse_mode)
            .collect::<Result<Vec<_>>>()?,
        Err(_) => Vec::new(),
    };
    generated.sort();

    Ok(Lesson {
        id: parse_id(&id)?,
        subject_id: parse_id(&subject_id)?,
        title: row.get::<String>(2).map_err(storage_err)?,
        raw_content: row.get::<String>(3).map_err(storage_err)?,
        content_hash: row.get::<String>(4).map_err(storage_err)?,
        source: source
            .parse::<LessonSource>()
            .map_err(StudyGenError::Storage)?,
        generated,
        created_at: parse_time(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use studygen_shared::{Flashcard, FlashcardDeck, Summary, content_hash};
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("sg_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn subject(owner: &str, name: &str) -> Subject {
        Subject {
            id: SubjectId::new(),
            owner: UserId(owner.into()),
            name: name.into(),
            description: None,
            color: Some("#16a34a".into()),
            created_at: Utc::now(),
        }
    }

    fn lesson(subject_id: &SubjectId, title: &str) -> Lesson {
        let raw = format!("{title}: chlorophyll absorbs light in the thylakoid membranes.");
        Lesson {
            id: LessonId::new(),
            subject_id: subject_id.clone(),
            title: title.into(),
            content_hash: content_hash(&raw),
            raw_content: raw,
            source: LessonSource::Text,
            generated: Vec::new(),
            created_at: Utc::now(),
        }
    }

    fn summary() -> Payload {
        Payload::Summary(Summary {
            title: "Light reactions".into(),
            content: "## Overview\nLight is absorbed.".into(),
        })
    }

    fn deck() -> Payload {
        Payload::Flashcards(FlashcardDeck {
            cards: vec![Flashcard {
                front: "Thylakoid".into(),
                back: "Membrane where light reactions happen".into(),
            }],
        })
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("sg_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn subject_crud_is_scoped_to_owner() {
        let storage = test_storage().await;
        let biology = subject("ada", "Biology");
        let history = subject("ada", "History");
        let other = subject("grace", "Chemistry");
        for s in [&biology, &history, &other] {
            storage.insert_subject(s).await.expect("insert subject");
        }

        let found = storage.get_subject(&biology.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Biology");
        assert_eq!(found.color.as_deref(), Some("#16a34a"));
        assert!(found.description.is_none());

        let names: Vec<String> = storage
            .list_subjects(&UserId("ada".into()))
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, ["Biology", "History"]);

        assert!(storage.delete_subject(&history.id).await.unwrap());
        assert!(!storage.delete_subject(&history.id).await.unwrap());
        assert!(storage.get_subject(&history.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lesson_with_artifacts_roundtrip() {
        let storage = test_storage().await;
        let biology = subject("ada", "Biology");
        storage.insert_subject(&biology).await.unwrap();

        let l = lesson(&biology.id, "Photosynthesis");
        storage
            .insert_lesson(&l, &[deck(), summary()])
            .await
            .expect("insert lesson");

        let found = storage.get_lesson(&l.id).await.unwrap().expect("lesson");
        assert_eq!(found.title, "Photosynthesis");
        assert_eq!(found.content_hash, l.content_hash);
        assert_eq!(
            found.generated,
            [ContentMode::Summary, ContentMode::Flashcards]
        );

        let artifacts = storage.list_artifacts(&l.id).await.unwrap();
        assert_eq!(artifacts, vec![summary(), deck()]);
    }

    #[tokio::test]
    async fn lesson_without_artifacts() {
        let storage = test_storage().await;
        let biology = subject("ada", "Biology");
        storage.insert_subject(&biology).await.unwrap();

        let l = lesson(&biology.id, "Respiration");
        storage.insert_lesson(&l, &[]).await.unwrap();

        let lessons = storage.list_lessons(&biology.id).await.unwrap();
        assert_eq!(lessons.len(), 1);
        assert!(lessons[0].generated.is_empty());
        assert!(storage.list_artifacts(&l.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_subject_removes_lessons() {
        let storage = test_storage().await;
        let biology = subject("ada", "Biology");
        storage.insert_subject(&biology).await.unwrap();
        let l = lesson(&biology.id, "Photosynthesis");
        storage.insert_lesson(&l, &[summary()]).await.unwrap();

        storage.delete_subject(&biology.id).await.unwrap();
        assert!(storage.get_lesson(&l.id).await.unwrap().is_none());
        assert!(storage.list_artifacts(&l.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_lesson() {
        let storage = test_storage().await;
        let biology = subject("ada", "Biology");
        storage.insert_subject(&biology).await.unwrap();
        let l = lesson(&biology.id, "Photosynthesis");
        storage.insert_lesson(&l, &[summary()]).await.unwrap();

        assert!(storage.delete_lesson(&l.id).await.unwrap());
        assert!(storage.list_lessons(&biology.id).await.unwrap().is_empty());
        assert!(!storage.delete_lesson(&l.id).await.unwrap());
    }
}
