//! Content store: subjects and lessons with their generated artifacts.
//!
//! [`ContentStore`] is what the ingest workflow and the CLI persist through.
//! [`Storage`] from `studygen-storage` is the local libSQL implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument};

use studygen_shared::{
    ContentMode, Lesson, LessonId, LessonSource, Payload, Result, StudyGenError, Subject,
    SubjectId, UserId, content_hash,
};
use studygen_storage::Storage;

/// Persistence for subjects, lessons, and generated payloads.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn create_subject(
        &self,
        owner: &UserId,
        name: &str,
        description: Option<&str>,
        color: Option<&str>,
    ) -> Result<Subject>;

    async fn get_subject(&self, id: &SubjectId) -> Result<Option<Subject>>;

    async fn list_subjects(&self, owner: &UserId) -> Result<Vec<Subject>>;

    /// Delete a subject and everything under it. Returns whether it existed.
    async fn delete_subject(&self, id: &SubjectId) -> Result<bool>;

    /// Persist a lesson and one artifact per generated mode.
    async fn create_lesson(
        &self,
        subject_id: &SubjectId,
        title: &str,
        raw_content: &str,
        source: LessonSource,
        payloads: &BTreeMap<ContentMode, Payload>,
    ) -> Result<Lesson>;

    async fn get_lesson(&self, id: &LessonId) -> Result<Option<Lesson>>;

    async fn list_lessons(&self, subject_id: &SubjectId) -> Result<Vec<Lesson>>;

    async fn delete_lesson(&self, id: &LessonId) -> Result<bool>;

    async fn lesson_artifacts(&self, id: &LessonId) -> Result<BTreeMap<ContentMode, Payload>>;
}

/// Trim an optional text field, treating blank as absent.
fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Accept `#rgb` or `#rrggbb` colors.
fn validate_color(color: &str) -> Result<()> {
    let hex = color.strip_prefix('#').unwrap_or("");
    if (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(StudyGenError::validation(format!(
            "invalid color '{color}', expected #rrggbb"
        )))
    }
}

#[async_trait]
impl ContentStore for Storage {
    #[instrument(skip_all, fields(owner = %owner, name = name))]
    async fn create_subject(
        &self,
        owner: &UserId,
        name: &str,
        description: Option<&str>,
        color: Option<&str>,
    ) -> Result<Subject> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StudyGenError::validation("subject name must not be empty"));
        }
        let color = non_blank(color);
        if let Some(c) = &color {
            validate_color(c)?;
        }

        let subject = Subject {
            id: SubjectId::new(),
            owner: owner.clone(),
            name: name.to_string(),
            description: non_blank(description),
            color,
            created_at: Utc::now(),
        };
        self.insert_subject(&subject).await?;
        debug!(id = %subject.id, "subject created");
        Ok(subject)
    }

    async fn get_subject(&self, id: &SubjectId) -> Result<Option<Subject>> {
        Storage::get_subject(self, id).await
    }

    async fn list_subjects(&self, owner: &UserId) -> Result<Vec<Subject>> {
        Storage::list_subjects(self, owner).await
    }

    async fn delete_subject(&self, id: &SubjectId) -> Result<bool> {
        Storage::delete_subject(self, id).await
    }

    #[instrument(skip_all, fields(subject = %subject_id, artifacts = payloads.len()))]
    async fn create_lesson(
        &self,
        subject_id: &SubjectId,
        title: &str,
        raw_content: &str,
        source: LessonSource,
        payloads: &BTreeMap<ContentMode, Payload>,
    ) -> Result<Lesson> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StudyGenError::validation("lesson title must not be empty"));
        }
        if Storage::get_subject(self, subject_id).await?.is_none() {
            return Err(StudyGenError::NotFound(format!("subject {subject_id}")));
        }

        let lesson = Lesson {
            id: LessonId::new(),
            subject_id: subject_id.clone(),
            title: title.to_string(),
            raw_content: raw_content.to_string(),
            content_hash: content_hash(raw_content),
            source,
            generated: payloads.keys().copied().collect(),
            created_at: Utc::now(),
        };
        let artifacts: Vec<Payload> = payloads.values().cloned().collect();
        self.insert_lesson(&lesson, &artifacts).await?;
        debug!(id = %lesson.id, "lesson created");
        Ok(lesson)
    }

    async fn get_lesson(&self, id: &LessonId) -> Result<Option<Lesson>> {
        Storage::get_lesson(self, id).await
    }

    async fn list_lessons(&self, subject_id: &SubjectId) -> Result<Vec<Lesson>> {
        Storage::list_lessons(self, subject_id).await
    }

    async fn delete_lesson(&self, id: &LessonId) -> Result<bool> {
        Storage::delete_lesson(self, id).await
    }

    async fn lesson_artifacts(&self, id: &LessonId) -> Result<BTreeMap<ContentMode, Payload>> {
        Ok(self
            .list_artifacts(id)
            .await?
            .into_iter()
            .map(|p| (p.mode(), p))
            .collect())
    }
}
