//! Lesson ingest: generate study material for new content and persist it.

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use studygen_shared::{Lesson, LessonSource, Result, StudyGenError, SubjectId};

use crate::pipeline::{PipelineOrchestrator, PipelineProgress, PipelineRun};
use crate::session::SessionProvider;
use crate::store::ContentStore;

/// Input for [`ingest_lesson`].
#[derive(Debug, Clone)]
pub struct NewLesson {
    pub subject_id: SubjectId,
    pub title: String,
    pub content: String,
    pub source: LessonSource,
}

/// The stored lesson and the run that produced its artifacts.
#[derive(Debug)]
pub struct IngestOutcome {
    pub lesson: Lesson,
    pub run: PipelineRun,
}

/// Collaborators needed to ingest a lesson.
pub struct IngestContext<'a> {
    pub session: &'a dyn SessionProvider,
    pub store: &'a dyn ContentStore,
    pub progress: &'a dyn PipelineProgress,
    pub cancel: &'a CancellationToken,
}

/// Run the pipeline over `new.content` and store the lesson with whatever
/// modes succeeded.
///
/// The caller must be signed in and own the subject. A run where every mode
/// failed still stores the lesson, without artifacts. A cancelled run stores
/// nothing.
#[instrument(skip_all, fields(subject = %new.subject_id, title = %new.title))]
pub async fn ingest_lesson(
    ctx: &IngestContext<'_>,
    orchestrator: &mut PipelineOrchestrator,
    new: NewLesson,
) -> Result<IngestOutcome> {
    let user = ctx
        .session
        .current_user()
        .ok_or(StudyGenError::Unauthenticated)?;

    // Someone else's subject is reported as missing.
    let subject = ctx
        .store
        .get_subject(&new.subject_id)
        .await?
        .filter(|s| s.owner == user)
        .ok_or_else(|| StudyGenError::NotFound(format!("subject {}", new.subject_id)))?;

    if new.title.trim().is_empty() {
        return Err(StudyGenError::validation("lesson title must not be empty"));
    }
    if new.content.trim().is_empty() {
        return Err(StudyGenError::validation("lesson content must not be empty"));
    }

    let run = orchestrator
        .generate_all(&new.content, ctx.progress, ctx.cancel)
        .await;
    if !run.is_completed() {
        return Err(StudyGenError::Cancelled);
    }

    for note in run.notifications() {
        warn!("{note}");
    }

    let lesson = ctx
        .store
        .create_lesson(
            &subject.id,
            &new.title,
            &new.content,
            new.source,
            &run.payloads(),
        )
        .await?;

    info!(
        lesson = %lesson.id,
        generated = lesson.generated.len(),
        failed = run.failures().len(),
        "lesson ingested"
    );

    Ok(IngestOutcome { lesson, run })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::pipeline::SilentProgress;
    use crate::session::LocalSession;
    use crate::test_support::StubGenerator;
    use studygen_shared::{ContentMode, GenerationError, PipelineConfig, UserId};
    use studygen_storage::Storage;
    use uuid::Uuid;

    const CONTENT: &str = "Photosynthesis converts light energy into chemical energy stored \
                           in glucose.";

    async fn test_store() -> Storage {
        let tmp = std::env::temp_dir().join(format!("sg_ingest_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn signed_in(user: &str) -> LocalSession {
        let session = LocalSession::new();
        session.sign_in(UserId(user.into())).unwrap();
        session
    }

    fn orchestrator(generator: StubGenerator) -> PipelineOrchestrator {
        PipelineOrchestrator::new(Arc::new(generator), &PipelineConfig::default())
            .with_step_pause(Duration::ZERO)
    }

    fn new_lesson(subject_id: &SubjectId, content: &str) -> NewLesson {
        NewLesson {
            subject_id: subject_id.clone(),
            title: "Photosynthesis".into(),
            content: content.into(),
            source: LessonSource::Text,
        }
    }

    #[tokio::test]
    async fn partial_success_is_persisted() {
        let store = test_store().await;
        let session = signed_in("ada");
        let subject = store
            .create_subject(&UserId("ada".into()), "Biology", None, None)
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        let ctx = IngestContext {
            session: &session,
            store: &store,
            progress: &SilentProgress,
            cancel: &cancel,
        };
        let mut orch = orchestrator(StubGenerator::failing_on(
            ContentMode::Flashcards,
            GenerationError::Status {
                status: 500,
                body: "internal".into(),
            },
        ));

        let outcome = ingest_lesson(&ctx, &mut orch, new_lesson(&subject.id, CONTENT))
            .await
            .unwrap();

        assert_eq!(
            outcome.lesson.generated,
            [
                ContentMode::Summary,
                ContentMode::MultipleChoiceQuiz,
                ContentMode::StudySheet
            ]
        );
        assert_eq!(outcome.run.notifications().len(), 1);
        let stored = store.lesson_artifacts(&outcome.lesson.id).await.unwrap();
        assert_eq!(stored, outcome.run.payloads());
    }

    #[tokio::test]
    async fn total_failure_still_stores_lesson() {
        let store = test_store().await;
        let session = signed_in("ada");
        let subject = store
            .create_subject(&UserId("ada".into()), "Biology", None, None)
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        let ctx = IngestContext {
            session: &session,
            store: &store,
            progress: &SilentProgress,
            cancel: &cancel,
        };
        let mut orch = orchestrator(StubGenerator::failing_all(GenerationError::Status {
            status: 429,
            body: "quota".into(),
        }));

        let outcome = ingest_lesson(&ctx, &mut orch, new_lesson(&subject.id, CONTENT))
            .await
            .unwrap();

        assert!(outcome.lesson.generated.is_empty());
        assert_eq!(outcome.run.failures().len(), 4);
        assert_eq!(store.list_lessons(&subject.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn requires_signed_in_user() {
        let store = test_store().await;
        let session = LocalSession::new();
        let subject = store
            .create_subject(&UserId("ada".into()), "Biology", None, None)
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        let ctx = IngestContext {
            session: &session,
            store: &store,
            progress: &SilentProgress,
            cancel: &cancel,
        };
        let mut orch = orchestrator(StubGenerator::succeeding());

        let err = ingest_lesson(&ctx, &mut orch, new_lesson(&subject.id, CONTENT))
            .await
            .unwrap_err();
        assert!(matches!(err, StudyGenError::Unauthenticated));
    }

    #[tokio::test]
    async fn other_users_subject_is_not_found() {
        let store = test_store().await;
        let session = signed_in("grace");
        let subject = store
            .create_subject(&UserId("ada".into()), "Biology", None, None)
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        let ctx = IngestContext {
            session: &session,
            store: &store,
            progress: &SilentProgress,
            cancel: &cancel,
        };
        let mut orch = orchestrator(StubGenerator::succeeding());

        let err = ingest_lesson(&ctx, &mut orch, new_lesson(&subject.id, CONTENT))
            .await
            .unwrap_err();
        assert!(matches!(err, StudyGenError::NotFound(_)));
    }

    #[tokio::test]
    async fn blank_content_rejected_before_generation() {
        let store = test_store().await;
        let session = signed_in("ada");
        let subject = store
            .create_subject(&UserId("ada".into()), "Biology", None, None)
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        let ctx = IngestContext {
            session: &session,
            store: &store,
            progress: &SilentProgress,
            cancel: &cancel,
        };
        let generator = Arc::new(StubGenerator::succeeding());
        let mut orch = PipelineOrchestrator::new(generator.clone(), &PipelineConfig::default());

        let err = ingest_lesson(&ctx, &mut orch, new_lesson(&subject.id, "  \n "))
            .await
            .unwrap_err();
        assert!(matches!(err, StudyGenError::Validation { .. }));
        assert!(generator.calls().is_empty());
    }

    #[tokio::test]
    async fn cancelled_run_stores_nothing() {
        let store = test_store().await;
        let session = signed_in("ada");
        let subject = store
            .create_subject(&UserId("ada".into()), "Biology", None, None)
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        let ctx = IngestContext {
            session: &session,
            store: &store,
            progress: &SilentProgress,
            cancel: &cancel,
        };
        let mut orch = orchestrator(
            StubGenerator::succeeding().cancel_after(ContentMode::Summary, cancel.clone()),
        );

        let err = ingest_lesson(&ctx, &mut orch, new_lesson(&subject.id, CONTENT))
            .await
            .unwrap_err();
        assert!(matches!(err, StudyGenError::Cancelled));
        assert!(store.list_lessons(&subject.id).await.unwrap().is_empty());
    }
}
