//! Stub generator and canned payloads shared by the core tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use studygen_generation::{ContentGenerator, GenerationRequest};
use studygen_shared::{
    ContentMode, Flashcard, FlashcardDeck, GenerationError, GenerationResult, Payload, Quiz,
    QuizQuestion, SectionContent, StudySheet, StudySheetSection, Summary,
};

/// A fixed, valid payload for each pipeline mode.
pub fn sample_payload(mode: ContentMode) -> Payload {
    match mode {
        ContentMode::Summary => Payload::Summary(Summary {
            title: "Photosynthesis".into(),
            content: "## Overview\nPlants turn light into glucose.".into(),
        }),
        ContentMode::MultipleChoiceQuiz => Payload::Quiz(Quiz {
            questions: vec![QuizQuestion {
                question: "What is produced?".into(),
                options: [
                    "Glucose".into(),
                    "Nitrogen".into(),
                    "Salt".into(),
                    "Iron".into(),
                ],
                correct: 0,
                explanation: "Glucose stores the captured energy.".into(),
            }],
        }),
        ContentMode::Flashcards => Payload::Flashcards(FlashcardDeck {
            cards: vec![Flashcard {
                front: "Chlorophyll".into(),
                back: "Pigment that absorbs light".into(),
            }],
        }),
        ContentMode::StudySheet => Payload::StudySheet(StudySheet {
            title: "Photosynthesis".into(),
            sections: vec![StudySheetSection {
                title: "Key concepts".into(),
                content: SectionContent::Items(vec!["Light reactions".into()]),
            }],
        }),
        other => panic!("no sample payload for {other}"),
    }
}

/// Answers every request with [`sample_payload`] unless told otherwise.
#[derive(Default)]
pub struct StubGenerator {
    failures: HashMap<ContentMode, GenerationError>,
    fail_all: Option<GenerationError>,
    cancel_after: Option<(ContentMode, CancellationToken)>,
    calls: Mutex<Vec<ContentMode>>,
}

impl StubGenerator {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing_on(mode: ContentMode, error: GenerationError) -> Self {
        let mut stub = Self::default();
        stub.failures.insert(mode, error);
        stub
    }

    pub fn failing_all(error: GenerationError) -> Self {
        Self {
            fail_all: Some(error),
            ..Self::default()
        }
    }

    /// Cancel `token` once the request for `mode` has been answered.
    pub fn cancel_after(mut self, mode: ContentMode, token: CancellationToken) -> Self {
        self.cancel_after = Some((mode, token));
        self
    }

    /// Modes requested so far, in order.
    pub fn calls(&self) -> Vec<ContentMode> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentGenerator for StubGenerator {
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        self.calls.lock().unwrap().push(request.mode);

        if let Some((mode, token)) = &self.cancel_after {
            if *mode == request.mode {
                token.cancel();
            }
        }

        if let Some(e) = &self.fail_all {
            return Err(e.clone());
        }
        match self.failures.get(&request.mode) {
            Some(e) => Err(e.clone()),
            None => Ok(sample_payload(request.mode)),
        }
    }
}
