//! Mode-specific payload validation.
//!
//! Turns a repaired JSON value into a typed [`Payload`] and checks the
//! invariants serde cannot express (non-empty lists, index ranges, blank
//! strings). Anything that fails here is a validation error: the model
//! produced valid JSON, just not the content we asked for.

use serde_json::Value;

use studygen_shared::{
    ContentMode, FlashcardDeck, GenerationError, Payload, Quiz, StudySheet, SubjectSuggestion,
    Summary,
};

/// Convert `value` into the payload for `mode`, rejecting incomplete content.
pub fn validate_payload(mode: ContentMode, value: Value) -> Result<Payload, GenerationError> {
    let payload = Payload::from_value(mode, value)
        .map_err(|e| GenerationError::validation(mode, e.to_string()))?;

    let checked = match &payload {
        Payload::Summary(summary) => check_summary(summary),
        Payload::Quiz(quiz) => check_quiz(quiz),
        Payload::Flashcards(deck) => check_flashcards(deck),
        Payload::StudySheet(sheet) => check_study_sheet(sheet),
        Payload::Text(text) => {
            if text.text.trim().is_empty() {
                Err("no text was recognized".to_string())
            } else {
                Ok(())
            }
        }
        Payload::Classification(suggestion) => check_classification(suggestion),
    };

    checked
        .map(|()| payload)
        .map_err(|message| GenerationError::validation(mode, message))
}

fn check_summary(summary: &Summary) -> Result<(), String> {
    if summary.title.trim().is_empty() {
        return Err("summary title is empty".into());
    }
    if summary.content.trim().is_empty() {
        return Err("summary content is empty".into());
    }
    Ok(())
}

fn check_quiz(quiz: &Quiz) -> Result<(), String> {
    if quiz.questions.is_empty() {
        return Err("quiz has no questions".into());
    }
    for (i, q) in quiz.questions.iter().enumerate() {
        let n = i + 1;
        if q.question.trim().is_empty() {
            return Err(format!("question {n} has no text"));
        }
        if q.options.iter().any(|o| o.trim().is_empty()) {
            return Err(format!("question {n} has an empty option"));
        }
        if q.correct > 3 {
            return Err(format!(
                "question {n} marks option {} as correct, expected 0-3",
                q.correct
            ));
        }
    }
    Ok(())
}

fn check_flashcards(deck: &FlashcardDeck) -> Result<(), String> {
    if deck.cards.is_empty() {
        return Err("deck has no cards".into());
    }
    for (i, card) in deck.cards.iter().enumerate() {
        if card.front.trim().is_empty() || card.back.trim().is_empty() {
            return Err(format!("card {} has an empty side", i + 1));
        }
    }
    Ok(())
}

fn check_study_sheet(sheet: &StudySheet) -> Result<(), String> {
    if sheet.title.trim().is_empty() {
        return Err("study sheet title is empty".into());
    }
    if sheet.sections.is_empty() {
        return Err("study sheet has no sections".into());
    }
    for (i, section) in sheet.sections.iter().enumerate() {
        if section.title.trim().is_empty() {
            return Err(format!("section {} has no title", i + 1));
        }
        if section.content.is_blank() {
            return Err(format!("section '{}' is empty", section.title));
        }
    }
    Ok(())
}

fn check_classification(suggestion: &SubjectSuggestion) -> Result<(), String> {
    if suggestion.subject.trim().is_empty() {
        return Err("no subject suggested".into());
    }
    if !(0.0..=1.0).contains(&suggestion.confidence) {
        return Err(format!(
            "confidence {} is outside 0-1",
            suggestion.confidence
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quiz_question(correct: u8) -> Value {
        json!({
            "question": "What does chlorophyll absorb?",
            "options": ["Light", "Water", "Oxygen", "Glucose"],
            "correct": correct,
            "explanation": "Chlorophyll absorbs light."
        })
    }

    #[test]
    fn valid_quiz_accepted() {
        let value = json!({ "questions": [quiz_question(0), quiz_question(3)] });
        let payload = validate_payload(ContentMode::MultipleChoiceQuiz, value).unwrap();
        let Payload::Quiz(quiz) = payload else {
            panic!("expected quiz");
        };
        assert_eq!(quiz.questions.len(), 2);
    }

    #[test]
    fn empty_quiz_rejected_as_validation_error() {
        let err =
            validate_payload(ContentMode::MultipleChoiceQuiz, json!({ "questions": [] }))
                .unwrap_err();
        assert_eq!(
            err,
            GenerationError::validation(ContentMode::MultipleChoiceQuiz, "quiz has no questions")
        );
    }

    #[test]
    fn out_of_range_answer_rejected() {
        let value = json!({ "questions": [quiz_question(4)] });
        let err = validate_payload(ContentMode::MultipleChoiceQuiz, value).unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(err.to_string().contains("expected 0-3"));
    }

    #[test]
    fn missing_field_is_validation_error() {
        let err = validate_payload(ContentMode::Summary, json!({ "title": "Cells" })).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Validation {
                mode: ContentMode::Summary,
                ..
            }
        ));
    }

    #[test]
    fn empty_deck_rejected() {
        let err = validate_payload(ContentMode::Flashcards, json!({ "cards": [] })).unwrap_err();
        assert!(err.to_string().contains("no cards"));
    }

    #[test]
    fn blank_card_side_rejected() {
        let value = json!({ "cards": [{ "front": "ATP", "back": "  " }] });
        assert!(validate_payload(ContentMode::Flashcards, value).is_err());
    }

    #[test]
    fn study_sheet_needs_sections() {
        let err = validate_payload(
            ContentMode::StudySheet,
            json!({ "title": "Cells", "sections": [] }),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no sections"));

        let ok = validate_payload(
            ContentMode::StudySheet,
            json!({
                "title": "Cells",
                "sections": [{ "title": "Organelles", "content": ["Nucleus"] }]
            }),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn classification_confidence_bounds() {
        let ok = json!({ "subject": "Biology", "topics": ["Cells"], "confidence": 0.8 });
        assert!(validate_payload(ContentMode::Classification, ok).is_ok());

        let bad = json!({ "subject": "Biology", "confidence": 7 });
        assert!(validate_payload(ContentMode::Classification, bad).is_err());
    }

    #[test]
    fn classification_without_confidence_rejected() {
        let err = validate_payload(
            ContentMode::Classification,
            json!({ "subject": "Biology", "topics": ["Cells"] }),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Validation {
                mode: ContentMode::Classification,
                ..
            }
        ));
        assert!(err.to_string().contains("confidence"));
    }

    #[test]
    fn recognized_text_must_not_be_blank() {
        assert!(validate_payload(ContentMode::TextRecognition, json!({ "text": "" })).is_err());
        assert!(
            validate_payload(ContentMode::TextRecognition, json!({ "text": "Chapter 1" })).is_ok()
        );
    }
}
