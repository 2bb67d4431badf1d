//! Per-mode payload shapes produced by the generation pipeline.
//!
//! These are the de facto wire contract with the generative model: the field
//! names below are the JSON keys the prompts ask for.

use serde::{Deserialize, Serialize};

use crate::types::ContentMode;

/// `{ title, content }`; `content` is markdown with `##` section markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub title: String,
    pub content: String,
}

/// `{ questions: [...] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
}

/// A multiple-choice question with exactly four options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: [String; 4],
    /// Index into `options`, `0..=3`.
    pub correct: u8,
    pub explanation: String,
}

/// `{ cards: [...] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashcardDeck {
    pub cards: Vec<Flashcard>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

/// `{ title, sections: [...] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySheet {
    pub title: String,
    pub sections: Vec<StudySheetSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySheetSection {
    pub title: String,
    pub content: SectionContent,
}

/// Section body: either prose or a list of bullet points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionContent {
    Text(String),
    Items(Vec<String>),
}

impl SectionContent {
    /// Whether the section carries no visible text.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Items(items) => items.iter().all(|i| i.trim().is_empty()),
        }
    }
}

/// `{ text }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedText {
    pub text: String,
}

/// `{ subject, topics, confidence }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectSuggestion {
    pub subject: String,
    #[serde(default)]
    pub topics: Vec<String>,
    /// Model's own confidence in `[0, 1]`. Required.
    pub confidence: f32,
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// A typed, mode-specific generation result.
///
/// Serializes as the bare per-mode object; the mode travels alongside it
/// (map key, storage column), so deserialization goes through
/// [`Payload::from_value`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Summary(Summary),
    Quiz(Quiz),
    Flashcards(FlashcardDeck),
    StudySheet(StudySheet),
    Text(RecognizedText),
    Classification(SubjectSuggestion),
}

impl Payload {
    /// The mode this payload answers.
    pub fn mode(&self) -> ContentMode {
        match self {
            Self::Summary(_) => ContentMode::Summary,
            Self::Quiz(_) => ContentMode::MultipleChoiceQuiz,
            Self::Flashcards(_) => ContentMode::Flashcards,
            Self::StudySheet(_) => ContentMode::StudySheet,
            Self::Text(_) => ContentMode::TextRecognition,
            Self::Classification(_) => ContentMode::Classification,
        }
    }

    /// Deserialize a JSON value into the payload shape for `mode`.
    pub fn from_value(mode: ContentMode, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match mode {
            ContentMode::Summary => Self::Summary(serde_json::from_value(value)?),
            ContentMode::MultipleChoiceQuiz => Self::Quiz(serde_json::from_value(value)?),
            ContentMode::Flashcards => Self::Flashcards(serde_json::from_value(value)?),
            ContentMode::StudySheet => Self::StudySheet(serde_json::from_value(value)?),
            ContentMode::TextRecognition => Self::Text(serde_json::from_value(value)?),
            ContentMode::Classification => Self::Classification(serde_json::from_value(value)?),
        })
    }
}
