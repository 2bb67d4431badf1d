//! Core domain types for studygen: content modes, subjects, and lessons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ContentMode
// ---------------------------------------------------------------------------

/// A generation target. Each mode has one prompt template and one payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentMode {
    Summary,
    MultipleChoiceQuiz,
    Flashcards,
    StudySheet,
    /// Transcribe text from an attached image.
    TextRecognition,
    /// Suggest a subject for a piece of content.
    Classification,
}

impl ContentMode {
    /// The modes a pipeline run generates, in execution order.
    pub const PIPELINE: [ContentMode; 4] = [
        Self::Summary,
        Self::MultipleChoiceQuiz,
        Self::Flashcards,
        Self::StudySheet,
    ];

    /// Every mode, including the auxiliary ones.
    pub const ALL: [ContentMode; 6] = [
        Self::Summary,
        Self::MultipleChoiceQuiz,
        Self::Flashcards,
        Self::StudySheet,
        Self::TextRecognition,
        Self::Classification,
    ];

    /// Stable key used in storage and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::MultipleChoiceQuiz => "multiple_choice_quiz",
            Self::Flashcards => "flashcards",
            Self::StudySheet => "study_sheet",
            Self::TextRecognition => "text_recognition",
            Self::Classification => "classification",
        }
    }

    /// Human-readable name for notifications.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::MultipleChoiceQuiz => "quiz",
            Self::Flashcards => "flashcards",
            Self::StudySheet => "study sheet",
            Self::TextRecognition => "text recognition",
            Self::Classification => "classification",
        }
    }
}

impl std::fmt::Display for ContentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for ContentMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "summary" => Ok(Self::Summary),
            "quiz" | "multiple_choice_quiz" => Ok(Self::MultipleChoiceQuiz),
            "flashcards" | "cards" => Ok(Self::Flashcards),
            "study_sheet" | "sheet" => Ok(Self::StudySheet),
            "text_recognition" | "ocr" => Ok(Self::TextRecognition),
            "classification" | "classify" => Ok(Self::Classification),
            other => Err(format!("unknown content mode '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for subject identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub Uuid);

/// A UUID v7 wrapper for lesson identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LessonId(pub Uuid);

macro_rules! uuid_id {
    ($name:ident) => {
        impl $name {
            /// Generate a new time-sortable identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(SubjectId);
uuid_id!(LessonId);

/// Identity of the signed-in user, as handed out by the session provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Subject / Lesson
// ---------------------------------------------------------------------------

/// A study subject grouping lessons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub owner: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Display color, e.g. `#4f46e5`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// How the lesson content reached the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonSource {
    /// Pasted text.
    Text,
    /// Uploaded text file.
    File,
    /// Text recognized from an image.
    Image,
}

impl LessonSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::File => "file",
            Self::Image => "image",
        }
    }
}

impl std::str::FromStr for LessonSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "file" => Ok(Self::File),
            "image" => Ok(Self::Image),
            other => Err(format!("unknown lesson source '{other}'")),
        }
    }
}

/// A lesson: original content plus the modes generated from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub subject_id: SubjectId,
    pub title: String,
    pub raw_content: String,
    /// SHA-256 of `raw_content`.
    pub content_hash: String,
    pub source: LessonSource,
    /// Modes with a stored artifact, in pipeline order.
    #[serde(default)]
    pub generated: Vec<ContentMode>,
    pub created_at: DateTime<Utc>,
}

/// Compute the SHA-256 hex digest of lesson content.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
