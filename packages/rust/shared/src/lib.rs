//! Shared types, error model, and configuration for studygen.
//!
//! This crate is the foundation depended on by all other studygen crates.
//! It provides:
//! - [`StudyGenError`] and [`GenerationError`] — the error model
//! - Domain types ([`ContentMode`], [`Payload`], [`Subject`], [`Lesson`])
//! - Configuration ([`AppConfig`], [`GeminiConfig`], config loading)

pub mod config;
pub mod error;
pub mod payload;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, Credential, GeminiConfig, PipelineConfig, ProfileConfig, StorageConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{GenerationError, GenerationResult, Result, StudyGenError};
pub use payload::{
    Flashcard, FlashcardDeck, Payload, QuizQuestion, Quiz, RecognizedText, SectionContent,
    StudySheet, StudySheetSection, SubjectSuggestion, Summary,
};
pub use types::{
    ContentMode, Lesson, LessonId, LessonSource, Subject, SubjectId, UserId, content_hash,
};
