//! Core orchestration and domain workflows for studygen.
//!
//! This crate runs the generation pipeline over lesson content, defines the
//! content store and session seams, and ties them together in
//! [`ingest::ingest_lesson`].

pub mod ingest;
pub mod pipeline;
pub mod session;
pub mod store;

#[cfg(test)]
mod test_support;

pub use ingest::{IngestContext, IngestOutcome, NewLesson, ingest_lesson};
pub use pipeline::{
    PipelineOrchestrator, PipelineProgress, PipelineRun, RunState, SilentProgress, StepOutcome,
    StepRecord,
};
pub use session::{AuthState, LocalSession, SessionProvider};
pub use store::ContentStore;
