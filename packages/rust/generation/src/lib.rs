//! Prompt construction, the Gemini generation client, and payload validation.
//!
//! The [`ContentGenerator`] trait is the seam the pipeline depends on;
//! [`GeminiClient`] is the production implementation. Every call resolves to
//! a [`GenerationResult`]: transport, shape, parse and validation problems are
//! all values, never panics or early returns past this boundary.

pub mod client;
pub mod prompt;
pub mod validate;

use async_trait::async_trait;

use studygen_shared::{ContentMode, Credential, GenerationResult};

pub use client::GeminiClient;
pub use prompt::{GenerationLimits, TEMPERATURE, build_prompt};
pub use validate::validate_payload;

/// An image sent alongside the prompt (used by text recognition).
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// One generation call: content, target mode, and optional overrides.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub content: String,
    pub mode: ContentMode,
    /// Overrides the client's configured credential for this call.
    pub credential: Option<Credential>,
    pub attachment: Option<Attachment>,
}

impl GenerationRequest {
    pub fn new(content: impl Into<String>, mode: ContentMode) -> Self {
        Self {
            content: content.into(),
            mode,
            credential: None,
            attachment: None,
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// Something that turns a [`GenerationRequest`] into a typed payload.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult;
}
