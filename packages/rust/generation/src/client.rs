//! HTTP client for the Gemini `generateContent` endpoint.
//!
//! One call is one POST. The model's text answer is pulled out of the
//! response envelope, repaired into JSON and validated for the requested
//! mode. Transport-level failures may be retried with exponential backoff
//! when `max_retries > 0`; bad model output never is.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;

use studygen_shared::{
    ContentMode, Credential, GeminiConfig, GenerationError, GenerationResult, Result,
    StudyGenError,
};

use crate::prompt::{GenerationLimits, TEMPERATURE, build_prompt};
use crate::validate::validate_payload;
use crate::{Attachment, ContentGenerator, GenerationRequest};

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("studygen/", env!("CARGO_PKG_VERSION"));

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Maximum number of error-body characters kept in a status failure.
const MAX_ERROR_BODY: usize = 500;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    top_k: u32,
    top_p: f64,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    /// Base64-encoded bytes.
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

/// Production [`ContentGenerator`] backed by the Gemini REST API.
pub struct GeminiClient {
    client: Client,
    endpoint: Url,
    credential: Option<Credential>,
    max_retries: u32,
    retry_backoff: Duration,
}

impl GeminiClient {
    /// Create a client from config and an injected default credential.
    ///
    /// `credential` is the fallback used when a request carries none; pass
    /// `None` to require a per-request credential.
    pub fn new(config: &GeminiConfig, credential: Option<Credential>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| StudyGenError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint()?,
            credential,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    /// Issue the POST, retrying transient failures, and return the model text.
    async fn fetch_text(
        &self,
        body: &GenerateContentRequest,
        credential: &Credential,
    ) -> std::result::Result<String, GenerationError> {
        let mut attempt = 0;
        loop {
            match self.send_once(body, credential).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.retry_backoff.saturating_mul(2u32.saturating_pow(attempt));
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient generation failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(
        &self,
        body: &GenerateContentRequest,
        credential: &Credential,
    ) -> std::result::Result<String, GenerationError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(API_KEY_HEADER, credential.expose())
            .json(body)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GenerationError::Transport(format!("body read failed: {e}")))?;

        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY),
            });
        }

        extract_candidate_text(&text)
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    #[instrument(skip_all, fields(mode = %request.mode))]
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        let mode = request.mode;

        if mode == ContentMode::TextRecognition {
            if request.attachment.is_none() {
                return Err(GenerationError::validation(
                    mode,
                    "an image attachment is required",
                ));
            }
        } else if request.content.trim().is_empty() {
            return Err(GenerationError::EmptyContent);
        }

        let Some(credential) = request.credential.as_ref().or(self.credential.as_ref()) else {
            return Err(GenerationError::MissingCredential);
        };

        let body = build_request(request);
        let start = Instant::now();

        let text = self.fetch_text(&body, credential).await?;
        debug!(chars = text.len(), "received model text");

        let value = studygen_repair::parse(&text).map_err(|e| GenerationError::Parse {
            message: e.message,
            raw: e.raw,
        })?;
        let payload = validate_payload(mode, value)?;

        info!(
            latency_ms = start.elapsed().as_millis() as u64,
            "generation succeeded"
        );
        Ok(payload)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build_request(request: &GenerationRequest) -> GenerateContentRequest {
    let limits = GenerationLimits::for_mode(request.mode);

    let mut parts = vec![Part {
        text: Some(build_prompt(&request.content, request.mode)),
        inline_data: None,
    }];
    if let Some(attachment) = &request.attachment {
        parts.push(inline_part(attachment));
    }

    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".into()),
            parts,
        }],
        generation_config: GenerationConfig {
            temperature: TEMPERATURE,
            top_k: limits.top_k,
            top_p: limits.top_p,
            max_output_tokens: limits.max_output_tokens,
        },
    }
}

fn inline_part(attachment: &Attachment) -> Part {
    Part {
        text: None,
        inline_data: Some(InlineData {
            mime_type: attachment.mime_type.clone(),
            data: base64::engine::general_purpose::STANDARD.encode(&attachment.data),
        }),
    }
}

/// Pull the first candidate's text out of a response envelope.
fn extract_candidate_text(body: &str) -> std::result::Result<String, GenerationError> {
    let envelope: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::Shape(format!("envelope is not valid JSON: {e}")))?;

    let candidate = envelope
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::Shape("response has no candidates".into()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
        return Err(GenerationError::Shape(format!(
            "candidate has no text (finish reason: {reason})"
        )));
    }

    Ok(text)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}…")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
