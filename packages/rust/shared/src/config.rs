//! Application configuration for studygen.
//!
//! User config lives at `~/.studygen/studygen.toml`.
//! CLI flags override config file values, which override defaults.
//! The Gemini API key is never stored in the file; the config only names the
//! environment variable that holds it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, StudyGenError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "studygen.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".studygen";

// ---------------------------------------------------------------------------
// Config structs (matching studygen.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generative model endpoint settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Pipeline pacing.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Local content store.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Local identity.
    #[serde(default)]
    pub profile: ProfileConfig,
}

/// `[gemini]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// API root, overridable for proxies and tests.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for every mode.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Extra attempts for transport-level failures. 0 = single shot.
    #[serde(default)]
    pub max_retries: u32,

    /// Initial backoff between retries; doubles per attempt.
    #[serde(default = "default_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
            request_timeout_secs: default_timeout(),
            max_retries: 0,
            retry_backoff_ms: default_backoff(),
        }
    }
}

impl GeminiConfig {
    /// Full `generateContent` URL for the configured model.
    pub fn endpoint(&self) -> Result<Url> {
        let base = Url::parse(&self.base_url).map_err(|e| {
            StudyGenError::config(format!("invalid gemini.base_url '{}': {e}", self.base_url))
        })?;
        let path = format!("v1beta/models/{}:generateContent", self.model);
        // Url::join drops the last path segment unless the base ends in '/'.
        let base = if base.path().ends_with('/') {
            base
        } else {
            Url::parse(&format!("{}/", base.as_str())).map_err(|e| {
                StudyGenError::config(format!("invalid gemini.base_url: {e}"))
            })?
        };
        base.join(&path)
            .map_err(|e| StudyGenError::config(format!("invalid model name '{}': {e}", self.model)))
    }

    /// Read the API key from the configured environment variable.
    pub fn resolve_credential(&self) -> Option<Credential> {
        match std::env::var(&self.api_key_env) {
            Ok(val) if !val.trim().is_empty() => Some(Credential::new(val.trim())),
            _ => None,
        }
    }
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn default_model() -> String {
    "gemini-1.5-flash".into()
}
fn default_timeout() -> u64 {
    60
}
fn default_backoff() -> u64 {
    500
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pause between pipeline steps so callers can render progress.
    #[serde(default = "default_step_pause")]
    pub step_pause_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            step_pause_ms: default_step_pause(),
        }
    }
}

fn default_step_pause() -> u64 {
    300
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file. Defaults to `~/.studygen/studygen.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
}

impl StorageConfig {
    /// Resolve the database path, falling back to the config directory.
    pub fn resolved_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(p) => Ok(PathBuf::from(p)),
            None => Ok(config_dir()?.join("studygen.db")),
        }
    }
}

/// `[profile]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// User the local session signs in as.
    #[serde(default = "default_user")]
    pub user: String,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            user: default_user(),
        }
    }
}

fn default_user() -> String {
    "local".into()
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// An API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw secret, for the request header only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.studygen/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| StudyGenError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.studygen/studygen.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| StudyGenError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        StudyGenError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| StudyGenError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| StudyGenError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| StudyGenError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
