//! CLI command definitions, routing, and tracing setup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, bail, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use studygen_core::{
    ContentStore, IngestContext, LocalSession, NewLesson, PipelineOrchestrator, PipelineProgress,
    SessionProvider, ingest_lesson,
};
use studygen_generation::{Attachment, ContentGenerator, GeminiClient, GenerationRequest};
use studygen_shared::{
    AppConfig, ContentMode, GenerationResult, Lesson, LessonId, LessonSource, Payload, Subject,
    SubjectId, UserId, init_config, load_config,
};
use studygen_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// studygen: AI-generated study material from your notes.
#[derive(Parser)]
#[command(
    name = "studygen",
    version,
    about = "Generate summaries, quizzes, flashcards and study sheets from study material.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Manage subjects.
    Subject {
        #[command(subcommand)]
        action: SubjectAction,
    },

    /// Add, inspect and remove lessons.
    Lesson {
        #[command(subcommand)]
        action: LessonAction,
    },

    /// Generate a single mode and print the payload as JSON.
    Generate {
        /// summary, quiz, flashcards, sheet, ocr or classify.
        #[arg(short, long)]
        mode: ContentMode,

        #[command(flatten)]
        input: InputArgs,
    },

    /// Suggest which subject some content belongs to.
    Classify {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Subject subcommands.
#[derive(Subcommand)]
pub(crate) enum SubjectAction {
    /// Create a subject.
    Add {
        name: String,

        #[arg(short, long)]
        description: Option<String>,

        /// Display color, e.g. #16a34a.
        #[arg(short, long)]
        color: Option<String>,
    },
    /// List your subjects.
    List,
    /// Delete a subject and all of its lessons.
    Remove { id: String },
}

/// Lesson subcommands.
#[derive(Subcommand)]
pub(crate) enum LessonAction {
    /// Create a lesson and generate its study material.
    Add {
        /// Subject ID.
        #[arg(long)]
        subject: String,

        #[arg(long)]
        title: String,

        #[command(flatten)]
        input: InputArgs,
    },
    /// List the lessons of a subject.
    List {
        /// Subject ID.
        #[arg(long)]
        subject: String,
    },
    /// Show a lesson and its generated material.
    Show {
        id: String,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Delete a lesson.
    Remove { id: String },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

/// Where lesson content comes from.
#[derive(Args, Debug, Default)]
pub(crate) struct InputArgs {
    /// Read content from a text file.
    #[arg(long, conflicts_with_all = ["text", "image"])]
    pub file: Option<PathBuf>,

    /// Content given inline. With --image, extra notes for transcription.
    #[arg(long)]
    pub text: Option<String>,

    /// Transcribe an image (png, jpeg, webp, heic, gif) and use its text.
    #[arg(long)]
    pub image: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "studygen=info",
        1 => "studygen=debug",
        _ => "studygen=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Subject { action } => match action {
            SubjectAction::Add {
                name,
                description,
                color,
            } => cmd_subject_add(&name, description.as_deref(), color.as_deref()).await,
            SubjectAction::List => cmd_subject_list().await,
            SubjectAction::Remove { id } => cmd_subject_remove(&id).await,
        },
        Command::Lesson { action } => match action {
            LessonAction::Add {
                subject,
                title,
                input,
            } => cmd_lesson_add(&subject, title, &input).await,
            LessonAction::List { subject } => cmd_lesson_list(&subject).await,
            LessonAction::Show { id, json } => cmd_lesson_show(&id, json).await,
            LessonAction::Remove { id } => cmd_lesson_remove(&id).await,
        },
        Command::Generate { mode, input } => cmd_generate(mode, &input).await,
        Command::Classify { input } => cmd_classify(&input).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Shared setup
// ---------------------------------------------------------------------------

/// Build the Gemini client, failing early when no API key is available.
fn build_client(config: &AppConfig) -> Result<GeminiClient> {
    let credential = config.gemini.resolve_credential().ok_or_else(|| {
        eyre!(
            "no API key found: set the {} environment variable",
            config.gemini.api_key_env
        )
    })?;
    Ok(GeminiClient::new(&config.gemini, Some(credential))?)
}

async fn open_storage(config: &AppConfig) -> Result<Storage> {
    let path = config.storage.resolved_path()?;
    Ok(Storage::open(&path).await?)
}

fn require_user(session: &dyn SessionProvider) -> Result<UserId> {
    session
        .current_user()
        .ok_or_else(|| eyre!("not signed in: set [profile] user in the config file"))
}

fn parse_subject_id(id: &str) -> Result<SubjectId> {
    id.parse()
        .map_err(|e| eyre!("invalid subject id '{id}': {e}"))
}

fn parse_lesson_id(id: &str) -> Result<LessonId> {
    id.parse()
        .map_err(|e| eyre!("invalid lesson id '{id}': {e}"))
}

/// Load a subject owned by `user`; anything else reads as not found.
async fn owned_subject(store: &dyn ContentStore, id: &SubjectId, user: &UserId) -> Result<Subject> {
    store
        .get_subject(id)
        .await?
        .filter(|s| &s.owner == user)
        .ok_or_else(|| eyre!("subject {id} not found"))
}

async fn owned_lesson(store: &dyn ContentStore, id: &LessonId, user: &UserId) -> Result<Lesson> {
    let lesson = store
        .get_lesson(id)
        .await?
        .ok_or_else(|| eyre!("lesson {id} not found"))?;
    owned_subject(store, &lesson.subject_id, user)
        .await
        .map_err(|_| eyre!("lesson {id} not found"))?;
    Ok(lesson)
}

/// Cancel the returned token on Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping after the current step");
            child.cancel();
        }
    });
    token
}

fn image_mime(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Ok("image/png"),
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "webp" => Ok("image/webp"),
        "heic" => Ok("image/heic"),
        "gif" => Ok("image/gif"),
        _ => bail!("unsupported image type '{}'", path.display()),
    }
}

fn load_image(path: &Path) -> Result<Attachment> {
    let mime_type = image_mime(path)?;
    let data =
        std::fs::read(path).map_err(|e| eyre!("cannot read '{}': {e}", path.display()))?;
    Ok(Attachment {
        mime_type: mime_type.to_string(),
        data,
    })
}

/// Transcribe the text in an image, with optional notes as context.
async fn transcribe(
    generator: &dyn ContentGenerator,
    path: &Path,
    notes: Option<&str>,
) -> Result<String> {
    let request = GenerationRequest::new(notes.unwrap_or_default(), ContentMode::TextRecognition)
        .with_attachment(load_image(path)?);
    match generator.generate(&request).await? {
        Payload::Text(recognized) => Ok(recognized.text),
        other => bail!("unexpected {} payload from text recognition", other.mode()),
    }
}

/// Resolve the content of `input`, transcribing images first.
async fn read_input(
    input: &InputArgs,
    generator: &dyn ContentGenerator,
) -> Result<(String, LessonSource)> {
    if let Some(path) = &input.image {
        let text = transcribe(generator, path, input.text.as_deref()).await?;
        return Ok((text, LessonSource::Image));
    }
    if let Some(path) = &input.file {
        let text = std::fs::read_to_string(path)
            .map_err(|e| eyre!("cannot read '{}': {e}", path.display()))?;
        return Ok((text, LessonSource::File));
    }
    if let Some(text) = &input.text {
        return Ok((text.clone(), LessonSource::Text));
    }
    bail!("provide content with --file, --text or --image")
}

/// Resolve lesson content once the user is known to own the subject, so an
/// image is only transcribed for a lesson that can be stored.
async fn lesson_input(
    session: &dyn SessionProvider,
    store: &dyn ContentStore,
    subject_id: &SubjectId,
    input: &InputArgs,
    generator: &dyn ContentGenerator,
) -> Result<(String, LessonSource)> {
    let user = require_user(session)?;
    owned_subject(store, subject_id, &user).await?;
    read_input(input, generator).await
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

fn spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    spinner.set_style(style);
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Pipeline progress on an indicatif spinner, one line per finished step.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        Self {
            spinner: spinner("Starting"),
        }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl PipelineProgress for CliProgress {
    fn step_started(&self, step: usize, total: usize, mode: ContentMode) {
        self.spinner
            .set_message(format!("[{step}/{total}] Generating {mode}"));
    }

    fn step_finished(
        &self,
        step: usize,
        total: usize,
        mode: ContentMode,
        result: &GenerationResult,
    ) {
        match result {
            Ok(_) => self.spinner.println(format!("  ✓ [{step}/{total}] {mode}")),
            Err(e) => self
                .spinner
                .println(format!("  ✗ [{step}/{total}] {mode}: {e}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Subject commands
// ---------------------------------------------------------------------------

async fn cmd_subject_add(
    name: &str,
    description: Option<&str>,
    color: Option<&str>,
) -> Result<()> {
    let config = load_config()?;
    let session = LocalSession::from_profile(&config.profile);
    let user = require_user(&session)?;
    let store = open_storage(&config).await?;

    let subject = store.create_subject(&user, name, description, color).await?;
    info!(id = %subject.id, name = %subject.name, "subject created");

    println!("Created subject '{}' ({})", subject.name, subject.id);
    Ok(())
}

async fn cmd_subject_list() -> Result<()> {
    let config = load_config()?;
    let session = LocalSession::from_profile(&config.profile);
    let user = require_user(&session)?;
    let store = open_storage(&config).await?;

    let subjects = ContentStore::list_subjects(&store, &user).await?;
    if subjects.is_empty() {
        println!("No subjects yet. Create one with `studygen subject add <name>`.");
        return Ok(());
    }
    for subject in subjects {
        let lessons = ContentStore::list_lessons(&store, &subject.id).await?.len();
        println!("{}  {}  ({lessons} lessons)", subject.id, subject.name);
        if let Some(description) = &subject.description {
            println!("    {description}");
        }
    }
    Ok(())
}

async fn cmd_subject_remove(id: &str) -> Result<()> {
    let config = load_config()?;
    let session = LocalSession::from_profile(&config.profile);
    let user = require_user(&session)?;
    let store = open_storage(&config).await?;

    let id = parse_subject_id(id)?;
    let subject = owned_subject(&store, &id, &user).await?;
    ContentStore::delete_subject(&store, &id).await?;

    println!("Removed subject '{}' and its lessons", subject.name);
    Ok(())
}

// ---------------------------------------------------------------------------
// Lesson commands
// ---------------------------------------------------------------------------

async fn cmd_lesson_add(subject: &str, title: String, input: &InputArgs) -> Result<()> {
    let config = load_config()?;
    let client = Arc::new(build_client(&config)?);
    let store = open_storage(&config).await?;
    let session = LocalSession::from_profile(&config.profile);
    let subject_id = parse_subject_id(subject)?;

    let (content, source) = if input.image.is_some() {
        let transcribing = spinner("Transcribing image");
        let result = lesson_input(&session, &store, &subject_id, input, client.as_ref()).await;
        transcribing.finish_and_clear();
        result?
    } else {
        lesson_input(&session, &store, &subject_id, input, client.as_ref()).await?
    };

    let cancel = cancel_on_ctrl_c();
    let progress = CliProgress::new();
    let mut orchestrator = PipelineOrchestrator::new(client, &config.pipeline);
    let ctx = IngestContext {
        session: &session,
        store: &store,
        progress: &progress,
        cancel: &cancel,
    };

    let result = ingest_lesson(
        &ctx,
        &mut orchestrator,
        NewLesson {
            subject_id,
            title,
            content,
            source,
        },
    )
    .await;
    progress.finish();
    let outcome = result?;

    println!();
    println!("  Lesson created!");
    println!("  ID:        {}", outcome.lesson.id);
    println!("  Title:     {}", outcome.lesson.title);
    println!(
        "  Generated: {}/{}",
        outcome.lesson.generated.len(),
        ContentMode::PIPELINE.len()
    );
    println!("  Time:      {:.1}s", outcome.run.elapsed().as_secs_f64());
    for note in outcome.run.notifications() {
        println!("  ! {note}");
    }
    println!();

    Ok(())
}

async fn cmd_lesson_list(subject: &str) -> Result<()> {
    let config = load_config()?;
    let session = LocalSession::from_profile(&config.profile);
    let user = require_user(&session)?;
    let store = open_storage(&config).await?;

    let subject = owned_subject(&store, &parse_subject_id(subject)?, &user).await?;
    let lessons = ContentStore::list_lessons(&store, &subject.id).await?;
    if lessons.is_empty() {
        println!("No lessons in '{}'.", subject.name);
        return Ok(());
    }
    for lesson in lessons {
        let modes: Vec<&str> = lesson.generated.iter().map(|m| m.label()).collect();
        println!(
            "{}  {}  [{}]",
            lesson.id,
            lesson.title,
            if modes.is_empty() {
                "nothing generated".to_string()
            } else {
                modes.join(", ")
            }
        );
    }
    Ok(())
}

async fn cmd_lesson_show(id: &str, json: bool) -> Result<()> {
    let config = load_config()?;
    let session = LocalSession::from_profile(&config.profile);
    let user = require_user(&session)?;
    let store = open_storage(&config).await?;

    let lesson = owned_lesson(&store, &parse_lesson_id(id)?, &user).await?;
    let artifacts = store.lesson_artifacts(&lesson.id).await?;

    if json {
        let artifacts: BTreeMap<&str, &Payload> =
            artifacts.iter().map(|(m, p)| (m.as_str(), p)).collect();
        let doc = serde_json::json!({ "lesson": lesson, "artifacts": artifacts });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("{}", lesson.title);
    println!("  ID:      {}", lesson.id);
    println!("  Subject: {}", lesson.subject_id);
    println!("  Source:  {}", lesson.source.as_str());
    println!("  Created: {}", lesson.created_at.format("%Y-%m-%d %H:%M"));
    for mode in ContentMode::PIPELINE {
        println!();
        match artifacts.get(&mode) {
            Some(payload) => {
                println!("== {mode} ==");
                println!("{}", serde_json::to_string_pretty(payload)?);
            }
            None => println!("== {mode} == (not generated)"),
        }
    }
    Ok(())
}

async fn cmd_lesson_remove(id: &str) -> Result<()> {
    let config = load_config()?;
    let session = LocalSession::from_profile(&config.profile);
    let user = require_user(&session)?;
    let store = open_storage(&config).await?;

    let lesson = owned_lesson(&store, &parse_lesson_id(id)?, &user).await?;
    ContentStore::delete_lesson(&store, &lesson.id).await?;

    println!("Removed lesson '{}'", lesson.title);
    Ok(())
}

// ---------------------------------------------------------------------------
// One-off generation
// ---------------------------------------------------------------------------

/// Generate `mode` for `input`. Text recognition sends the image itself;
/// other modes transcribe an image first.
async fn generate_one(
    client: &GeminiClient,
    mode: ContentMode,
    input: &InputArgs,
) -> Result<Payload> {
    if mode == ContentMode::TextRecognition {
        let path = input
            .image
            .as_deref()
            .ok_or_else(|| eyre!("text recognition needs --image"))?;
        let request = GenerationRequest::new(input.text.clone().unwrap_or_default(), mode)
            .with_attachment(load_image(path)?);
        return Ok(client.generate(&request).await?);
    }

    let (content, _) = read_input(input, client).await?;
    Ok(client.generate(&GenerationRequest::new(content, mode)).await?)
}

async fn cmd_generate(mode: ContentMode, input: &InputArgs) -> Result<()> {
    let config = load_config()?;
    let client = build_client(&config)?;

    info!(mode = mode.as_str(), "generating");
    let progress = spinner(format!("Generating {mode}"));
    let result = generate_one(&client, mode, input).await;
    progress.finish_and_clear();

    let payload = result?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

async fn cmd_classify(input: &InputArgs) -> Result<()> {
    let config = load_config()?;
    let client = build_client(&config)?;

    let progress = spinner("Classifying");
    let result = generate_one(&client, ContentMode::Classification, input).await;
    progress.finish_and_clear();

    let Payload::Classification(suggestion) = result? else {
        bail!("unexpected payload from classification");
    };

    println!(
        "Subject:    {} ({:.0}% confident)",
        suggestion.subject,
        suggestion.confidence * 100.0
    );
    if !suggestion.topics.is_empty() {
        println!("Topics:     {}", suggestion.topics.join(", "));
    }

    // Point at an existing subject with the same name, if there is one.
    let session = LocalSession::from_profile(&config.profile);
    if let Some(user) = session.current_user() {
        let store = open_storage(&config).await?;
        let existing = ContentStore::list_subjects(&store, &user)
            .await?
            .into_iter()
            .find(|s| s.name.eq_ignore_ascii_case(suggestion.subject.trim()));
        match existing {
            Some(subject) => println!("Matches:    {} ({})", subject.name, subject.id),
            None => println!(
                "Create it:  studygen subject add \"{}\"",
                suggestion.subject.trim()
            ),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");

    let key_state = if config.gemini.resolve_credential().is_some() {
        "set"
    } else {
        "not set"
    };
    println!("# API key (${}): {key_state}", config.gemini.api_key_env);
    Ok(())
}
