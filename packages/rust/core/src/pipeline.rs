//! Pipeline orchestrator: summary → quiz → flashcards → study sheet.
//!
//! Each mode is generated in turn against the same content. A failed step is
//! recorded and the run moves on; only the successful payloads come back as
//! the result map. Steps are strictly sequential, one request in flight at a
//! time.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use studygen_generation::{ContentGenerator, GenerationRequest};
use studygen_shared::{ContentMode, GenerationError, GenerationResult, Payload, PipelineConfig};

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for pipeline runs.
pub trait PipelineProgress: Send + Sync {
    /// Called before the request for `mode` is sent. `step` is 1-based.
    fn step_started(&self, step: usize, total: usize, mode: ContentMode);
    /// Called once the step has a result, successful or not.
    fn step_finished(&self, step: usize, total: usize, mode: ContentMode, result: &GenerationResult);
}

/// No-op pipeline progress.
pub struct SilentProgress;

impl PipelineProgress for SilentProgress {
    fn step_started(&self, _step: usize, _total: usize, _mode: ContentMode) {}
    fn step_finished(
        &self,
        _step: usize,
        _total: usize,
        _mode: ContentMode,
        _result: &GenerationResult,
    ) {
    }
}

/// Where an orchestrator is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running { step: usize },
    Completed,
    Cancelled,
}

// ---------------------------------------------------------------------------
// Run results
// ---------------------------------------------------------------------------

/// What happened to one mode during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Succeeded(Payload),
    Failed(GenerationError),
    /// The run was cancelled before this step started.
    NotAttempted,
}

impl From<GenerationResult> for StepOutcome {
    fn from(result: GenerationResult) -> Self {
        match result {
            Ok(payload) => Self::Succeeded(payload),
            Err(e) => Self::Failed(e),
        }
    }
}

/// One recorded pipeline step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    /// 1-based position in the run.
    pub step: usize,
    pub mode: ContentMode,
    pub outcome: StepOutcome,
}

/// The aggregate of one `generate_all` call. Every pipeline mode appears
/// exactly once, in execution order.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    steps: Vec<StepRecord>,
    completed: bool,
    elapsed: Duration,
}

impl PipelineRun {
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Whether every step was attempted (the run was not cancelled).
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn outcome(&self, mode: ContentMode) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|s| s.mode == mode)
            .map(|s| &s.outcome)
    }

    /// Payloads of the modes that succeeded.
    pub fn payloads(&self) -> BTreeMap<ContentMode, Payload> {
        self.steps
            .iter()
            .filter_map(|s| match &s.outcome {
                StepOutcome::Succeeded(payload) => Some((s.mode, payload.clone())),
                _ => None,
            })
            .collect()
    }

    /// Consume the run, keeping only the successful payloads.
    pub fn into_payloads(self) -> BTreeMap<ContentMode, Payload> {
        self.steps
            .into_iter()
            .filter_map(|s| match s.outcome {
                StepOutcome::Succeeded(payload) => Some((s.mode, payload)),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<(ContentMode, &GenerationError)> {
        self.steps
            .iter()
            .filter_map(|s| match &s.outcome {
                StepOutcome::Failed(e) => Some((s.mode, e)),
                _ => None,
            })
            .collect()
    }

    pub fn not_attempted(&self) -> Vec<ContentMode> {
        self.steps
            .iter()
            .filter(|s| s.outcome == StepOutcome::NotAttempted)
            .map(|s| s.mode)
            .collect()
    }

    pub fn success_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Succeeded(_)))
            .count()
    }

    /// One user-facing message per failed mode.
    pub fn notifications(&self) -> Vec<String> {
        self.failures()
            .into_iter()
            .map(|(mode, e)| format!("failed to generate {mode}: {e}"))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs the fixed generation sequence against a [`ContentGenerator`].
pub struct PipelineOrchestrator {
    generator: Arc<dyn ContentGenerator>,
    step_pause: Duration,
    state: RunState,
}

impl PipelineOrchestrator {
    pub fn new(generator: Arc<dyn ContentGenerator>, config: &PipelineConfig) -> Self {
        Self {
            generator,
            step_pause: Duration::from_millis(config.step_pause_ms),
            state: RunState::Idle,
        }
    }

    /// Override the pause between steps.
    pub fn with_step_pause(mut self, pause: Duration) -> Self {
        self.step_pause = pause;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Generate every pipeline mode for `content`, in order.
    ///
    /// Never fails: per-mode errors are recorded in the returned run.
    /// Cancellation is checked before each step and during the pause between
    /// steps; a request already in flight is allowed to finish.
    #[instrument(skip_all, fields(content_len = content.len()))]
    pub async fn generate_all(
        &mut self,
        content: &str,
        progress: &dyn PipelineProgress,
        cancel: &CancellationToken,
    ) -> PipelineRun {
        let start = Instant::now();
        let total = ContentMode::PIPELINE.len();
        let mut steps = Vec::with_capacity(total);
        let mut cancelled = false;

        for (i, mode) in ContentMode::PIPELINE.into_iter().enumerate() {
            let step = i + 1;

            if cancelled || cancel.is_cancelled() {
                cancelled = true;
                steps.push(StepRecord {
                    step,
                    mode,
                    outcome: StepOutcome::NotAttempted,
                });
                continue;
            }

            self.state = RunState::Running { step };
            progress.step_started(step, total, mode);
            debug!(step, total, mode = mode.as_str(), "generating");

            let request = GenerationRequest::new(content, mode);
            let result = self.generator.generate(&request).await;

            match &result {
                Ok(_) => info!(step, mode = mode.as_str(), "step succeeded"),
                Err(e) => warn!(
                    step,
                    mode = mode.as_str(),
                    kind = e.kind(),
                    error = %e,
                    "step failed, continuing"
                ),
            }
            progress.step_finished(step, total, mode, &result);

            steps.push(StepRecord {
                step,
                mode,
                outcome: result.into(),
            });

            if step < total && !self.step_pause.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => cancelled = true,
                    _ = tokio::time::sleep(self.step_pause) => {}
                }
            }
        }

        self.state = if cancelled {
            RunState::Cancelled
        } else {
            RunState::Completed
        };

        let run = PipelineRun {
            steps,
            completed: !cancelled,
            elapsed: start.elapsed(),
        };

        info!(
            succeeded = run.success_count(),
            failed = run.failures().len(),
            cancelled,
            elapsed_ms = run.elapsed.as_millis() as u64,
            "pipeline run finished"
        );

        run
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
