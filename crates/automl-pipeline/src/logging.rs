//! Structured step logging and subscriber setup.
//!
//! Provides consistent, structured logging for pipeline steps with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::pipeline::PipelineStep;

/// Install the global tracing subscriber.
///
/// `LOG_FORMAT=json` switches to JSON output; `RUST_LOG` adds directives.
/// Returns false when a subscriber was already installed.
pub fn init_tracing() -> bool {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["automl=info", "reqwest=warn", "hyper=warn"] {
        if let Ok(d) = directive.parse() {
            env_filter = env_filter.add_directive(d);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .try_init()
            .is_ok()
    }
}

/// Step logger for structured logging with consistent formatting.
///
/// Every event carries the run name and the step being executed.
#[derive(Debug, Clone)]
pub struct StepLogger {
    run: String,
    step: PipelineStep,
}

impl StepLogger {
    pub fn new(run: &str, step: PipelineStep) -> Self {
        Self {
            run: run.to_string(),
            step,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(run = %self.run, step = %self.step, "Step started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(run = %self.run, step = %self.step, "Step progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(run = %self.run, step = %self.step, "Step warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(run = %self.run, step = %self.step, "Step error: {}", message);
    }

    pub fn log_skipped(&self, reason: &str) {
        info!(run = %self.run, step = %self.step, "Step skipped: {}", reason);
    }

    pub fn log_completion(&self, message: &str) {
        info!(run = %self.run, step = %self.step, "Step completed: {}", message);
    }

    pub fn run(&self) -> &str {
        &self.run
    }

    pub fn step(&self) -> PipelineStep {
        self.step
    }

    /// Span grouping every event emitted while the step runs.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("pipeline_step", run = %self.run, step = %self.step)
    }
}
