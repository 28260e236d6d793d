//! CLI output formatting

use crate::{
    core::{ExecutionStatus, PipelineContext},
    execution::{PipelineEvent, RunReport},
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static PICTURE: Emoji<'_, '_> = Emoji("🖼️  ", "* ");

/// Spinner shown while a job is being polled
pub fn create_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
        ExecutionStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Format a pipeline event for display
///
/// Poll attempts have no line of their own; they drive the spinner.
pub fn format_event(event: &PipelineEvent) -> Option<String> {
    let line = match event {
        PipelineEvent::PipelineStarted { run_id, pipeline } => format!(
            "{} Starting {} pipeline ({})",
            ROCKET,
            style(pipeline).bold(),
            style(short_id(run_id)).dim()
        ),
        PipelineEvent::StageEntered { stage, .. } => {
            format!("{} {}", SPINNER, style(stage).cyan())
        }
        PipelineEvent::JobSubmitted { handle, .. } => format!(
            "{} Submitted {} job {}",
            INFO,
            handle.kind,
            style(&handle.id).bold()
        ),
        PipelineEvent::PollAttempt { .. } => return None,
        PipelineEvent::SampleUploaded { source, .. } => {
            format!("{} Uploaded {}", CHECK, style(source).dim())
        }
        PipelineEvent::SampleFailed { source, error, .. } => format!(
            "{} {}: {}",
            WARN,
            style(source).yellow(),
            style(error).dim()
        ),
        PipelineEvent::ArtifactWritten { path, .. } => {
            format!("{} {}", PICTURE, style(path.display()).green())
        }
        PipelineEvent::ArtifactFailed { uri, error, .. } => {
            format!("{} {}: {}", CROSS, style(uri).red(), style(error).dim())
        }
        PipelineEvent::PipelineCompleted {
            run_id,
            pipeline,
            status,
        } => format!(
            "{} {} pipeline ({}) {}",
            CHECK,
            pipeline,
            style(short_id(run_id)).dim(),
            format_status(*status)
        ),
        PipelineEvent::PipelineHalted {
            pipeline,
            stage,
            error,
            ..
        } => format!(
            "{} {} pipeline halted at {}: {}",
            CROSS,
            pipeline,
            style(stage).yellow(),
            style(error).red()
        ),
    };
    Some(line)
}

/// Renders engine events, keeping a spinner up while a job is polled
#[derive(Default)]
pub struct EventRenderer {
    spinner: Mutex<Option<ProgressBar>>,
}

impl EventRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&self, event: &PipelineEvent) {
        let Ok(mut spinner) = self.spinner.lock() else {
            return;
        };

        if let PipelineEvent::PollAttempt {
            job_id,
            attempt,
            max_attempts,
            ..
        } = event
        {
            let message = format!("Waiting for {} (attempt {}/{})", job_id, attempt, max_attempts);
            match spinner.as_ref() {
                Some(bar) => bar.set_message(message),
                None => *spinner = Some(create_spinner(message)),
            }
            return;
        }

        if let Some(bar) = spinner.take() {
            bar.finish_and_clear();
        }
        if let Some(line) = format_event(event) {
            println!("{}", line);
        }
    }
}

/// Summary printed after a successful run
pub fn format_report(report: &RunReport) -> String {
    let ctx = &report.context;
    let mut lines = vec![format!(
        "{} {} {} for {}",
        CHECK,
        style(ctx.pipeline).bold(),
        format_status(ctx.status),
        style(ctx.resource()).cyan()
    )];

    if let Some(duration) = run_duration(ctx) {
        lines.push(format!("  Duration: {}", style(format_duration(duration)).dim()));
    }
    let stages: Vec<&str> = ctx.stages.iter().map(|r| r.stage.as_str()).collect();
    lines.push(format!("  Stages: {}", style(stages.join(" → ")).dim()));
    if ctx.uploaded > 0 {
        lines.push(format!(
            "  Samples: {} uploaded, {} verified, {} archived",
            ctx.uploaded, ctx.verified, ctx.archived
        ));
    }
    lines.push(format!("  Files: {}", style(report.materialized.count()).cyan()));
    for path in report.files() {
        lines.push(format!("    {}", path.display()));
    }
    for failure in &report.materialized.failures {
        lines.push(format!("    {} {}", WARN, style(&failure.uri).yellow()));
    }
    lines.join("\n")
}

fn run_duration(ctx: &PipelineContext) -> Option<Duration> {
    let (start, end) = (ctx.started_at?, ctx.completed_at?);
    end.signed_duration_since(start).to_std().ok()
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
