//! Interactive sample prompt

use crate::api::SampleSource;
use crate::cli::commands::parse_sample;
use crate::cli::output::{style, WARN};
use crate::execution::SampleProvider;
use async_trait::async_trait;
use console::Term;
use tracing::debug;

/// Asks on the terminal for more samples when none uploaded
///
/// Gives up when stdin is not a terminal, when the answer is empty, or
/// after `max_rounds` prompts.
#[derive(Debug, Clone)]
pub struct TerminalSamples {
    max_rounds: u32,
}

impl TerminalSamples {
    pub fn new(max_rounds: u32) -> Self {
        Self { max_rounds }
    }
}

impl Default for TerminalSamples {
    fn default() -> Self {
        Self::new(3)
    }
}

#[async_trait]
impl SampleProvider for TerminalSamples {
    async fn next_batch(&mut self, attempt: u32) -> Option<Vec<SampleSource>> {
        if attempt > self.max_rounds || !Term::stdout().is_term() {
            return None;
        }

        let line = tokio::task::spawn_blocking(move || {
            let term = Term::stdout();
            term.write_line(&format!(
                "{} No samples uploaded (round {}). Enter image paths or URLs, separated by commas:",
                WARN,
                style(attempt).yellow()
            ))
            .ok()?;
            term.read_line().ok()
        })
        .await
        .ok()
        .flatten()?;

        let batch = split_samples(&line);
        debug!(count = batch.len(), "Read samples from terminal");
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}

fn split_samples(line: &str) -> Vec<SampleSource> {
    line.split(',').filter_map(|s| parse_sample(s).ok()).collect()
}
