//! Command-line interface

pub mod commands;
pub mod output;
pub mod prompt;

use clap::{Parser, Subcommand};
use commands::{
    DeleteJobsCommand, DeleteProjectCommand, FineTuneCommand, GenerateCommand, RemixCommand,
};
use std::ffi::OsString;
use std::path::PathBuf;

/// Fine-tune, generate and remix images on the Leap API
#[derive(Debug, Parser, Clone)]
#[command(name = "leap-pipeline")]
#[command(version = "0.1.0")]
#[command(about = "Drive fine-tuning, image generation and remix jobs to completion", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the run configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory generated images are written to
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// API key; overrides the configuration file
    #[arg(long, global = true, env = "LEAP_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Create a model, train it on samples and optionally generate with it
    FineTune(FineTuneCommand),

    /// Generate images with one or all pre-trained models
    Generate(GenerateCommand),

    /// Remix a local or remote image
    Remix(RemixCommand),

    /// Delete every image job of the given models
    DeleteJobs(DeleteJobsCommand),

    /// Delete a project
    DeleteProject(DeleteProjectCommand),

    /// List the pre-trained models
    Models,
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
