use anyhow::{Context, Result};
use leap_pipeline::cli::commands::{
    DeleteJobsCommand, DeleteProjectCommand, FineTuneCommand, GenerateCommand, RemixCommand,
};
use leap_pipeline::cli::output::*;
use leap_pipeline::cli::prompt::TerminalSamples;
use leap_pipeline::cli::{Cli, Command};
use leap_pipeline::core::{PreTrainedModel, RunConfig};
use leap_pipeline::execution::{PipelineEngine, PipelineError, RunReport};
use leap_pipeline::LeapClient;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Commands that never touch the service
    if let Command::Models = &cli.command {
        list_models();
        return Ok(());
    }

    let mut config = RunConfig::load(cli.config.as_deref()).context("Failed to load run config")?;
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }

    let mut client_config = config
        .client_config(cli.api_key.clone())
        .context("Failed to build client config")?;
    if client_config.default_model_id.is_none() {
        client_config = client_config.with_default_model(PreTrainedModel::default().id());
    }
    let client = LeapClient::new(client_config).context("Failed to create API client")?;

    let renderer = EventRenderer::new();
    let engine = PipelineEngine::from_config(client, &config)
        .with_event_handler(move |event| renderer.render(&event));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    // Execute command
    match &cli.command {
        Command::FineTune(cmd) => fine_tune(&engine, cmd, &cancel).await?,
        Command::Generate(cmd) => generate(&engine, cmd, config.concurrency, &cancel).await?,
        Command::Remix(cmd) => remix(&engine, cmd, &cancel).await?,
        Command::DeleteJobs(cmd) => delete_jobs(&engine, cmd).await?,
        Command::DeleteProject(cmd) => delete_project(&engine, cmd).await?,
        Command::Models => list_models(),
    }

    Ok(())
}

async fn fine_tune(
    engine: &PipelineEngine<leap_pipeline::HttpTransport>,
    cmd: &FineTuneCommand,
    cancel: &CancellationToken,
) -> Result<()> {
    let spec = cmd.to_spec();
    println!(
        "{} Fine-tuning {} with {} sample(s)",
        INFO,
        style(&cmd.title).bold(),
        style(spec.samples.len()).cyan()
    );

    let mut provider = TerminalSamples::default();
    let result = engine.run_fine_tune(&spec, &mut provider, cancel).await;
    finish_run(result)
}

async fn generate(
    engine: &PipelineEngine<leap_pipeline::HttpTransport>,
    cmd: &GenerateCommand,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Result<()> {
    let request = cmd.to_request();

    if !cmd.all_models {
        let result = engine
            .run_image_generation(cmd.model.as_deref(), &request, cancel)
            .await;
        return finish_run(result);
    }

    let strategy = cmd.strategy.into_strategy(concurrency);
    let models = cmd.fan_out_models();
    println!(
        "{} Generating with {} models ({})",
        INFO,
        style(models.len()).cyan(),
        strategy
    );

    let results = engine
        .generate_across_models(&request, &models, strategy, cancel)
        .await;

    let mut failed = 0;
    println!();
    for (model, result) in &results {
        match result {
            Ok(report) => println!(
                "{} {} ({} files)",
                CHECK,
                style(model).bold(),
                style(report.materialized.count()).cyan()
            ),
            Err(e) => {
                failed += 1;
                println!("{} {}: {}", CROSS, style(model).bold(), style(e).red());
            }
        }
    }

    if failed > 0 {
        println!(
            "\n{} {} of {} models {}",
            CROSS,
            failed,
            results.len(),
            style("failed").red()
        );
        std::process::exit(1);
    }
    Ok(())
}

async fn remix(
    engine: &PipelineEngine<leap_pipeline::HttpTransport>,
    cmd: &RemixCommand,
    cancel: &CancellationToken,
) -> Result<()> {
    let request = cmd.to_request();
    let source = cmd.source();
    let result = engine
        .run_remix(cmd.model.as_deref(), &request, &source, cancel)
        .await;
    finish_run(result)
}

async fn delete_jobs(
    engine: &PipelineEngine<leap_pipeline::HttpTransport>,
    cmd: &DeleteJobsCommand,
) -> Result<()> {
    let deleted = engine
        .delete_image_jobs(&cmd.targets())
        .await
        .context("Failed to delete image jobs")?;

    for (model_id, count) in &deleted {
        let label = PreTrainedModel::from_id(model_id)
            .map(|m| m.display_name().to_string())
            .unwrap_or_else(|| model_id.clone());
        println!("{} {}: {} job(s) deleted", CHECK, style(label).bold(), style(count).cyan());
    }
    Ok(())
}

async fn delete_project(
    engine: &PipelineEngine<leap_pipeline::HttpTransport>,
    cmd: &DeleteProjectCommand,
) -> Result<()> {
    engine
        .delete_project(&cmd.project_id)
        .await
        .with_context(|| format!("Failed to delete project {}", cmd.project_id))?;
    println!("{} Project {} deleted", CHECK, style(&cmd.project_id).bold());
    Ok(())
}

fn list_models() {
    println!("{} Pre-trained models:", INFO);
    for model in PreTrainedModel::ALL {
        let marker = if model == PreTrainedModel::default() {
            style(" (default)").green().to_string()
        } else {
            String::new()
        };
        println!(
            "  {:<20} {} {}{}",
            style(model.name()).bold(),
            style(model.id()).dim(),
            model.display_name(),
            marker
        );
    }
}

fn finish_run(result: Result<RunReport, PipelineError>) -> Result<()> {
    match result {
        Ok(report) => {
            println!("\n{}", format_report(&report));
            Ok(())
        }
        Err(e) => {
            println!("\n{} {}", CROSS, style("Run failed").red());
            error!("{}", e);
            std::process::exit(if e.is_cancelled() { 130 } else { 1 });
        }
    }
}
