//! Main execution engine - runs the fine-tune, image and remix pipelines

use crate::{
    api::wire::{ImageJobRequest, ModelCreateRequest, RemixRequest, TrainingRequest},
    api::{ApiError, LeapClient, RemixSource, SampleSource, Transport},
    core::config::{PollingConfig, RunConfig},
    core::{
        ExecutionStatus, JobHandle, JobStatus, PipelineContext, PipelineKind, PreTrainedModel,
        RetryPolicy, Stage, Termination,
    },
    execution::{
        poll, FailureKind, JobSubmitter, MaterializeReport, Materializer, NamingScheme,
        PipelineError, PollOutcome, SampleProvider, SchedulingStrategy,
    },
};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during a pipeline run
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    PipelineStarted {
        run_id: Uuid,
        pipeline: PipelineKind,
    },
    StageEntered {
        run_id: Uuid,
        pipeline: PipelineKind,
        stage: Stage,
    },
    JobSubmitted {
        run_id: Uuid,
        handle: JobHandle,
    },
    PollAttempt {
        run_id: Uuid,
        job_id: String,
        attempt: u32,
        max_attempts: u32,
    },
    SampleUploaded {
        run_id: Uuid,
        source: String,
    },
    SampleFailed {
        run_id: Uuid,
        source: String,
        error: String,
    },
    ArtifactWritten {
        run_id: Uuid,
        path: PathBuf,
    },
    ArtifactFailed {
        run_id: Uuid,
        uri: String,
        error: String,
    },
    PipelineCompleted {
        run_id: Uuid,
        pipeline: PipelineKind,
        status: ExecutionStatus,
    },
    PipelineHalted {
        run_id: Uuid,
        pipeline: PipelineKind,
        stage: Stage,
        error: String,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

/// Everything the fine-tuning pipeline needs up front
#[derive(Debug, Clone)]
pub struct FineTuneSpec {
    pub model: ModelCreateRequest,

    /// First batch of samples; the provider is asked when none upload
    pub samples: Vec<SampleSource>,

    pub training: TrainingRequest,

    /// Generate an image with the trained model
    pub generate: Option<ImageJobRequest>,

    /// Delete the model once everything else is done
    pub delete_after: bool,
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Final context: stage history, counts and status
    pub context: PipelineContext,

    /// Last status observed for the last job driven
    pub status: Option<JobStatus>,

    pub materialized: MaterializeReport,
}

impl RunReport {
    pub fn files(&self) -> &[PathBuf] {
        &self.materialized.written
    }
}

/// Main pipeline execution engine
pub struct PipelineEngine<T: Transport> {
    client: Arc<LeapClient<T>>,
    submitter: JobSubmitter<T>,
    materializer: Materializer<T>,
    polling: PollingConfig,
    output_dir: PathBuf,
    concurrency: usize,
    event_handlers: Vec<EventHandler>,
}

impl<T: Transport> PipelineEngine<T> {
    pub fn new(client: LeapClient<T>) -> Self {
        let client = Arc::new(client);
        Self {
            submitter: JobSubmitter::new(client.clone()),
            materializer: Materializer::new(client.clone()),
            client,
            polling: PollingConfig::default(),
            output_dir: RunConfig::default().output_dir,
            concurrency: RunConfig::default().concurrency,
            event_handlers: Vec::new(),
        }
    }

    /// Engine configured from a loaded run configuration
    pub fn from_config(client: LeapClient<T>, config: &RunConfig) -> Self {
        Self::new(client)
            .with_polling(config.polling)
            .with_output_dir(config.output_dir.clone())
            .with_concurrency(config.concurrency)
    }

    pub fn with_polling(mut self, polling: PollingConfig) -> Self {
        self.polling = polling;
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Worker limit for archive calls
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(PipelineEvent) + Send + Sync + 'static,
    {
        self.add_event_handler(handler);
        self
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(PipelineEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    pub fn client(&self) -> &LeapClient<T> {
        &self.client
    }

    pub fn submitter(&self) -> &JobSubmitter<T> {
        &self.submitter
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn polling(&self) -> &PollingConfig {
        &self.polling
    }

    // ---- pipelines ----

    /// Create a model, train it on samples, archive the samples, then
    /// optionally generate an image and delete the model
    pub async fn run_fine_tune(
        &self,
        spec: &FineTuneSpec,
        provider: &mut dyn SampleProvider,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        let mut ctx = self.begin(PipelineKind::FineTune);
        match self.fine_tune_stages(&mut ctx, spec, provider, cancel).await {
            Ok((status, materialized)) => Ok(self.finish(ctx, Some(status), materialized)),
            Err(kind) => Err(self.halt(ctx, kind)),
        }
    }

    /// Submit an image job, wait for it and write its images
    ///
    /// `target` is a model id or catalog name; the configured default model
    /// is used when it is `None`.
    pub async fn run_image_generation(
        &self,
        target: Option<&str>,
        request: &ImageJobRequest,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        let mut ctx = self.begin(PipelineKind::ImageGeneration);
        match self.image_stages(&mut ctx, target, request, cancel).await {
            Ok((status, materialized)) => Ok(self.finish(ctx, Some(status), materialized)),
            Err(kind) => Err(self.halt(ctx, kind)),
        }
    }

    /// Submit a remix from a local file or URL, wait for it and write its
    /// images
    pub async fn run_remix(
        &self,
        target: Option<&str>,
        request: &RemixRequest,
        source: &RemixSource,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        let mut ctx = self.begin(PipelineKind::Remix);
        match self.remix_stages(&mut ctx, target, request, source, cancel).await {
            Ok((status, materialized)) => Ok(self.finish(ctx, Some(status), materialized)),
            Err(kind) => Err(self.halt(ctx, kind)),
        }
    }

    /// Run one image pipeline per model
    ///
    /// Each run has its own context and one failure does not stop the
    /// others. Results come back in the order of `models`.
    pub async fn generate_across_models(
        &self,
        request: &ImageJobRequest,
        models: &[String],
        strategy: SchedulingStrategy,
        cancel: &CancellationToken,
    ) -> Vec<(String, Result<RunReport, PipelineError>)> {
        let limit = strategy.limit(models.len());
        info!("Generating across {} models ({}, {} at a time)", models.len(), strategy, limit);

        futures::stream::iter(models)
            .map(move |model| async move {
                let result = self.run_image_generation(Some(model.as_str()), request, cancel).await;
                (model.clone(), result)
            })
            .buffered(limit)
            .collect()
            .await
    }

    // ---- clean-up ----

    /// Delete every image job of each model; returns the count per model id
    pub async fn delete_image_jobs(&self, models: &[String]) -> Result<Vec<(String, usize)>, ApiError> {
        let mut deleted = Vec::with_capacity(models.len());
        for model in models {
            let model_id = PreTrainedModel::resolve(model);
            let jobs = self.client.list_image_jobs(&model_id).await?;
            let mut count = 0;
            for job_id in jobs.into_iter().filter_map(|job| job.id) {
                self.client.delete_image_job(&model_id, &job_id).await?;
                count += 1;
            }
            info!(model_id = %model_id, count, "Deleted image jobs");
            deleted.push((model_id, count));
        }
        Ok(deleted)
    }

    pub async fn delete_project(&self, project_id: &str) -> Result<(), ApiError> {
        self.client.delete_project(project_id).await?;
        info!(project_id, "Deleted project");
        Ok(())
    }

    // ---- stage sequences ----

    async fn fine_tune_stages(
        &self,
        ctx: &mut PipelineContext,
        spec: &FineTuneSpec,
        provider: &mut dyn SampleProvider,
        cancel: &CancellationToken,
    ) -> Result<(JobStatus, MaterializeReport), FailureKind> {
        check_cancelled(cancel)?;
        self.enter(ctx, Stage::Created);
        self.check_polling()?;
        spec.model.validate()?;
        spec.training.validate()?;
        if let Some(request) = &spec.generate {
            request.validate()?;
        }
        let model_id = self.submitter.create_model(&spec.model).await?;
        ctx.resource_id = Some(model_id.clone());
        self.verify_model(&model_id).await?;

        check_cancelled(cancel)?;
        self.enter(ctx, Stage::SamplesUploading);
        ctx.uploaded = self
            .upload_samples(ctx.run_id, &model_id, &spec.samples, provider, cancel)
            .await?;

        check_cancelled(cancel)?;
        self.enter(ctx, Stage::SamplesVerified);
        let sample_ids = self.verify_samples(&model_id, ctx.uploaded).await?;
        ctx.verified = sample_ids.len();

        check_cancelled(cancel)?;
        self.enter(ctx, Stage::TrainingQueued);
        let handle = self.submitter.queue_training(&model_id, &spec.training).await?;
        self.job_submitted(ctx, &handle);

        self.enter(ctx, Stage::TrainingPolling);
        let mut status = self
            .await_job(ctx.run_id, &handle, &self.polling.training, cancel)
            .await?;
        self.enter(ctx, Stage::TrainingFinished);

        check_cancelled(cancel)?;
        self.enter(ctx, Stage::SamplesArchived);
        ctx.archived = self.archive_samples(&model_id, &sample_ids, cancel).await?;

        let mut materialized = MaterializeReport::default();
        if let Some(request) = &spec.generate {
            check_cancelled(cancel)?;
            self.enter(ctx, Stage::ImageGenerated);
            let handle = self.submitter.submit_image(Some(model_id.as_str()), request).await?;
            self.job_submitted(ctx, &handle);
            status = self
                .await_job(ctx.run_id, &handle, &self.polling.image, cancel)
                .await?;
            let naming = NamingScheme::for_model(&model_id, &handle.id);
            materialized = self.materialize(ctx.run_id, &status, &naming).await?;
        }

        if spec.delete_after {
            check_cancelled(cancel)?;
            self.enter(ctx, Stage::Deleted);
            self.client.delete_model(&model_id).await?;
            info!(model_id = %model_id, "Deleted model");
        }

        Ok((status, materialized))
    }

    async fn image_stages(
        &self,
        ctx: &mut PipelineContext,
        target: Option<&str>,
        request: &ImageJobRequest,
        cancel: &CancellationToken,
    ) -> Result<(JobStatus, MaterializeReport), FailureKind> {
        check_cancelled(cancel)?;
        self.enter(ctx, Stage::Submitted);
        self.check_polling()?;
        let model_id = self.submitter.resolve_target(target)?;
        ctx.resource_id = Some(model_id.clone());
        let handle = self.submitter.submit_image(Some(model_id.as_str()), request).await?;
        self.job_submitted(ctx, &handle);

        self.enter(ctx, Stage::Polling);
        let status = self
            .await_job(ctx.run_id, &handle, &self.polling.image, cancel)
            .await?;

        self.enter(ctx, Stage::Completed);
        let naming = NamingScheme::for_model(&model_id, &handle.id);
        let materialized = self.materialize(ctx.run_id, &status, &naming).await?;
        Ok((status, materialized))
    }

    async fn remix_stages(
        &self,
        ctx: &mut PipelineContext,
        target: Option<&str>,
        request: &RemixRequest,
        source: &RemixSource,
        cancel: &CancellationToken,
    ) -> Result<(JobStatus, MaterializeReport), FailureKind> {
        check_cancelled(cancel)?;
        self.enter(ctx, Stage::Submitted);
        self.check_polling()?;
        let model_id = self.submitter.resolve_target(target)?;
        ctx.resource_id = Some(model_id.clone());
        let handle = self.submitter.submit_remix(Some(model_id.as_str()), request, source).await?;
        self.job_submitted(ctx, &handle);

        self.enter(ctx, Stage::Polling);
        let status = self
            .await_job(ctx.run_id, &handle, &self.polling.remix, cancel)
            .await?;

        self.enter(ctx, Stage::Completed);
        let naming = NamingScheme::for_job(&handle.id);
        let materialized = self.materialize(ctx.run_id, &status, &naming).await?;
        Ok((status, materialized))
    }

    // ---- stage helpers ----

    /// The model must appear in the listing and be fetchable by id
    async fn verify_model(&self, model_id: &str) -> Result<(), FailureKind> {
        let listed = self
            .client
            .list_models()
            .await?
            .iter()
            .any(|m| m.id.as_deref() == Some(model_id));
        let fetched = self.client.get_model(model_id).await?.id.as_deref() == Some(model_id);

        if listed && fetched {
            Ok(())
        } else {
            Err(FailureKind::Verification(format!(
                "model {} not confirmed (listed: {}, fetched: {})",
                model_id, listed, fetched
            )))
        }
    }

    /// Upload until at least one sample is accepted; returns the count
    async fn upload_samples(
        &self,
        run_id: Uuid,
        model_id: &str,
        initial: &[SampleSource],
        provider: &mut dyn SampleProvider,
        cancel: &CancellationToken,
    ) -> Result<usize, FailureKind> {
        let mut batch = initial.to_vec();
        let mut round = 0;
        loop {
            let mut uploaded = 0;
            for source in &batch {
                check_cancelled(cancel)?;
                match self.client.upload_sample(model_id, source).await {
                    Ok(_) => {
                        uploaded += 1;
                        self.emit(PipelineEvent::SampleUploaded {
                            run_id,
                            source: source.to_string(),
                        });
                    }
                    Err(e) => {
                        warn!(model_id, source = %source, error = %e, "Sample upload failed");
                        self.emit(PipelineEvent::SampleFailed {
                            run_id,
                            source: source.to_string(),
                            error: e.to_string(),
                        });
                    }
                }
            }
            if uploaded > 0 {
                info!(model_id, uploaded, "Uploaded samples");
                return Ok(uploaded);
            }

            round += 1;
            match provider.next_batch(round).await {
                Some(next) => batch = next,
                None => return Err(FailureKind::NoSamples),
            }
        }
    }

    /// Returns the ids of every listed sample
    ///
    /// Ids are fetched one at a time until one of them answers.
    async fn verify_samples(&self, model_id: &str, uploaded: usize) -> Result<Vec<String>, FailureKind> {
        let samples = self.client.list_samples(model_id).await?;
        if samples.len() < uploaded {
            return Err(FailureKind::Verification(format!(
                "service lists {} samples but {} were uploaded",
                samples.len(),
                uploaded
            )));
        }

        let ids: Vec<String> = samples.into_iter().filter_map(|s| s.id).collect();
        if ids.is_empty() {
            return Err(FailureKind::Verification("listed samples carry no ids".to_string()));
        }

        let mut last_error = None;
        for sample_id in &ids {
            match self.client.get_sample(model_id, sample_id).await {
                Ok(_) => {
                    last_error = None;
                    break;
                }
                Err(e) => {
                    warn!(model_id, sample_id = %sample_id, error = %e, "Sample fetch failed");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            None => Ok(ids),
            Some(e) => Err(FailureKind::Verification(format!(
                "none of {} listed samples could be fetched: {}",
                ids.len(),
                e
            ))),
        }
    }

    /// Archive every sample, each retried on its own
    async fn archive_samples(
        &self,
        model_id: &str,
        sample_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<usize, FailureKind> {
        let policy = self.polling.archive;
        let results: Vec<Result<(), FailureKind>> = futures::stream::iter(sample_ids)
            .map(move |sample_id| self.archive_with_retry(model_id, sample_id, policy, cancel))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let archived = results.iter().filter(|r| r.is_ok()).count();
        if let Some(err) = results.into_iter().find_map(Result::err) {
            return Err(err);
        }
        info!(model_id, archived, "Archived samples");
        Ok(archived)
    }

    async fn archive_with_retry(
        &self,
        model_id: &str,
        sample_id: &str,
        policy: RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<(), FailureKind> {
        let mut attempt = 1;
        loop {
            match self.client.archive_sample(model_id, sample_id).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                    warn!(sample_id, attempt, error = %e, "Archive failed, retrying");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(FailureKind::Cancelled),
                        _ = tokio::time::sleep(policy.interval) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Poll a job until it finishes with artifacts
    async fn await_job(
        &self,
        run_id: Uuid,
        handle: &JobHandle,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<JobStatus, FailureKind> {
        let client: &LeapClient<T> = &self.client;
        let max_attempts = policy.max_attempts;
        let fetch = move |attempt: u32| {
            self.emit(PipelineEvent::PollAttempt {
                run_id,
                job_id: handle.id.clone(),
                attempt,
                max_attempts,
            });
            client.job_status(handle)
        };

        match poll(fetch, &Termination::default(), policy, cancel).await? {
            PollOutcome::Success(status) => {
                info!(job_id = %handle.id, artifacts = status.artifacts.len(), "Job finished");
                Ok(status)
            }
            PollOutcome::Failed(status) => Err(FailureKind::JobFailed {
                job_id: handle.id.clone(),
                state: status.state,
            }),
            PollOutcome::TimedOut { attempts, .. } => Err(FailureKind::TimedOut {
                job_id: handle.id.clone(),
                attempts,
            }),
            PollOutcome::Cancelled => Err(FailureKind::Cancelled),
        }
    }

    async fn materialize(
        &self,
        run_id: Uuid,
        status: &JobStatus,
        naming: &NamingScheme,
    ) -> Result<MaterializeReport, FailureKind> {
        let report = self
            .materializer
            .materialize(&status.artifacts, &self.output_dir, naming)
            .await
            .map_err(|e| FailureKind::Materialize(e.to_string()))?;

        for path in &report.written {
            self.emit(PipelineEvent::ArtifactWritten {
                run_id,
                path: path.clone(),
            });
        }
        for failure in &report.failures {
            self.emit(PipelineEvent::ArtifactFailed {
                run_id,
                uri: failure.uri.clone(),
                error: failure.error.clone(),
            });
        }
        Ok(report)
    }

    fn check_polling(&self) -> Result<(), FailureKind> {
        self.polling
            .validate()
            .map_err(|e| FailureKind::InvalidPolicy(e.to_string()))
    }

    // ---- context bookkeeping ----

    /// Emit an event to all handlers
    fn emit(&self, event: PipelineEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    fn begin(&self, pipeline: PipelineKind) -> PipelineContext {
        let mut ctx = PipelineContext::new(pipeline);
        ctx.start();
        info!(run_id = %ctx.run_id, "Starting {} pipeline", pipeline);
        self.emit(PipelineEvent::PipelineStarted {
            run_id: ctx.run_id,
            pipeline,
        });
        ctx
    }

    fn enter(&self, ctx: &mut PipelineContext, stage: Stage) {
        ctx.enter(stage);
        info!(run_id = %ctx.run_id, resource_id = ctx.resource(), stage = %stage, "Entering stage");
        self.emit(PipelineEvent::StageEntered {
            run_id: ctx.run_id,
            pipeline: ctx.pipeline,
            stage,
        });
    }

    fn job_submitted(&self, ctx: &mut PipelineContext, handle: &JobHandle) {
        ctx.handle = Some(handle.clone());
        self.emit(PipelineEvent::JobSubmitted {
            run_id: ctx.run_id,
            handle: handle.clone(),
        });
    }

    fn finish(
        &self,
        mut ctx: PipelineContext,
        status: Option<JobStatus>,
        materialized: MaterializeReport,
    ) -> RunReport {
        ctx.complete();
        info!(run_id = %ctx.run_id, files = materialized.count(), "{} pipeline completed", ctx.pipeline);
        self.emit(PipelineEvent::PipelineCompleted {
            run_id: ctx.run_id,
            pipeline: ctx.pipeline,
            status: ctx.status,
        });
        RunReport {
            context: ctx,
            status,
            materialized,
        }
    }

    fn halt(&self, mut ctx: PipelineContext, kind: FailureKind) -> PipelineError {
        let stage = ctx.current_stage().unwrap_or(match ctx.pipeline {
            PipelineKind::FineTune => Stage::Created,
            _ => Stage::Submitted,
        });

        if matches!(kind, FailureKind::Cancelled) {
            ctx.cancel();
            warn!(run_id = %ctx.run_id, stage = %stage, "{} pipeline cancelled", ctx.pipeline);
        } else {
            ctx.fail(kind.to_string());
            error!(
                run_id = %ctx.run_id,
                resource_id = ctx.resource(),
                stage = %stage,
                "{} pipeline halted: {}",
                ctx.pipeline,
                kind
            );
        }

        self.emit(PipelineEvent::PipelineHalted {
            run_id: ctx.run_id,
            pipeline: ctx.pipeline,
            stage,
            error: kind.to_string(),
        });
        PipelineError {
            pipeline: ctx.pipeline,
            stage,
            resource_id: ctx.resource().to_string(),
            kind,
        }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), FailureKind> {
    if cancel.is_cancelled() {
        return Err(FailureKind::Cancelled);
    }
    Ok(())
}
