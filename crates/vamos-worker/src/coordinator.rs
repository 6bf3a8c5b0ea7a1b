//! Job coordinator: drives one job from split to final artifact.
//!
//! Jobs run as background tasks. Chunks of a job are masked by a bounded
//! pool; the first failing chunk fails the job and stops chunks that have
//! not started yet. Chunks already on a blocking thread run to completion,
//! their late progress reports are rejected by the registry.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, Instrument};
use vamos_detect::Detector;
use vamos_media::fs_utils::retain_only;
use vamos_media::{MediaToolkit, RedactionPolicy};
use vamos_models::{BlurMode, JobId, JobOptions, JobSnapshot, JobStatus, Stage};

use crate::chunk::{process_chunk, ChunkContext, ChunkSummary, ChunkWork};
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::layout::JobLayout;
use crate::logging::JobLogger;
use crate::metrics;
use crate::recombine::Recombiner;
use crate::registry::ProgressRegistry;

/// Overall progress when splitting starts.
const SPLITTING_PROGRESS: f64 = 5.0;
/// Overall progress when masking starts.
const MASKING_PROGRESS: f64 = 10.0;
/// Overall progress when chunk re-encoding starts.
const COMBINING_CHUNKS_PROGRESS: f64 = 90.0;
/// Overall progress when the final join starts.
const COMBINING_FINAL_PROGRESS: f64 = 95.0;

/// Accepts jobs and runs them to a terminal status.
#[derive(Clone)]
pub struct JobCoordinator {
    registry: Arc<ProgressRegistry>,
    toolkit: Arc<dyn MediaToolkit>,
    detector: Arc<dyn Detector>,
    recombiner: Recombiner,
    config: Arc<WorkerConfig>,
}

impl JobCoordinator {
    pub fn new(
        registry: Arc<ProgressRegistry>,
        toolkit: Arc<dyn MediaToolkit>,
        detector: Arc<dyn Detector>,
        config: WorkerConfig,
    ) -> Self {
        let recombiner = Recombiner::new(Arc::clone(&toolkit), config.framerate);
        Self {
            registry,
            toolkit,
            detector,
            recombiner,
            config: Arc::new(config),
        }
    }

    pub fn registry(&self) -> &Arc<ProgressRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Register a job and run it in the background. Returns immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_job(&self, video_path: impl Into<PathBuf>, options: JobOptions) -> JobId {
        let video_path = video_path.into();
        let job_id = JobId::new();
        self.registry
            .create(JobSnapshot::new(job_id.clone(), video_path.clone()));
        metrics::record_job_started();

        let span = JobLogger::new(&job_id).span();
        let coordinator = self.clone();
        let id = job_id.clone();
        tokio::spawn(
            async move {
                // Failures are recorded on the job itself
                let _ = coordinator.run_job(&id, &video_path, options).await;
            }
            .instrument(span),
        );

        job_id
    }

    /// Run a registered job to completion.
    ///
    /// On failure the job is marked as errored with `<kind>: <detail>` and its
    /// working directory is left in place.
    pub async fn run_job(
        &self,
        job_id: &JobId,
        video_path: &Path,
        options: JobOptions,
    ) -> WorkerResult<PathBuf> {
        let logger = JobLogger::new(job_id);
        let started = Instant::now();
        logger.started(video_path);

        match self.execute(job_id, video_path, &options, &logger).await {
            Ok(result) => {
                metrics::record_job_completed(started.elapsed().as_secs_f64());
                logger.completed(&result, started.elapsed());
                Ok(result)
            }
            Err(e) => {
                let message = e.job_message();
                metrics::record_job_failed(e.kind(), started.elapsed().as_secs_f64());
                logger.failed(&e, started.elapsed());

                let recorded = self.registry.mutate(job_id, |s| {
                    s.status = JobStatus::Error;
                    s.error_message = Some(message.clone());
                });
                if let Err(re) = recorded {
                    logger.unrecorded(&re);
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        job_id: &JobId,
        video_path: &Path,
        options: &JobOptions,
        logger: &JobLogger,
    ) -> WorkerResult<PathBuf> {
        self.update(job_id, |s| {
            s.status = JobStatus::Processing;
            s.stage = Stage::Splitting;
            s.overall_progress = SPLITTING_PROGRESS;
        })?;

        self.toolkit.validate(video_path).await?;

        let layout = JobLayout::new(&self.config.work_dir, job_id);
        tokio::fs::create_dir_all(layout.root()).await.map_err(|e| {
            WorkerError::encode(format!(
                "cannot create job directory {}: {}",
                layout.root().display(),
                e
            ))
        })?;

        let chunks = self
            .toolkit
            .split(video_path, &layout.chunks_dir(), self.config.segment_seconds)
            .await?;
        if chunks.is_empty() {
            return Err(WorkerError::input(format!(
                "{} produced no chunks",
                video_path.display()
            )));
        }
        logger.entered(Stage::Splitting, &format!("Split into {} chunks", chunks.len()));

        self.update(job_id, |s| {
            s.chunk_progress = vec![0.0; chunks.len()];
            s.stage = Stage::Masking;
            s.overall_progress = MASKING_PROGRESS;
        })?;

        let policy = redaction_policy(&self.config, options)?;
        self.mask_chunks(job_id, &layout, &chunks, policy, logger).await?;

        self.update(job_id, |s| {
            s.stage = Stage::CombiningChunks;
            s.overall_progress = COMBINING_CHUNKS_PROGRESS;
        })?;

        let registry = &self.registry;
        let result = self
            .recombiner
            .recombine(&layout, chunks.len(), |stage| {
                let advanced = registry.mutate(job_id, |s| {
                    s.stage = stage;
                    s.overall_progress = COMBINING_FINAL_PROGRESS;
                });
                if let Err(e) = advanced {
                    debug!(%job_id, "Stage update rejected: {}", e);
                }
            })
            .await?;

        let removed = retain_only(layout.root(), layout.final_name())
            .await
            .map_err(|e| WorkerError::internal(format!("intermediate cleanup failed: {}", e)))?;
        debug!(%job_id, removed, "Removed intermediate artifacts");

        let result_path = result.clone();
        self.update(job_id, move |s| {
            s.status = JobStatus::Done;
            s.stage = Stage::Done;
            s.overall_progress = 100.0;
            s.result_path = Some(result_path);
        })?;

        Ok(result)
    }

    /// Extract and mask every chunk on a bounded pool. Fails fast.
    async fn mask_chunks(
        &self,
        job_id: &JobId,
        layout: &JobLayout,
        chunks: &[PathBuf],
        policy: RedactionPolicy,
        logger: &JobLogger,
    ) -> WorkerResult<()> {
        let total = chunks.len();
        let workers = self.config.worker_count(total);
        logger.entered(
            Stage::Masking,
            &format!(
                "Masking {} chunks with {} workers ({} blur, feather {}px)",
                total, workers, policy.blur_mode, policy.feather_px
            ),
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        let ctx = Arc::new(ChunkContext {
            registry: Arc::clone(&self.registry),
            detector: Arc::clone(&self.detector),
            policy,
            min_confidence: self.config.min_confidence,
        });

        let mut tasks = JoinSet::new();
        for (index, chunk) in chunks.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let toolkit = Arc::clone(&self.toolkit);
            let ctx = Arc::clone(&ctx);
            let chunk = chunk.clone();
            let job_id = job_id.clone();
            let framerate = self.config.framerate;
            let work = ChunkWork {
                frames_dir: layout.frames_dir(index),
                output_dir: layout.processed_dir(index),
            };

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| WorkerError::internal("chunk worker pool closed"))?;

                toolkit
                    .extract_frames(&chunk, &work.frames_dir, framerate)
                    .await?;

                let summary = tokio::task::spawn_blocking(move || {
                    process_chunk(&ctx, &work, &job_id, index, total)
                })
                .await
                .map_err(|e| {
                    WorkerError::internal(format!("chunk {} worker died: {}", index, e))
                })??;

                Ok::<(usize, ChunkSummary), WorkerError>((index, summary))
            });
        }

        let mut failure: Option<WorkerError> = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => Err(WorkerError::internal(format!("chunk task died: {}", e))),
            };

            match outcome {
                Ok((index, summary)) => {
                    debug!(
                        %job_id,
                        chunk = index,
                        frames = summary.frames,
                        redacted = summary.redacted_frames,
                        regions = summary.regions,
                        detector_failures = summary.detector_failures,
                        "Chunk masked"
                    );
                    if summary.detector_failures > 0 {
                        logger.passthrough(index, summary.detector_failures);
                    }
                }
                Err(e) if failure.is_none() => {
                    tasks.abort_all();
                    failure = Some(e);
                }
                Err(e) => debug!(%job_id, "Additional chunk failure: {}", e),
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn update<F>(&self, job_id: &JobId, f: F) -> WorkerResult<JobSnapshot>
    where
        F: FnOnce(&mut JobSnapshot),
    {
        self.registry
            .mutate(job_id, f)
            .map_err(|e| WorkerError::internal(e.to_string()))
    }
}

/// Blur settings for a job: its own options first, then the worker defaults.
fn redaction_policy(config: &WorkerConfig, options: &JobOptions) -> WorkerResult<RedactionPolicy> {
    let blur_mode: BlurMode = options
        .blur_mode
        .as_deref()
        .unwrap_or(config.blur_mode.as_str())
        .parse()?;
    let feather_px = options.feather_px.unwrap_or(config.feather_px);
    Ok(RedactionPolicy::new(blur_mode, feather_px))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_options_override_defaults() {
        let config = WorkerConfig::default();
        let options = JobOptions {
            blur_mode: Some("Mosaic".to_string()),
            feather_px: Some(0),
        };

        let policy = redaction_policy(&config, &options).unwrap();
        assert_eq!(policy.blur_mode, BlurMode::Mosaic);
        assert_eq!(policy.feather_px, 0);

        let policy = redaction_policy(&config, &JobOptions::default()).unwrap();
        assert_eq!(policy.blur_mode, BlurMode::Gaussian);
        assert_eq!(policy.feather_px, 8);
    }

    #[test]
    fn test_unknown_blur_mode_is_configuration_error() {
        let options = JobOptions {
            blur_mode: Some("swirl".to_string()),
            feather_px: None,
        };
        let err = redaction_policy(&WorkerConfig::default(), &options).unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }
}
