//! End-to-end pipeline tests against an in-process media toolkit.
//!
//! The fake toolkit "encodes" a chunk by concatenating its frame files and
//! "joins" chunks by concatenating the encoded files, so the final artifact
//! is exactly the ordered bytes of every processed frame.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::StreamExt;
use image::{Rgb, RgbImage};
use tempfile::TempDir;
use vamos_detect::{DetectError, DetectResult, Detector, PassthroughDetector};
use vamos_media::{
    frame_file_name, list_frames, write_frame, MediaError, MediaResult, MediaToolkit,
};
use vamos_models::{
    BoundingBox, Category, Detection, JobId, JobOptions, JobSnapshot, JobStatus, Stage,
};
use vamos_worker::{progress_stream, JobCoordinator, ProgressRegistry, StreamOptions, WorkerConfig};

struct FakeToolkit {
    chunks: usize,
    frames_per_chunk: usize,
    fail_extract: Option<usize>,
    /// Extracted frame bytes, by chunk index
    extracted: Mutex<Vec<Vec<Vec<u8>>>>,
}

impl FakeToolkit {
    fn new(chunks: usize, frames_per_chunk: usize) -> Self {
        Self {
            chunks,
            frames_per_chunk,
            fail_extract: None,
            extracted: Mutex::new(vec![Vec::new(); chunks]),
        }
    }

    fn failing_extract(mut self, chunk: usize) -> Self {
        self.fail_extract = Some(chunk);
        self
    }

    /// Every extracted frame, in chunk then frame order.
    fn source_bytes(&self) -> Vec<u8> {
        self.extracted
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .flatten()
            .copied()
            .collect()
    }
}

fn chunk_index(chunk: &Path) -> usize {
    chunk
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.strip_prefix("chunk_"))
        .and_then(|s| s.parse().ok())
        .unwrap()
}

#[async_trait]
impl MediaToolkit for FakeToolkit {
    async fn split(&self, video: &Path, out_dir: &Path, _: u32) -> MediaResult<Vec<PathBuf>> {
        if !video.is_file() {
            return Err(MediaError::FileNotFound(video.to_path_buf()));
        }
        std::fs::create_dir_all(out_dir)?;
        let mut chunks = Vec::new();
        for index in 0..self.chunks {
            let path = out_dir.join(format!("chunk_{:03}.mp4", index));
            std::fs::write(&path, format!("chunk {}", index))?;
            chunks.push(path);
        }
        Ok(chunks)
    }

    async fn extract_frames(
        &self,
        chunk: &Path,
        out_dir: &Path,
        _: u32,
    ) -> MediaResult<Vec<PathBuf>> {
        let index = chunk_index(chunk);
        if self.fail_extract == Some(index) {
            return Err(MediaError::ffmpeg_failed("decoder error", None, Some(1)));
        }

        let mut bytes = Vec::new();
        for frame in 1..=self.frames_per_chunk {
            let image = RgbImage::from_fn(64, 48, |x, y| {
                let v = if (x / 4 + y / 4) % 2 == 0 { 60 } else { 180 };
                Rgb([v, (index * 40) as u8, (frame * 20) as u8])
            });
            let path = out_dir.join(frame_file_name(frame));
            write_frame(&path, &image)?;
            bytes.push(std::fs::read(&path)?);
        }
        self.extracted.lock().unwrap()[index] = bytes;
        list_frames(out_dir)
    }

    async fn encode(&self, frame_dir: &Path, output: &Path, _: u32) -> MediaResult<()> {
        let frames = list_frames(frame_dir)?;
        if frames.is_empty() {
            return Err(MediaError::NoFrames(frame_dir.to_path_buf()));
        }
        let mut body = Vec::new();
        for frame in frames {
            body.extend(std::fs::read(frame)?);
        }
        std::fs::create_dir_all(output.parent().unwrap())?;
        std::fs::write(output, body)?;
        Ok(())
    }

    async fn concat(&self, videos: &[PathBuf], output: &Path) -> MediaResult<()> {
        let mut body = Vec::new();
        for video in videos {
            body.extend(std::fs::read(video)?);
        }
        std::fs::write(output, body)?;
        Ok(())
    }
}

struct FailingDetector;

impl Detector for FailingDetector {
    fn detect(&self, _: &RgbImage) -> DetectResult<Vec<Detection>> {
        Err(DetectError::ServiceUnavailable("inference service down".into()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

struct FaceDetector;

impl Detector for FaceDetector {
    fn detect(&self, _: &RgbImage) -> DetectResult<Vec<Detection>> {
        Ok(vec![Detection::new(
            Category::Face,
            BoundingBox::new(16.0, 12.0, 24.0, 24.0),
            0.9,
        )])
    }

    fn name(&self) -> &'static str {
        "face"
    }
}

struct Harness {
    _dir: TempDir,
    input: PathBuf,
    work_dir: PathBuf,
    toolkit: Arc<FakeToolkit>,
    registry: Arc<ProgressRegistry>,
    coordinator: JobCoordinator,
}

fn harness(toolkit: FakeToolkit, detector: Arc<dyn Detector>) -> Harness {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.mp4");
    std::fs::write(&input, b"not really a video").unwrap();
    let work_dir = dir.path().join("work");

    let config = WorkerConfig {
        work_dir: work_dir.clone(),
        max_workers: 2,
        ..WorkerConfig::default()
    };
    let toolkit = Arc::new(toolkit);
    let registry = Arc::new(ProgressRegistry::new());
    let coordinator = JobCoordinator::new(Arc::clone(&registry), toolkit.clone(), detector, config);

    Harness {
        _dir: dir,
        input,
        work_dir,
        toolkit,
        registry,
        coordinator,
    }
}

impl Harness {
    async fn run(&self, video: &Path, options: JobOptions) -> (JobId, JobSnapshot) {
        let job_id = JobId::new();
        self.registry.create(JobSnapshot::new(job_id.clone(), video));
        let _ = self.coordinator.run_job(&job_id, video, options).await;
        let snapshot = self.registry.snapshot(&job_id).unwrap();
        (job_id, snapshot)
    }
}

#[tokio::test]
async fn test_successful_job_leaves_only_final_artifact() {
    let h = harness(FakeToolkit::new(3, 4), Arc::new(PassthroughDetector));
    let (job_id, snapshot) = h.run(&h.input, JobOptions::default()).await;

    assert_eq!(snapshot.status, JobStatus::Done);
    assert_eq!(snapshot.stage, Stage::Done);
    assert_eq!(snapshot.overall_progress, 100.0);
    assert_eq!(snapshot.chunk_progress, vec![100.0; 3]);

    let root = h.work_dir.join(job_id.as_str());
    let entries: Vec<String> = std::fs::read_dir(&root)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, vec![job_id.final_artifact_name()]);
    assert_eq!(snapshot.result_path, Some(root.join(job_id.final_artifact_name())));
}

#[tokio::test]
async fn test_zero_detections_reproduce_frames_in_order() {
    let h = harness(FakeToolkit::new(4, 3), Arc::new(PassthroughDetector));
    let (_, snapshot) = h.run(&h.input, JobOptions::default()).await;
    assert_eq!(snapshot.status, JobStatus::Done);

    let result = std::fs::read(snapshot.result_path.unwrap()).unwrap();
    assert_eq!(result, h.toolkit.source_bytes());
}

#[tokio::test]
async fn test_failing_detector_passes_frames_through() {
    let h = harness(FakeToolkit::new(2, 2), Arc::new(FailingDetector));
    let (_, snapshot) = h.run(&h.input, JobOptions::default()).await;

    assert_eq!(snapshot.status, JobStatus::Done);
    let result = std::fs::read(snapshot.result_path.unwrap()).unwrap();
    assert_eq!(result, h.toolkit.source_bytes());
}

#[tokio::test]
async fn test_detected_faces_are_redacted() {
    let h = harness(FakeToolkit::new(2, 2), Arc::new(FaceDetector));
    let options = JobOptions {
        blur_mode: Some("mosaic".to_string()),
        feather_px: Some(4),
    };
    let (_, snapshot) = h.run(&h.input, options).await;

    assert_eq!(snapshot.status, JobStatus::Done);
    let result = std::fs::read(snapshot.result_path.unwrap()).unwrap();
    assert_ne!(result, h.toolkit.source_bytes());
}

#[tokio::test]
async fn test_unknown_blur_mode_fails_during_masking() {
    let h = harness(FakeToolkit::new(2, 2), Arc::new(PassthroughDetector));
    let options = JobOptions {
        blur_mode: Some("swirl".to_string()),
        feather_px: None,
    };
    let (_, snapshot) = h.run(&h.input, options).await;

    assert_eq!(snapshot.status, JobStatus::Error);
    assert_eq!(snapshot.stage, Stage::Masking);
    let message = snapshot.error_message.unwrap();
    assert!(message.starts_with("ConfigurationError"), "{}", message);
    assert!(message.contains("swirl"));
}

#[tokio::test]
async fn test_missing_video_is_input_error() {
    let h = harness(FakeToolkit::new(2, 2), Arc::new(PassthroughDetector));
    let missing = h.input.with_file_name("missing.mp4");
    let (_, snapshot) = h.run(&missing, JobOptions::default()).await;

    assert_eq!(snapshot.status, JobStatus::Error);
    assert_eq!(snapshot.stage, Stage::Splitting);
    assert!(snapshot.error_message.unwrap().starts_with("InputError"));
}

#[tokio::test]
async fn test_chunk_failure_fails_job_and_keeps_workdir() {
    let h = harness(FakeToolkit::new(3, 2).failing_extract(1), Arc::new(PassthroughDetector));
    let (job_id, snapshot) = h.run(&h.input, JobOptions::default()).await;

    assert_eq!(snapshot.status, JobStatus::Error);
    assert!(snapshot.error_message.unwrap().starts_with("EncodeError"));
    assert!(snapshot.result_path.is_none());
    assert!(h.work_dir.join(job_id.as_str()).join("chunks").is_dir());
}

#[tokio::test]
async fn test_progress_stream_ends_with_done() {
    let h = harness(FakeToolkit::new(3, 5), Arc::new(PassthroughDetector));
    let job_id = h.coordinator.start_job(h.input.clone(), JobOptions::default());

    let events: Vec<_> = progress_stream(Arc::clone(&h.registry), job_id, StreamOptions::default())
        .collect()
        .await;

    let last = events.last().unwrap();
    assert_eq!(last.status, JobStatus::Done);
    assert_eq!(last.to_wire(), "data: 100.00,done,done\n\n");
    for pair in events.windows(2) {
        assert!(pair[1].progress >= pair[0].progress);
    }
}
