//! Chunk processing: detect, composite and write every frame of one chunk.
//!
//! Runs on a blocking thread. Frames are handled strictly in order, and
//! progress for the chunk is reported after every detection and every frame.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use image::{imageops, RgbImage};
use tracing::{debug, warn};
use vamos_detect::Detector;
use vamos_media::{list_frames, read_frame, write_frame, RedactionPolicy};
use vamos_models::{BoundingBox, Detection, JobId};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::registry::{ChunkUpdate, ProgressRegistry};

/// Shared, read-only state for all chunks of a job.
pub struct ChunkContext {
    pub registry: Arc<ProgressRegistry>,
    pub detector: Arc<dyn Detector>,
    pub policy: RedactionPolicy,
    pub min_confidence: f32,
}

/// Where one chunk reads its frames from and writes them to.
#[derive(Debug, Clone)]
pub struct ChunkWork {
    pub frames_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// Outcome of a processed chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkSummary {
    pub frames: usize,
    /// Frames with at least one region blurred
    pub redacted_frames: usize,
    pub regions: usize,
    /// Frames passed through because the detector failed
    pub detector_failures: usize,
}

/// Process every frame of one chunk.
///
/// A frame that cannot be read or written aborts the chunk. A detector
/// failure only passes that frame through unmodified.
pub fn process_chunk(
    ctx: &ChunkContext,
    work: &ChunkWork,
    job_id: &JobId,
    chunk_index: usize,
    total_chunks: usize,
) -> WorkerResult<ChunkSummary> {
    let started = Instant::now();
    let frames = list_frames(&work.frames_dir).map_err(|e| {
        WorkerError::input(format!("chunk {} frames unavailable: {}", chunk_index, e))
    })?;
    fs::create_dir_all(&work.output_dir).map_err(|e| {
        WorkerError::encode(format!(
            "cannot create output directory {}: {}",
            work.output_dir.display(),
            e
        ))
    })?;

    let total = frames.len();
    let mut summary = ChunkSummary {
        frames: total,
        ..ChunkSummary::default()
    };

    debug!(
        %job_id,
        chunk = chunk_index,
        total_chunks,
        frames = total,
        detector = ctx.detector.name(),
        "Processing chunk"
    );

    if total == 0 {
        report(ctx, job_id, chunk_index, ChunkUpdate::Frames { done: 0, total: 0 });
        return Ok(summary);
    }

    for (frame_index, frame_path) in frames.iter().enumerate() {
        let file_name = frame_path
            .file_name()
            .ok_or_else(|| WorkerError::input(format!("bad frame path {}", frame_path.display())))?;
        let output_path = work.output_dir.join(file_name);

        let mut frame = read_frame(frame_path).map_err(|e| {
            WorkerError::input(format!("cannot read frame {}: {}", frame_path.display(), e))
        })?;

        let detections = match ctx.detector.detect(&frame) {
            Ok(detections) => detections,
            Err(e) => {
                let err = WorkerError::from(e);
                warn!(
                    %job_id,
                    chunk = chunk_index,
                    frame = frame_index,
                    kind = err.kind(),
                    "Detector failed, passing frame through: {}", err
                );
                metrics::record_detector_failure(ctx.detector.name());
                summary.detector_failures += 1;
                Vec::new()
            }
        };

        let qualifying: Vec<&Detection> = detections
            .iter()
            .filter(|d| d.confidence >= ctx.min_confidence)
            .collect();

        if qualifying.is_empty() {
            // Byte-for-byte copy, no re-encode
            fs::copy(frame_path, &output_path).map_err(|e| {
                WorkerError::encode(format!("cannot write frame {}: {}", output_path.display(), e))
            })?;
        } else {
            let count = qualifying.len();
            let mut regions = 0;
            for (applied, detection) in qualifying.into_iter().enumerate() {
                let refined = if detection.category.wants_face_refinement() {
                    refine_faces(ctx, &frame, detection, job_id)
                } else {
                    Vec::new()
                };
                regions += ctx.policy.apply(&mut frame, detection, &refined);

                report(
                    ctx,
                    job_id,
                    chunk_index,
                    ChunkUpdate::Partial {
                        frame: frame_index,
                        total,
                        fraction: (applied + 1) as f64 / count as f64,
                    },
                );
            }

            write_frame(&output_path, &frame).map_err(|e| {
                WorkerError::encode(format!("cannot write frame {}: {}", output_path.display(), e))
            })?;
            if regions > 0 {
                summary.redacted_frames += 1;
            }
            summary.regions += regions;
        }

        report(
            ctx,
            job_id,
            chunk_index,
            ChunkUpdate::Frames {
                done: frame_index + 1,
                total,
            },
        );
    }

    metrics::record_chunk_processed(
        summary.frames,
        summary.regions,
        started.elapsed().as_secs_f64(),
    );
    Ok(summary)
}

/// Finer face boxes inside a detection's region, in frame coordinates.
fn refine_faces(
    ctx: &ChunkContext,
    frame: &RgbImage,
    detection: &Detection,
    job_id: &JobId,
) -> Vec<BoundingBox> {
    let (width, height) = frame.dimensions();
    let region = detection.bbox.clamp_to(width, height);
    let x = region.x.floor() as u32;
    let y = region.y.floor() as u32;
    let w = (region.x2().ceil() as u32).min(width).saturating_sub(x);
    let h = (region.y2().ceil() as u32).min(height).saturating_sub(y);
    if w == 0 || h == 0 {
        return Vec::new();
    }

    let crop = imageops::crop_imm(frame, x, y, w, h).to_image();
    match ctx.detector.refine_faces(&crop) {
        Ok(faces) => {
            let origin = BoundingBox::new(x as f64, y as f64, w as f64, h as f64);
            faces.iter().map(|face| origin.offset_from(face)).collect()
        }
        Err(e) => {
            warn!(%job_id, "Face refinement failed, blurring whole region: {}", e);
            metrics::record_detector_failure(ctx.detector.name());
            Vec::new()
        }
    }
}

fn report(ctx: &ChunkContext, job_id: &JobId, chunk_index: usize, update: ChunkUpdate) {
    if let Err(e) = ctx.registry.report_chunk_progress(job_id, chunk_index, update) {
        debug!(%job_id, chunk = chunk_index, "Progress update rejected: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use vamos_detect::{DetectError, DetectResult};
    use vamos_media::frame_file_name;
    use vamos_models::{Category, JobSnapshot, JobStatus, Stage};

    /// Detector returning one scripted answer per call, in order.
    struct ScriptedDetector {
        answers: Mutex<Vec<DetectResult<Vec<Detection>>>>,
    }

    impl ScriptedDetector {
        fn new(mut answers: Vec<DetectResult<Vec<Detection>>>) -> Self {
            answers.reverse();
            Self {
                answers: Mutex::new(answers),
            }
        }
    }

    impl Detector for ScriptedDetector {
        fn detect(&self, _frame: &RgbImage) -> DetectResult<Vec<Detection>> {
            self.answers.lock().unwrap().pop().unwrap_or_else(|| Ok(Vec::new()))
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn setup(frames: usize) -> (TempDir, ChunkWork) {
        let dir = TempDir::new().unwrap();
        let work = ChunkWork {
            frames_dir: dir.path().join("frames"),
            output_dir: dir.path().join("processed"),
        };
        fs::create_dir_all(&work.frames_dir).unwrap();
        for i in 1..=frames {
            let frame = RgbImage::from_fn(48, 48, |x, y| {
                let v = if (x + y) % 2 == 0 { 80 } else { 140 };
                Rgb([v, v, (i * 10) as u8])
            });
            write_frame(work.frames_dir.join(frame_file_name(i)), &frame).unwrap();
        }
        (dir, work)
    }

    fn context(detector: Arc<dyn Detector>) -> (ChunkContext, JobId) {
        let registry = Arc::new(ProgressRegistry::new());
        let job_id = JobId::new();
        registry.create(JobSnapshot::new(job_id.clone(), "/tmp/in.mp4"));
        registry
            .mutate(&job_id, |s| {
                s.status = JobStatus::Processing;
                s.stage = Stage::Masking;
                s.chunk_progress = vec![0.0];
            })
            .unwrap();
        let ctx = ChunkContext {
            registry,
            detector,
            policy: RedactionPolicy::default(),
            min_confidence: 0.3,
        };
        (ctx, job_id)
    }

    fn face(confidence: f32) -> Detection {
        Detection::new(Category::Face, BoundingBox::new(10.0, 10.0, 20.0, 20.0), confidence)
    }

    #[test]
    fn test_frames_without_detections_are_copied_verbatim() {
        let (_dir, work) = setup(3);
        let (ctx, job_id) = context(Arc::new(vamos_detect::PassthroughDetector));

        let summary = process_chunk(&ctx, &work, &job_id, 0, 1).unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.redacted_frames, 0);

        for i in 1..=3 {
            let name = frame_file_name(i);
            let original = fs::read(work.frames_dir.join(&name)).unwrap();
            let processed = fs::read(work.output_dir.join(&name)).unwrap();
            assert_eq!(original, processed);
        }
        assert_eq!(ctx.registry.snapshot(&job_id).unwrap().chunk_progress, vec![100.0]);
    }

    #[test]
    fn test_detector_failure_passes_frame_through() {
        let (_dir, work) = setup(3);
        let detector = ScriptedDetector::new(vec![
            Ok(vec![face(0.9)]),
            Err(DetectError::ServiceUnavailable("503".into())),
            Ok(vec![face(0.9)]),
        ]);
        let (ctx, job_id) = context(Arc::new(detector));

        let summary = process_chunk(&ctx, &work, &job_id, 0, 1).unwrap();
        assert_eq!(summary.detector_failures, 1);
        assert_eq!(summary.redacted_frames, 2);

        let name = frame_file_name(2);
        assert_eq!(
            fs::read(work.frames_dir.join(&name)).unwrap(),
            fs::read(work.output_dir.join(&name)).unwrap()
        );
        let name = frame_file_name(1);
        assert_ne!(
            fs::read(work.frames_dir.join(&name)).unwrap(),
            fs::read(work.output_dir.join(&name)).unwrap()
        );
    }

    #[test]
    fn test_low_confidence_detections_are_skipped() {
        let (_dir, work) = setup(1);
        let detector = ScriptedDetector::new(vec![Ok(vec![face(0.29)])]);
        let (ctx, job_id) = context(Arc::new(detector));

        let summary = process_chunk(&ctx, &work, &job_id, 0, 1).unwrap();
        assert_eq!(summary.regions, 0);
        let name = frame_file_name(1);
        assert_eq!(
            fs::read(work.frames_dir.join(&name)).unwrap(),
            fs::read(work.output_dir.join(&name)).unwrap()
        );
    }

    #[test]
    fn test_empty_chunk_reports_complete() {
        let (_dir, work) = setup(0);
        let (ctx, job_id) = context(Arc::new(vamos_detect::PassthroughDetector));

        let summary = process_chunk(&ctx, &work, &job_id, 0, 1).unwrap();
        assert_eq!(summary, ChunkSummary::default());
        assert_eq!(ctx.registry.snapshot(&job_id).unwrap().chunk_progress, vec![100.0]);
    }

    #[test]
    fn test_corrupt_frame_aborts_chunk() {
        let (_dir, work) = setup(2);
        fs::write(work.frames_dir.join(frame_file_name(2)), b"garbage").unwrap();
        let (ctx, job_id) = context(Arc::new(vamos_detect::PassthroughDetector));

        let err = process_chunk(&ctx, &work, &job_id, 0, 1).unwrap_err();
        assert_eq!(err.kind(), "InputError");
        assert!((ctx.registry.snapshot(&job_id).unwrap().chunk_progress[0] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_frames_dir_is_input_error() {
        let dir = TempDir::new().unwrap();
        let work = ChunkWork {
            frames_dir: dir.path().join("nope"),
            output_dir: dir.path().join("out"),
        };
        let (ctx, job_id) = context(Arc::new(vamos_detect::PassthroughDetector));

        let err = process_chunk(&ctx, &work, &job_id, 0, 1).unwrap_err();
        assert_eq!(err.kind(), "InputError");
    }

    #[test]
    fn test_unwritable_output_dir_is_encode_error() {
        let (dir, mut work) = setup(1);
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();
        work.output_dir = blocker.join("processed");
        let (ctx, job_id) = context(Arc::new(vamos_detect::PassthroughDetector));

        let err = process_chunk(&ctx, &work, &job_id, 0, 1).unwrap_err();
        assert_eq!(err.kind(), "EncodeError");
        assert!(err.job_message().starts_with("EncodeError: cannot create output directory"));
    }

    struct RefiningDetector;

    impl Detector for RefiningDetector {
        fn detect(&self, _frame: &RgbImage) -> DetectResult<Vec<Detection>> {
            Ok(vec![Detection::new(
                Category::Person,
                BoundingBox::new(4.0, 4.0, 40.0, 40.0),
                0.8,
            )])
        }

        fn refine_faces(&self, region: &RgbImage) -> DetectResult<Vec<BoundingBox>> {
            assert_eq!(region.dimensions(), (40, 40));
            Ok(vec![BoundingBox::new(2.0, 2.0, 8.0, 8.0)])
        }

        fn name(&self) -> &'static str {
            "refining"
        }
    }

    #[test]
    fn test_person_region_uses_refined_face() {
        let (_dir, work) = setup(1);
        let (ctx, job_id) = context(Arc::new(RefiningDetector));

        let summary = process_chunk(&ctx, &work, &job_id, 0, 1).unwrap();
        assert_eq!(summary.regions, 1);

        let name = frame_file_name(1);
        let original = read_frame(work.frames_dir.join(&name)).unwrap();
        let processed = read_frame(work.output_dir.join(&name)).unwrap();
        // The refined face sits at (6..14, 6..14); far corner of the person box is untouched
        let far = (40, 40);
        let diff = |a: &Rgb<u8>, b: &Rgb<u8>| (a[0] as i32 - b[0] as i32).abs();
        assert!(diff(original.get_pixel(far.0, far.1), processed.get_pixel(far.0, far.1)) <= 12);
        assert!(diff(original.get_pixel(10, 10), processed.get_pixel(10, 10)) > 15);
    }
}
