//! Media toolkit: the four video operations the pipeline depends on.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::frames::{list_frames_async, FRAME_PATTERN};
use crate::probe::probe_video;

/// Printf-style pattern for chunk files written by [`MediaToolkit::split`].
pub const CHUNK_PATTERN: &str = "chunk_%03d.mp4";

/// File name of the chunk with the given 0-based index.
pub fn chunk_file_name(index: usize) -> String {
    format!("chunk_{:03}.mp4", index)
}

/// Video operations used by the pipeline.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Check that `video` exists and is a readable video.
    async fn validate(&self, video: &Path) -> MediaResult<()> {
        if video.is_file() {
            Ok(())
        } else {
            Err(MediaError::FileNotFound(video.to_path_buf()))
        }
    }

    /// Split `video` into consecutive segments of about `segment_seconds`
    /// each, written to `out_dir`. Returns the chunk paths in index order.
    async fn split(
        &self,
        video: &Path,
        out_dir: &Path,
        segment_seconds: u32,
    ) -> MediaResult<Vec<PathBuf>>;

    /// Decode `chunk` into still frames at `framerate` inside `out_dir`.
    /// Returns the frame paths in ascending order.
    async fn extract_frames(
        &self,
        chunk: &Path,
        out_dir: &Path,
        framerate: u32,
    ) -> MediaResult<Vec<PathBuf>>;

    /// Encode the ordered frames of `frame_dir` into `output`.
    async fn encode(&self, frame_dir: &Path, output: &Path, framerate: u32) -> MediaResult<()>;

    /// Join `videos` in the given order into `output` without re-encoding.
    async fn concat(&self, videos: &[PathBuf], output: &Path) -> MediaResult<()>;
}

/// [`MediaToolkit`] backed by the FFmpeg CLI.
#[derive(Debug, Clone, Default)]
pub struct FfmpegToolkit {
    runner: FfmpegRunner,
}

impl FfmpegToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill any single FFmpeg invocation that runs longer than `secs`.
    pub fn with_timeout(secs: u64) -> Self {
        Self {
            runner: FfmpegRunner::new().with_timeout(secs),
        }
    }

    async fn run_timed(&self, operation: &'static str, cmd: &FfmpegCommand) -> MediaResult<()> {
        let start = Instant::now();
        let result = self.run_logged(operation, cmd).await;
        let status = if result.is_ok() { "success" } else { "failure" };
        metrics::histogram!(
            "vamos_ffmpeg_duration_seconds",
            "operation" => operation,
            "status" => status
        )
        .record(start.elapsed().as_secs_f64());
        result
    }

    async fn run_logged(&self, operation: &'static str, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.runner
            .run_with_progress(cmd, move |p| {
                debug!(operation, frame = p.frame, out_time_ms = p.out_time_ms, "FFmpeg progress");
            })
            .await
    }
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn validate(&self, video: &Path) -> MediaResult<()> {
        let info = probe_video(video).await?;
        if !info.has_picture() {
            return Err(MediaError::invalid_video(format!(
                "{} has no picture dimensions",
                video.display()
            )));
        }
        debug!(
            duration = ?info.duration,
            width = info.width,
            height = info.height,
            fps = ?info.fps,
            "Probed input video"
        );
        Ok(())
    }

    async fn split(
        &self,
        video: &Path,
        out_dir: &Path,
        segment_seconds: u32,
    ) -> MediaResult<Vec<PathBuf>> {
        if !video.is_file() {
            return Err(MediaError::FileNotFound(video.to_path_buf()));
        }
        fs::create_dir_all(out_dir).await?;

        let cmd = FfmpegCommand::new(video, out_dir.join(CHUNK_PATTERN))
            .stream_copy()
            .output_args(["-map", "0"])
            .output_format("segment")
            .output_args([
                "-segment_time".to_string(),
                segment_seconds.to_string(),
                "-reset_timestamps".to_string(),
                "1".to_string(),
            ]);
        self.run_timed("split", &cmd).await?;

        let chunks = list_chunks(out_dir).await?;
        info!(
            video = %video.display(),
            chunks = chunks.len(),
            segment_seconds,
            "Split video into chunks"
        );
        Ok(chunks)
    }

    async fn extract_frames(
        &self,
        chunk: &Path,
        out_dir: &Path,
        framerate: u32,
    ) -> MediaResult<Vec<PathBuf>> {
        if !chunk.is_file() {
            return Err(MediaError::FileNotFound(chunk.to_path_buf()));
        }
        fs::create_dir_all(out_dir).await?;

        let cmd = FfmpegCommand::new(chunk, out_dir.join(FRAME_PATTERN))
            .video_filter(format!("fps={}", framerate))
            .output_args(["-start_number", "1", "-qscale:v", "2"]);
        self.run_timed("extract", &cmd).await?;

        list_frames_async(out_dir).await
    }

    async fn encode(&self, frame_dir: &Path, output: &Path, framerate: u32) -> MediaResult<()> {
        if list_frames_async(frame_dir).await?.is_empty() {
            return Err(MediaError::NoFrames(frame_dir.to_path_buf()));
        }
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).await?;
        }

        let cmd = FfmpegCommand::new(frame_dir.join(FRAME_PATTERN), output)
            .input_framerate(framerate)
            .input_arg("-start_number")
            .input_arg("1")
            // libx264 with yuv420p needs even dimensions
            .video_filter("pad=ceil(iw/2)*2:ceil(ih/2)*2")
            .video_codec("libx264")
            .crf(18)
            .preset("medium")
            .pixel_format("yuv420p");
        self.run_timed("encode", &cmd).await
    }

    async fn concat(&self, videos: &[PathBuf], output: &Path) -> MediaResult<()> {
        if videos.is_empty() {
            return Err(MediaError::invalid_video("nothing to concatenate"));
        }
        for video in videos {
            if !video.is_file() {
                return Err(MediaError::FileNotFound(video.clone()));
            }
        }
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).await?;
        }

        let list_path = output.with_extension("concat.txt");
        fs::write(&list_path, concat_list(videos)?).await?;

        let cmd = FfmpegCommand::new(&list_path, output)
            .input_format("concat")
            .input_arg("-safe")
            .input_arg("0")
            .stream_copy();
        let result = self.run_timed("concat", &cmd).await;

        let _ = fs::remove_file(&list_path).await;
        result
    }
}

/// Chunk files of `dir` in index order.
pub async fn list_chunks(dir: &Path) -> MediaResult<Vec<PathBuf>> {
    let mut chunks = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_chunk = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("chunk_") && n.ends_with(".mp4"))
            .unwrap_or(false);
        if is_chunk {
            chunks.push(path);
        }
    }
    chunks.sort();
    Ok(chunks)
}

/// Concat demuxer list file body. Paths are made absolute and single quotes escaped.
fn concat_list(videos: &[PathBuf]) -> MediaResult<String> {
    let mut body = String::new();
    for video in videos {
        let absolute = if video.is_absolute() {
            video.clone()
        } else {
            std::env::current_dir()?.join(video)
        };
        let escaped = absolute.to_string_lossy().replace('\'', "'\\''");
        body.push_str(&format!("file '{}'\n", escaped));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_chunk_file_name() {
        assert_eq!(chunk_file_name(0), "chunk_000.mp4");
        assert_eq!(chunk_file_name(12), "chunk_012.mp4");
    }

    #[test]
    fn test_concat_list_preserves_order_and_escapes() {
        let videos = vec![
            PathBuf::from("/work/encoded/chunk_000.mp4"),
            PathBuf::from("/work/encoded/it's/chunk_001.mp4"),
        ];
        let body = concat_list(&videos).unwrap();
        assert_eq!(
            body,
            "file '/work/encoded/chunk_000.mp4'\nfile '/work/encoded/it'\\''s/chunk_001.mp4'\n"
        );
    }

    #[tokio::test]
    async fn test_list_chunks_in_index_order() {
        let dir = TempDir::new().unwrap();
        for name in ["chunk_002.mp4", "chunk_000.mp4", "chunk_001.mp4", "other.mp4"] {
            fs::write(dir.path().join(name), b"x").await.unwrap();
        }

        let chunks = list_chunks(dir.path()).await.unwrap();
        let expected: Vec<_> = (0..3).map(|i| dir.path().join(chunk_file_name(i))).collect();
        assert_eq!(chunks, expected);
    }

    #[tokio::test]
    async fn test_encode_rejects_empty_frame_dir() {
        let dir = TempDir::new().unwrap();
        let toolkit = FfmpegToolkit::new();

        let err = toolkit
            .encode(dir.path(), &dir.path().join("out.mp4"), 30)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::NoFrames(_)));
    }

    #[tokio::test]
    async fn test_split_missing_input() {
        let dir = TempDir::new().unwrap();
        let toolkit = FfmpegToolkit::new();

        let err = toolkit
            .split(&dir.path().join("missing.mp4"), dir.path(), 10)
            .await
            .unwrap_err();
        assert!(err.is_input_error());
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_split_real_video() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source.mp4");
        let generate = FfmpegCommand::new("testsrc=duration=3:size=64x48:rate=10", &source)
            .input_format("lavfi")
            .video_codec("libx264")
            .output_args(["-g", "10"]);
        FfmpegRunner::new().run(&generate).await.unwrap();

        let toolkit = FfmpegToolkit::new();
        let chunks = toolkit.split(&source, &dir.path().join("chunks"), 1).await.unwrap();
        assert!(chunks.len() >= 2);
    }
}
