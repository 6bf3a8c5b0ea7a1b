//! FFmpeg invocation: argument building and a supervised runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::{FfmpegProgress, ProgressParser, StderrLine};

/// Diagnostic lines kept for the error report of a failed run.
const STDERR_TAIL_LINES: usize = 20;

/// One FFmpeg invocation with a single input and a single output.
///
/// Always overwrites the output, logs at `error` level and streams
/// `-progress` blocks to stderr.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    before_input: Vec<String>,
    after_input: Vec<String>,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            before_input: Vec::new(),
            after_input: Vec::new(),
        }
    }

    /// Option applied to the input (placed before `-i`).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.before_input.push(arg.into());
        self
    }

    /// Option applied to the output (placed after `-i`).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.after_input.push(arg.into());
        self
    }

    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.after_input.extend(args.into_iter().map(Into::into));
        self
    }

    fn output_opt(self, flag: &str, value: impl Into<String>) -> Self {
        self.output_arg(flag).output_arg(value)
    }

    pub fn input_format(self, format: impl Into<String>) -> Self {
        self.input_arg("-f").input_arg(format)
    }

    /// Rate at which an image sequence input is read.
    pub fn input_framerate(self, fps: u32) -> Self {
        self.input_arg("-framerate").input_arg(fps.to_string())
    }

    pub fn output_format(self, format: impl Into<String>) -> Self {
        self.output_opt("-f", format)
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_opt("-vf", filter)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_opt("-c:v", codec)
    }

    /// Remux every stream as-is.
    pub fn stream_copy(self) -> Self {
        self.output_opt("-c", "copy")
    }

    pub fn crf(self, crf: u8) -> Self {
        self.output_opt("-crf", crf.to_string())
    }

    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_opt("-preset", preset)
    }

    pub fn pixel_format(self, format: impl Into<String>) -> Self {
        self.output_opt("-pix_fmt", format)
    }

    pub fn build_args(&self) -> Vec<String> {
        let fixed = ["-y", "-v", "error", "-progress", "pipe:2"];
        fixed
            .iter()
            .map(|s| s.to_string())
            .chain(self.before_input.iter().cloned())
            .chain(["-i".to_string(), self.input.to_string_lossy().into_owned()])
            .chain(self.after_input.iter().cloned())
            .chain(std::iter::once(self.output.to_string_lossy().into_owned()))
            .collect()
    }
}

/// Runs [`FfmpegCommand`]s, reporting progress and enforcing an optional
/// wall-clock limit per invocation.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run `cmd`, calling `on_progress` for each completed progress block.
    ///
    /// A failed run carries the tail of FFmpeg's diagnostics in
    /// [`MediaError::FfmpegFailed`].
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, on_progress: F) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        let ffmpeg = check_ffmpeg()?;
        let args = cmd.build_args();
        debug!("ffmpeg {}", args.join(" "));

        let mut child = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stderr not captured"))?;

        let diagnostics = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let reader = tokio::spawn(drain_stderr(
            BufReader::new(stderr),
            on_progress,
            Arc::clone(&diagnostics),
        ));

        let status = self.wait(&mut child).await;
        let _ = reader.await;
        let status = status?;

        if status.success() {
            return Ok(());
        }

        let tail = diagnostics
            .lock()
            .ok()
            .map(|lines| Vec::from(lines.clone()).join("\n"))
            .filter(|s| !s.is_empty());
        Err(MediaError::ffmpeg_failed(
            format!("exited with {}", status),
            tail,
            status.code(),
        ))
    }

    async fn wait(&self, child: &mut Child) -> MediaResult<ExitStatus> {
        let Some(secs) = self.timeout_secs else {
            return Ok(child.wait().await?);
        };

        match tokio::time::timeout(Duration::from_secs(secs), child.wait()).await {
            Ok(status) => Ok(status?),
            Err(_) => {
                warn!(timeout_secs = secs, "FFmpeg exceeded its time limit, killing it");
                let _ = child.kill().await;
                Err(MediaError::Timeout(secs))
            }
        }
    }
}

async fn drain_stderr<R, F>(
    reader: BufReader<R>,
    on_progress: F,
    diagnostics: Arc<Mutex<VecDeque<String>>>,
) where
    R: tokio::io::AsyncRead + Unpin,
    F: Fn(FfmpegProgress),
{
    let mut lines = reader.lines();
    let mut parser = ProgressParser::new();

    while let Ok(Some(line)) = lines.next_line().await {
        match parser.feed(&line) {
            StderrLine::Progress(progress) => on_progress(progress),
            StderrLine::Partial => {}
            StderrLine::Diagnostic(message) => {
                if let Ok(mut tail) = diagnostics.lock() {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(message);
                }
            }
        }
    }
}

/// Path of the `ffmpeg` binary.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::ToolMissing("ffmpeg"))
}

/// Path of the `ffprobe` binary.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::ToolMissing("ffprobe"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_options_precede_input() {
        let cmd = FfmpegCommand::new("frames/frame_%06d.jpg", "chunk_000.mp4")
            .input_framerate(30)
            .video_codec("libx264")
            .crf(18)
            .preset("medium")
            .pixel_format("yuv420p");

        let args = cmd.build_args();
        let framerate = args.iter().position(|a| a == "-framerate").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(framerate < input);
        assert_eq!(args[input + 1], "frames/frame_%06d.jpg");
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"yuv420p".to_string()));
        assert_eq!(args.last().unwrap(), "chunk_000.mp4");
    }

    #[test]
    fn test_progress_always_piped() {
        let args = FfmpegCommand::new("in.mp4", "out.mp4").build_args();
        assert_eq!(&args[..5], &["-y", "-v", "error", "-progress", "pipe:2"]);
        assert_eq!(args.len(), 8);
    }

    #[tokio::test]
    async fn test_drain_stderr_splits_progress_from_diagnostics() {
        let stderr: &[u8] = b"frame=10\nout_time_us=400000\nprogress=continue\n\
            [h264] decode error\nframe=20\nprogress=end\n";
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let diagnostics = Arc::new(Mutex::new(VecDeque::new()));

        drain_stderr(
            BufReader::new(stderr),
            move |p| sink.lock().unwrap().push(p),
            Arc::clone(&diagnostics),
        )
        .await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].frame, 10);
        assert!(seen[1].is_complete);
        assert_eq!(
            diagnostics.lock().unwrap().iter().collect::<Vec<_>>(),
            vec!["[h264] decode error"]
        );
    }
}
