//! Input validation through ffprobe.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// What the pipeline needs to know about a source video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Container duration in seconds, when the container records one
    pub duration: Option<f64>,
    pub width: u32,
    pub height: u32,
    /// Average frame rate; absent for variable-rate streams ffprobe can't average
    pub fps: Option<f64>,
}

impl VideoInfo {
    pub fn has_picture(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Shape of `ffprobe -show_entries ... -of json` for the first video stream.
#[derive(Debug, Default, Deserialize)]
struct ProbeDoc {
    #[serde(default)]
    streams: Vec<StreamEntry>,
    #[serde(default)]
    format: FormatEntry,
}

#[derive(Debug, Default, Deserialize)]
struct StreamEntry {
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    avg_frame_rate: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FormatEntry {
    duration: Option<String>,
}

/// Probe the first video stream of `path`.
///
/// Files ffprobe cannot read, and files without a video stream, are
/// reported as [`MediaError::InvalidVideo`].
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let ffprobe = check_ffprobe()?;
    let output = Command::new(ffprobe)
        .args(["-v", "error", "-select_streams", "v:0"])
        .args(["-show_entries", "stream=width,height,avg_frame_rate:format=duration"])
        .args(["-of", "json"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let reason = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::invalid_video(format!(
            "{}: {}",
            path.display(),
            reason.trim()
        )));
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<VideoInfo> {
    let doc: ProbeDoc = serde_json::from_slice(stdout)?;
    let stream = doc
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| MediaError::invalid_video("no video stream"))?;

    Ok(VideoInfo {
        duration: doc.format.duration.and_then(|d| d.parse().ok()),
        width: stream.width,
        height: stream.height,
        fps: stream.avg_frame_rate.as_deref().and_then(rational),
    })
}

/// `"30000/1001"` or `"25"` as a positive rate.
fn rational(s: &str) -> Option<f64> {
    let value = match s.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num.parse::<f64>().ok()? / den
        }
        None => s.parse().ok()?,
    };
    (value > 0.0).then_some(value)
}
