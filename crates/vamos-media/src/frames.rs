//! Frame file I/O.
//!
//! Frames live in one directory per chunk, named `frame_NNNNNN.jpg` with a
//! 1-based index, so lexical order equals temporal order.

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::{MediaError, MediaResult};

/// JPEG quality for processed frames.
pub const JPEG_QUALITY: u8 = 95;

/// Printf-style pattern matching [`frame_file_name`], for FFmpeg.
pub const FRAME_PATTERN: &str = "frame_%06d.jpg";

/// File name of the frame with the given 1-based index.
pub fn frame_file_name(index: usize) -> String {
    format!("frame_{:06}.jpg", index)
}

fn is_frame_file(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };
    name.starts_with("frame_")
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
            .unwrap_or(false)
}

/// List the frames of a directory in ascending order.
pub fn list_frames(dir: impl AsRef<Path>) -> MediaResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(MediaError::FileNotFound(dir.to_path_buf()));
    }

    let mut frames = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_frame_file(&path) {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

/// [`list_frames`] on the blocking pool, for callers on an async task.
pub async fn list_frames_async(dir: impl AsRef<Path>) -> MediaResult<Vec<PathBuf>> {
    let dir = dir.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || list_frames(dir))
        .await
        .map_err(|e| MediaError::internal(format!("frame listing task failed: {}", e)))?
}

/// Decode a frame into RGB.
pub fn read_frame(path: impl AsRef<Path>) -> MediaResult<RgbImage> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    Ok(image::open(path)?.to_rgb8())
}

/// Encode a frame as JPEG.
pub fn write_frame(path: impl AsRef<Path>, frame: &RgbImage) -> MediaResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    let encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
    frame.write_with_encoder(encoder)?;
    Ok(())
}
