//! Media toolkit and compositor for the redaction pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - The `MediaToolkit` seam (split, extract, encode, concat) and its FFmpeg implementation
//! - Frame file I/O
//! - The compositor: region masks, feathered alpha and blur transforms

pub mod command;
pub mod compositor;
pub mod error;
pub mod frames;
pub mod fs_utils;
pub mod probe;
pub mod progress;
pub mod toolkit;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compositor::{
    adaptive_kernel_size, apply_blur, build_alpha_from_mask, expand_box, mask_from_region,
    AlphaMask, RedactionPolicy, RegionShape,
};
pub use error::{MediaError, MediaResult};
pub use frames::{frame_file_name, list_frames, list_frames_async, read_frame, write_frame};
pub use probe::{probe_video, VideoInfo};
pub use progress::{FfmpegProgress, ProgressParser, StderrLine};
pub use toolkit::{FfmpegToolkit, MediaToolkit};
