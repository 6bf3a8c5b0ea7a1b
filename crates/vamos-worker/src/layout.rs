//! On-disk layout of a job's working directory.
//!
//! ```text
//! {work_dir}/{job_id}/
//!   chunks/chunk_000.mp4
//!   frames/chunk_000/frame_000001.jpg
//!   processed/chunk_000/frame_000001.jpg
//!   encoded/chunk_000.mp4
//!   {job_id}_final.mp4
//! ```

use std::path::{Path, PathBuf};
use vamos_media::toolkit::chunk_file_name;
use vamos_models::JobId;

#[derive(Debug, Clone)]
pub struct JobLayout {
    root: PathBuf,
    final_name: String,
}

impl JobLayout {
    pub fn new(work_dir: impl AsRef<Path>, job_id: &JobId) -> Self {
        Self {
            root: work_dir.as_ref().join(job_id.as_str()),
            final_name: job_id.final_artifact_name(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chunks_dir(&self) -> PathBuf {
        self.root.join("chunks")
    }

    /// Raw frames extracted from chunk `index`.
    pub fn frames_dir(&self, index: usize) -> PathBuf {
        self.root.join("frames").join(chunk_dir_name(index))
    }

    /// Redacted frames of chunk `index`.
    pub fn processed_dir(&self, index: usize) -> PathBuf {
        self.root.join("processed").join(chunk_dir_name(index))
    }

    /// Re-encoded video of chunk `index`.
    pub fn encoded_path(&self, index: usize) -> PathBuf {
        self.root.join("encoded").join(chunk_file_name(index))
    }

    pub fn final_name(&self) -> &str {
        &self.final_name
    }

    pub fn final_path(&self) -> PathBuf {
        self.root.join(&self.final_name)
    }
}

fn chunk_dir_name(index: usize) -> String {
    format!("chunk_{:03}", index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = JobLayout::new("/work", &JobId::from_string("j1"));
        assert_eq!(layout.root(), Path::new("/work/j1"));
        assert_eq!(layout.frames_dir(2), Path::new("/work/j1/frames/chunk_002"));
        assert_eq!(layout.processed_dir(0), Path::new("/work/j1/processed/chunk_000"));
        assert_eq!(layout.encoded_path(11), Path::new("/work/j1/encoded/chunk_011.mp4"));
        assert_eq!(layout.final_path(), Path::new("/work/j1/j1_final.mp4"));
    }
}
