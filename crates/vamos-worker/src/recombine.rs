//! Re-encode processed chunks and join them into the final artifact.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};
use vamos_media::MediaToolkit;
use vamos_models::Stage;

use crate::error::{WorkerError, WorkerResult};
use crate::layout::JobLayout;

/// Turns processed frame directories back into one video.
#[derive(Clone)]
pub struct Recombiner {
    toolkit: Arc<dyn MediaToolkit>,
    framerate: u32,
}

impl Recombiner {
    pub fn new(toolkit: Arc<dyn MediaToolkit>, framerate: u32) -> Self {
        Self { toolkit, framerate }
    }

    /// Encode the frames of one chunk, in frame order, into `output`.
    ///
    /// A missing or empty frame directory is an input error, reported by
    /// the toolkit.
    pub async fn encode_chunk(&self, frame_dir: &Path, output: &Path) -> WorkerResult<()> {
        self.toolkit.encode(frame_dir, output, self.framerate).await?;
        debug!(output = %output.display(), "Encoded chunk");
        Ok(())
    }

    /// Join encoded chunks, in the given order, into `output`.
    pub async fn concatenate(&self, ordered: &[PathBuf], output: &Path) -> WorkerResult<()> {
        if ordered.is_empty() {
            return Err(WorkerError::internal("no encoded chunks to concatenate"));
        }
        self.toolkit.concat(ordered, output).await?;
        Ok(())
    }

    /// Encode every chunk of a job in index order and join them.
    ///
    /// `on_stage` is called with [`Stage::CombiningFinal`] once all chunks are
    /// encoded, before the final join.
    pub async fn recombine<F>(
        &self,
        layout: &JobLayout,
        chunk_count: usize,
        mut on_stage: F,
    ) -> WorkerResult<PathBuf>
    where
        F: FnMut(Stage) + Send,
    {
        let mut encoded = Vec::with_capacity(chunk_count);
        for index in 0..chunk_count {
            let output = layout.encoded_path(index);
            self.encode_chunk(&layout.processed_dir(index), &output).await?;
            encoded.push(output);
        }

        on_stage(Stage::CombiningFinal);

        let final_path = layout.final_path();
        self.concatenate(&encoded, &final_path).await?;
        info!(chunks = chunk_count, output = %final_path.display(), "Recombined job");
        Ok(final_path)
    }
}
