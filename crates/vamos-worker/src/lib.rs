//! Chunked video redaction pipeline.
//!
//! This crate provides:
//! - The progress registry, the single source of truth for job state
//! - The job coordinator and its bounded per-job worker pool
//! - Per-chunk frame processing (detect, composite, write)
//! - Recombination of processed frames into the final artifact
//! - The progress stream consumed by live clients
//! - The reaper retiring expired jobs and stale results

pub mod chunk;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod layout;
pub mod logging;
pub mod metrics;
pub mod reaper;
pub mod recombine;
pub mod registry;
pub mod stream;

pub use chunk::{process_chunk, ChunkContext, ChunkSummary, ChunkWork};
pub use config::WorkerConfig;
pub use coordinator::JobCoordinator;
pub use error::{WorkerError, WorkerResult};
pub use layout::JobLayout;
pub use logging::JobLogger;
pub use reaper::{JobReaper, ReapReport};
pub use recombine::Recombiner;
pub use registry::{ChunkUpdate, ProgressRegistry, RegistryError};
pub use stream::{progress_stream, StreamOptions};
