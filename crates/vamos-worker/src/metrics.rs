//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; the API binary installs the
//! Prometheus recorder that exposes them.

use metrics::{counter, histogram};

pub mod names {
    pub const JOBS_STARTED_TOTAL: &str = "vamos_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vamos_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vamos_jobs_failed_total";
    pub const JOB_DURATION_SECONDS: &str = "vamos_job_duration_seconds";
    pub const CHUNK_DURATION_SECONDS: &str = "vamos_chunk_duration_seconds";
    pub const FRAMES_PROCESSED_TOTAL: &str = "vamos_frames_processed_total";
    pub const REGIONS_REDACTED_TOTAL: &str = "vamos_regions_redacted_total";
    pub const DETECTOR_FAILURES_TOTAL: &str = "vamos_detector_failures_total";
    pub const JOBS_EVICTED_TOTAL: &str = "vamos_jobs_evicted_total";
}

pub fn record_job_started() {
    counter!(names::JOBS_STARTED_TOTAL).increment(1);
}

pub fn record_job_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "status" => "done").record(duration_secs);
}

pub fn record_job_failed(kind: &'static str, duration_secs: f64) {
    counter!(names::JOBS_FAILED_TOTAL, "kind" => kind).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "status" => "error").record(duration_secs);
}

pub fn record_chunk_processed(frames: usize, regions: usize, duration_secs: f64) {
    counter!(names::FRAMES_PROCESSED_TOTAL).increment(frames as u64);
    counter!(names::REGIONS_REDACTED_TOTAL).increment(regions as u64);
    histogram!(names::CHUNK_DURATION_SECONDS).record(duration_secs);
}

pub fn record_detector_failure(detector: &'static str) {
    counter!(names::DETECTOR_FAILURES_TOTAL, "detector" => detector).increment(1);
}

pub fn record_jobs_evicted(count: usize) {
    counter!(names::JOBS_EVICTED_TOTAL).increment(count as u64);
}
