//! Error types for the AWS collaborators.

use thiserror::Error;

/// Errors from the asynchronous document analysis workflow.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("failed to start analysis for s3://{bucket}/{key}: {message}")]
    Start {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("analysis job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("analysis job {job_id} did not finish within {waited_secs}s")]
    Timeout { job_id: String, waited_secs: u64 },

    #[error("analysis service error: {0}")]
    Service(String),
}

/// Errors from bucket synchronization.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("failed to read local file {path}: {source}")]
    LocalRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("storage service error: {0}")]
    Service(String),
}
