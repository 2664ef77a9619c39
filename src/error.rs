//! Error taxonomy for one item's processing outcome.
//!
//! These are kinds, not exceptions: the pool reads the variant to decide
//! whether to count the item as failed, skipped, or eligible for the
//! GPU-to-CPU fallback path. `CodecUnsupported` in particular is not a
//! user-visible failure on a GPU lane; see `pool::Pool::run_to_completion`.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("source file not found: {0}")]
    MissingSource(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ffmpeg exited with an error: {0}")]
    FfmpegError(String),

    #[error("ffmpeg produced no frames")]
    NoFrames,

    #[error("codec not supported on this accel lane: {0}")]
    CodecUnsupported(String),

    #[error("worker task panicked: {0}")]
    WorkerCrash(String),
}

impl ProcessError {
    /// True for outcomes that are not counted as failures.
    pub fn is_skip(&self) -> bool {
        matches!(self, ProcessError::MissingSource(_))
    }
}
