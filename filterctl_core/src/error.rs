use thiserror::Error;

/// Fatal controller-level failures surfaced out of `runner::run`. Everything
/// recoverable (malformed input, motion-sink failures, transport hiccups) is
/// logged and absorbed where it happens.
#[derive(Debug, Error, Clone)]
pub enum ControllerError {
    #[error("could not start the subscriber task: {0}")]
    SpawnFailed(String),
    #[error("subscriber task panicked")]
    SubscriberPanicked,
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
