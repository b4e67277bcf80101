//! Error types for the tts library.

use thiserror::Error;

/// A speaking rate that is not a positive, finite number.
///
/// Rejected by [`SpeechTask::new`](crate::types::SpeechTask::new) before a
/// task is ever created, so the queue never observes one.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("invalid speaking rate {rate}; rate must be a positive number")]
pub struct InvalidRate {
    /// The rate that was rejected.
    pub rate: f32,
}

/// Errors building a [`SpeechTask`](crate::types::SpeechTask).
///
/// Both conditions are rejected before a task exists, so the queue only
/// ever holds speakable work.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TaskError {
    /// The speaking rate was not a positive finite number.
    #[error(transparent)]
    Rate(#[from] InvalidRate),

    /// The text was empty or whitespace-only.
    #[error("no text provided to speak")]
    EmptyText,
}

/// Errors produced while synthesizing speech.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SpeakerError {
    /// The synthesizer binary could not be spawned.
    #[error("failed to spawn `{binary}`")]
    SpawnFailed {
        /// The binary that was invoked.
        binary: String,
        /// The underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The child process exposed no stdin pipe.
    #[error("no stdin pipe for `{binary}`")]
    StdinPipe {
        /// The binary that was invoked.
        binary: String,
    },

    /// Writing the text to the synthesizer failed.
    #[error("failed to write text to `{binary}`")]
    StdinWrite {
        /// The binary that was invoked.
        binary: String,
        /// The underlying write error.
        #[source]
        source: std::io::Error,
    },

    /// The synthesizer exited with a failure status.
    #[error("`{binary}` failed: {stderr}")]
    ProcessFailed {
        /// The binary that was invoked.
        binary: String,
        /// Whatever the process wrote to stderr.
        stderr: String,
    },

    /// The utterance was stopped before it finished.
    #[error("utterance interrupted")]
    Interrupted,

    /// No speech synthesizer was found on this host.
    #[error("no speech synthesizer found (looked for say, espeak-ng, espeak, powershell)")]
    NoProvider,

    /// Other I/O failure while driving the synthesizer.
    #[error("synthesizer I/O error")]
    Io(#[from] std::io::Error),
}

/// Errors resolving a URL into readable text.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The URL could not be parsed, or uses a non-HTTP scheme.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The HTTP request failed (network, DNS, timeout).
    #[error("failed to fetch the page")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("page returned HTTP {0}")]
    Status(u16),

    /// The page contained no heading or paragraph text.
    #[error("no readable content found on the page")]
    NoReadableContent,
}
