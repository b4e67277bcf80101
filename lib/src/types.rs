//! Core value types for the speech queue.

use serde::Serialize;

use crate::error::{InvalidRate, TaskError};

/// Default speaking-rate multiplier (normal speed).
pub const DEFAULT_RATE: f32 = 1.0;

/// Checks a speaking-rate multiplier without building a task.
///
/// Returns the rate unchanged when it is a positive finite number.
pub fn validate_rate(rate: f32) -> Result<f32, InvalidRate> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(InvalidRate { rate });
    }
    Ok(rate)
}

/// One unit of speakable work.
///
/// A task is created when a command resolves text successfully, owned by the
/// queue from enqueue until it is dequeued for playback or discarded by a
/// cancel, and dropped once the utterance completes.
///
/// ## Examples
///
/// ```
/// use tts_lib::SpeechTask;
///
/// let task = SpeechTask::new("Hello, world!", 1.25)
///     .unwrap()
///     .with_voice("Samantha");
/// assert_eq!(task.rate, 1.25);
///
/// assert!(SpeechTask::new("too fast", 0.0).is_err());
/// assert!(SpeechTask::new("   ", 1.0).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechTask {
    /// The text to speak; never empty or whitespace-only.
    pub text: String,
    /// Speaking-rate multiplier; always positive and finite.
    pub rate: f32,
    /// Synthesizer voice to use, `None` for the provider default.
    pub voice: Option<String>,
}

impl SpeechTask {
    /// Creates a task.
    ///
    /// Rejects rates that are not positive finite numbers, and text that is
    /// empty or whitespace-only; a task always has something to say.
    pub fn new(text: impl Into<String>, rate: f32) -> Result<Self, TaskError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(TaskError::EmptyText);
        }
        Ok(Self {
            text,
            rate: validate_rate(rate)?,
            voice: None,
        })
    }

    /// Requests a specific synthesizer voice.
    #[must_use]
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }
}

/// What the queue is currently doing.
///
/// `Paused` is reported over `Speaking`: a pause issued mid-utterance shows
/// as paused even though the current utterance is still finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Processing is suspended; queued tasks stay put.
    Paused,
    /// An utterance is in flight.
    Speaking,
    /// Nothing is playing and the queue is not paused.
    Idle,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PlaybackState::Paused => "paused",
            PlaybackState::Speaking => "speaking",
            PlaybackState::Idle => "idle",
        };
        f.write_str(label)
    }
}

/// Snapshot returned by [`SpeechQueue::status`](crate::queue::SpeechQueue::status).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    /// Current playback state.
    pub state: PlaybackState,
    /// Number of tasks still waiting in the queue.
    pub pending: usize,
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} pending)", self.state, self.pending)
    }
}
