//! Sequential text-to-speech queue.
//!
//! This crate turns text, or the readable parts of a web page, into speech
//! through the host system's synthesizer. All speech flows through a single
//! FIFO queue so utterances never overlap, and the queue can be paused,
//! resumed, or cancelled while it drains.
//!
//! ## Architecture
//!
//! - [`SpeechQueue`] - handle to the worker task that owns the queue
//! - [`Speaker`] - trait over the host synthesizers ([`SayProvider`],
//!   [`ESpeakProvider`], [`SapiProvider`]), with [`SystemSpeaker::detect`]
//!   picking the right one for the current machine
//! - [`PageSource`] - fetches a URL and extracts its readable text
//!
//! ## Examples
//!
//! ```no_run
//! use tokio::sync::mpsc;
//! use tts_lib::{SpeechQueue, SpeechTask, SystemSpeaker};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let speaker = SystemSpeaker::detect()?;
//! let (event_tx, _events) = mpsc::unbounded_channel();
//! let queue = SpeechQueue::spawn(speaker, event_tx);
//!
//! queue.enqueue(SpeechTask::new("Hello, world!", 1.0)?);
//! queue.wait_idle().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod queue;
pub mod source;
pub mod speaker;
pub mod types;

pub use error::{InvalidRate, SourceError, SpeakerError, TaskError};
pub use queue::{CancelOutcome, PauseOutcome, QueueEvent, ResumeOutcome, SpeechQueue};
pub use source::PageSource;
pub use speaker::{
    ESpeakProvider, NullSpeaker, SapiProvider, SayProvider, Speaker, StopHandle, StopToken,
    SystemSpeaker, stop_channel,
};
pub use types::{DEFAULT_RATE, PlaybackState, QueueStatus, SpeechTask, validate_rate};
