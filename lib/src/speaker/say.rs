//! macOS `say` provider.
//!
//! Uses the built-in `say` command available on all macOS systems. The
//! voice is selected with `-v` and the speed with `-r` in words per minute;
//! `say` has no volume flag.

use tokio::process::Command;

use super::{BASELINE_WPM, Speaker, StopToken, drive_child};
use crate::error::SpeakerError;
use crate::types::SpeechTask;

/// macOS built-in synthesizer.
///
/// ## Examples
///
/// ```ignore
/// use tts_lib::{SayProvider, Speaker, SpeechTask, stop_channel};
///
/// let (_handle, token) = stop_channel();
/// let task = SpeechTask::new("Hello, world!", 1.0)?;
/// SayProvider.speak(&task, token).await?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SayProvider;

impl SayProvider {
    const BINARY: &'static str = "say";

    /// Converts the rate multiplier to words per minute for `-r`.
    ///
    /// Returns `None` at the default rate so `say` keeps its own default.
    fn resolve_rate(rate: f32) -> Option<u32> {
        if (rate - 1.0).abs() < f32::EPSILON {
            None
        } else {
            Some((BASELINE_WPM * rate).round() as u32)
        }
    }
}

impl Speaker for SayProvider {
    async fn speak(&self, task: &SpeechTask, stop: StopToken) -> Result<(), SpeakerError> {
        let mut cmd = Command::new(Self::BINARY);

        if let Some(voice) = &task.voice {
            cmd.arg("-v").arg(voice);
        }
        if let Some(wpm) = Self::resolve_rate(task.rate) {
            cmd.arg("-r").arg(wpm.to_string());
        }

        // Text goes over stdin so shell quoting never matters.
        drive_child(cmd, Self::BINARY, Some(&task.text), stop).await
    }
}
