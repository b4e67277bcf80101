//! eSpeak/eSpeak-NG provider.
//!
//! Uses the `espeak-ng` or `espeak` command, common on Linux and also
//! available on macOS and Windows. With no text argument both binaries read
//! the text from stdin.

use tokio::process::Command;

use super::{BASELINE_WPM, Speaker, StopToken, drive_child};
use crate::error::SpeakerError;
use crate::types::SpeechTask;

/// eSpeak/eSpeak-NG synthesizer.
///
/// The voice is selected with `-v` (e.g. "en", "en-us", "en+f3") and the
/// speed with `-s` in words per minute (the eSpeak default is 175).
#[derive(Debug, Clone)]
pub struct ESpeakProvider {
    /// The binary to use (espeak-ng or espeak).
    binary: String,
}

impl Default for ESpeakProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ESpeakProvider {
    /// Creates a provider, preferring `espeak-ng` over `espeak`.
    pub fn new() -> Self {
        let binary = if which::which("espeak-ng").is_ok() {
            "espeak-ng".to_string()
        } else {
            "espeak".to_string()
        };
        Self { binary }
    }

    /// Creates a provider with a specific binary name.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Returns a provider only when an eSpeak binary is actually installed.
    pub(crate) fn detect() -> Option<Self> {
        for candidate in ["espeak-ng", "espeak"] {
            if which::which(candidate).is_ok() {
                return Some(Self {
                    binary: candidate.to_string(),
                });
            }
        }
        None
    }

    /// The binary this provider invokes.
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Converts the rate multiplier to words per minute for `-s`.
    ///
    /// Returns `None` at the default rate so eSpeak keeps its own default.
    fn resolve_rate(rate: f32) -> Option<u32> {
        if (rate - 1.0).abs() < f32::EPSILON {
            None
        } else {
            Some((BASELINE_WPM * rate).round() as u32)
        }
    }
}

impl Speaker for ESpeakProvider {
    async fn speak(&self, task: &SpeechTask, stop: StopToken) -> Result<(), SpeakerError> {
        let mut cmd = Command::new(&self.binary);

        if let Some(voice) = &task.voice {
            cmd.arg("-v").arg(voice);
        }
        if let Some(wpm) = Self::resolve_rate(task.rate) {
            cmd.arg("-s").arg(wpm.to_string());
        }

        drive_child(cmd, &self.binary, Some(&task.text), stop).await
    }
}
