//! Windows SAPI (Speech API) provider.
//!
//! Wraps the Windows Speech API through PowerShell's `System.Speech`
//! assembly. Only works on Windows; detection never selects it elsewhere.

use tokio::process::Command;

use super::{Speaker, StopToken, drive_child};
use crate::error::SpeakerError;
use crate::types::SpeechTask;

/// Windows SAPI synthesizer via PowerShell.
///
/// The text is piped to PowerShell's stdin and read with
/// `[Console]::In.ReadToEnd()` so no escaping of the spoken text is needed;
/// only the voice name is embedded in the script.
#[derive(Debug, Clone, Default)]
pub struct SapiProvider;

impl SapiProvider {
    const BINARY: &'static str = "powershell";

    /// Voice used when the task does not request one.
    pub const DEFAULT_VOICE: &'static str = "Microsoft Zira Desktop";

    /// Creates a new SAPI provider.
    pub fn new() -> Self {
        Self
    }

    /// Maps the rate multiplier onto SAPI's -10..10 scale.
    ///
    /// SAPI rate steps are roughly logarithmic; a full swing of 10 steps
    /// triples the speed, so `round(10 * log3(rate))` lands the multiplier
    /// on the closest step.
    fn resolve_rate(rate: f32) -> i32 {
        (10.0 * rate.ln() / 3.0f32.ln()).round().clamp(-10.0, 10.0) as i32
    }

    /// Builds the PowerShell script for one utterance.
    fn build_script(voice: &str, rate: f32) -> String {
        // Single quotes in a voice name are doubled for PowerShell.
        let voice = voice.replace('\'', "''");
        format!(
            "Add-Type -AssemblyName System.Speech; \
             $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
             try {{ $s.SelectVoice('{voice}') }} catch {{ }}; \
             $s.Rate = {rate}; \
             $s.Speak([Console]::In.ReadToEnd());",
            rate = Self::resolve_rate(rate),
        )
    }
}

impl Speaker for SapiProvider {
    async fn speak(&self, task: &SpeechTask, stop: StopToken) -> Result<(), SpeakerError> {
        let voice = task.voice.as_deref().unwrap_or(Self::DEFAULT_VOICE);
        let script = Self::build_script(voice, task.rate);

        let mut cmd = Command::new(Self::BINARY);
        cmd.args(["-NoProfile", "-NonInteractive", "-Command", &script]);

        drive_child(cmd, Self::BINARY, Some(&task.text), stop).await
    }
}
