//! Speech synthesizer providers.
//!
//! The [`Speaker`] trait is the seam between the queue and the OS voice
//! synthesizer. Each provider wraps a host CLI tool:
//!
//! - [`SayProvider`] - macOS `say`
//! - [`ESpeakProvider`] - `espeak-ng` / `espeak`
//! - [`SapiProvider`] - Windows SAPI via PowerShell
//! - [`NullSpeaker`] - instant success, no audio (control paths and tests)
//!
//! [`SystemSpeaker::detect`] picks the native provider for the host.
//!
//! ## Stopping an utterance
//!
//! Every call to [`Speaker::speak`] receives a [`StopToken`] linked to a
//! [`StopHandle`] held by the queue. Firing the handle kills the in-flight
//! synthesizer process immediately; the oneshot pair guarantees the signal
//! is delivered at most once and never lost, even if it fires before the
//! provider starts waiting on it.

mod espeak;
mod sapi;
mod say;

pub use espeak::ESpeakProvider;
pub use sapi::SapiProvider;
pub use say::SayProvider;

use std::future::Future;
use std::process::Stdio;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::SpeakerError;
use crate::types::SpeechTask;

/// Baseline words per minute at rate 1.0 (the `say`/`espeak` default).
pub(crate) const BASELINE_WPM: f32 = 175.0;

/// Executor trait for speech synthesizers.
///
/// Uses native async functions in traits; implementations must be
/// `Send + Sync` because the queue invokes them from a spawned task.
///
/// ## Implementation contract
///
/// `speak` resolves exactly once per task, with `Ok(())` after playback
/// finishes or an error if synthesis failed. If `stop` fires mid-utterance
/// the provider must halt playback promptly and may resolve with
/// [`SpeakerError::Interrupted`].
pub trait Speaker: Send + Sync + 'static {
    /// Synthesize and play `task`, returning once playback finishes.
    fn speak(
        &self,
        task: &SpeechTask,
        stop: StopToken,
    ) -> impl Future<Output = Result<(), SpeakerError>> + Send;
}

/// Creates a linked stop handle/token pair for one utterance.
pub fn stop_channel() -> (StopHandle, StopToken) {
    let (tx, rx) = oneshot::channel();
    (StopHandle { tx }, StopToken { rx })
}

/// Queue-side control that can halt its utterance.
///
/// Consuming, so the signal can fire at most once.
#[derive(Debug)]
pub struct StopHandle {
    tx: oneshot::Sender<()>,
}

impl StopHandle {
    /// Halts the in-flight utterance.
    pub fn stop(self) {
        let _ = self.tx.send(());
    }
}

/// Speaker-side signal that resolves when the utterance must halt.
#[derive(Debug)]
pub struct StopToken {
    rx: oneshot::Receiver<()>,
}

impl StopToken {
    /// Resolves when a stop was requested.
    ///
    /// Pends forever if the handle is dropped without firing, so a normal
    /// completion racing against handle teardown is never mistaken for a
    /// stop.
    pub async fn stopped(self) {
        if self.rx.await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Speaker that completes instantly without producing audio.
///
/// Used by the one-shot control commands (pause/resume/cancel/status act on
/// a fresh queue that never speaks) and as a harmless stand-in in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSpeaker;

impl Speaker for NullSpeaker {
    async fn speak(&self, _task: &SpeechTask, _stop: StopToken) -> Result<(), SpeakerError> {
        Ok(())
    }
}

/// The host synthesizer selected for this machine.
#[derive(Debug, Clone)]
pub enum SystemSpeaker {
    /// macOS `say`.
    Say(SayProvider),
    /// eSpeak-NG or eSpeak.
    ESpeak(ESpeakProvider),
    /// Windows SAPI via PowerShell.
    Sapi(SapiProvider),
}

impl SystemSpeaker {
    /// Picks the native synthesizer for the host OS.
    ///
    /// Prefers the platform tool (`say` on macOS, PowerShell SAPI on
    /// Windows) and falls back to eSpeak anywhere it is installed.
    ///
    /// ## Errors
    ///
    /// Returns [`SpeakerError::NoProvider`] when no synthesizer binary is
    /// found on the `PATH`.
    pub fn detect() -> Result<Self, SpeakerError> {
        if cfg!(target_os = "macos") && which::which("say").is_ok() {
            debug!("selected macOS say");
            return Ok(Self::Say(SayProvider));
        }
        if cfg!(target_os = "windows") && which::which("powershell").is_ok() {
            debug!("selected Windows SAPI");
            return Ok(Self::Sapi(SapiProvider::new()));
        }
        if let Some(espeak) = ESpeakProvider::detect() {
            debug!(binary = espeak.binary(), "selected eSpeak");
            return Ok(Self::ESpeak(espeak));
        }
        Err(SpeakerError::NoProvider)
    }

    /// Short human description of the selected provider.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Say(_) => "macOS say",
            Self::ESpeak(_) => "eSpeak",
            Self::Sapi(_) => "Windows SAPI",
        }
    }
}

impl Speaker for SystemSpeaker {
    async fn speak(&self, task: &SpeechTask, stop: StopToken) -> Result<(), SpeakerError> {
        match self {
            Self::Say(provider) => provider.speak(task, stop).await,
            Self::ESpeak(provider) => provider.speak(task, stop).await,
            Self::Sapi(provider) => provider.speak(task, stop).await,
        }
    }
}

/// Runs a spawned synthesizer to completion, killing it if `stop` fires.
///
/// When `text` is `Some` it is piped to the child's stdin (and stdin is
/// dropped afterwards to deliver EOF). The child's stderr is collected and
/// surfaced on failure exits.
pub(crate) async fn drive_child(
    mut cmd: Command,
    binary: &str,
    text: Option<&str>,
    stop: StopToken,
) -> Result<(), SpeakerError> {
    cmd.stdin(if text.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| SpeakerError::SpawnFailed {
        binary: binary.to_string(),
        source: e,
    })?;

    if let Some(text) = text {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SpeakerError::StdinPipe {
                binary: binary.to_string(),
            })?;
        stdin
            .write_all(text.as_bytes())
            .await
            .map_err(|e| SpeakerError::StdinWrite {
                binary: binary.to_string(),
                source: e,
            })?;
        // Drop stdin to send EOF
        drop(stdin);
    }

    let status = tokio::select! {
        status = child.wait() => status?,
        () = stop.stopped() => {
            debug!(binary, "stopping in-flight utterance");
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(SpeakerError::Interrupted);
        }
    };

    if status.success() {
        Ok(())
    } else {
        let mut stderr = String::new();
        if let Some(mut pipe) = child.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr).await;
        }
        Err(SpeakerError::ProcessFailed {
            binary: binary.to_string(),
            stderr: stderr.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockSpeaker {
        should_fail: bool,
    }

    impl Speaker for MockSpeaker {
        async fn speak(&self, _task: &SpeechTask, _stop: StopToken) -> Result<(), SpeakerError> {
            if self.should_fail {
                Err(SpeakerError::ProcessFailed {
                    binary: "mock".into(),
                    stderr: "intentional failure".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn task(text: &str) -> SpeechTask {
        SpeechTask::new(text, 1.0).unwrap()
    }

    #[tokio::test]
    async fn mock_speaker_success() {
        let speaker = MockSpeaker { should_fail: false };
        let (_handle, token) = stop_channel();
        assert!(speaker.speak(&task("test"), token).await.is_ok());
    }

    #[tokio::test]
    async fn mock_speaker_failure() {
        let speaker = MockSpeaker { should_fail: true };
        let (_handle, token) = stop_channel();
        assert!(speaker.speak(&task("test"), token).await.is_err());
    }

    #[tokio::test]
    async fn null_speaker_completes_instantly() {
        let (_handle, token) = stop_channel();
        assert!(NullSpeaker.speak(&task("silence"), token).await.is_ok());
    }

    #[tokio::test]
    async fn stop_token_resolves_when_handle_fires() {
        let (handle, token) = stop_channel();
        handle.stop();
        // Resolves immediately even though stop fired before we awaited.
        tokio::time::timeout(std::time::Duration::from_secs(1), token.stopped())
            .await
            .expect("stop signal should be latched");
    }

    #[tokio::test]
    async fn stop_token_pends_when_handle_dropped() {
        let (handle, token) = stop_channel();
        drop(handle);
        let result =
            tokio::time::timeout(std::time::Duration::from_millis(50), token.stopped()).await;
        assert!(result.is_err(), "dropped handle must not look like a stop");
    }

    #[tokio::test]
    async fn drive_child_reports_spawn_failure() {
        let cmd = Command::new("definitely-not-a-real-synthesizer");
        let (_handle, token) = stop_channel();
        let result = drive_child(cmd, "definitely-not-a-real-synthesizer", None, token).await;
        assert!(matches!(result, Err(SpeakerError::SpawnFailed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn drive_child_succeeds_on_clean_exit() {
        let cmd = Command::new("true");
        let (_handle, token) = stop_channel();
        assert!(drive_child(cmd, "true", None, token).await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn drive_child_reports_failure_exit() {
        let cmd = Command::new("false");
        let (_handle, token) = stop_channel();
        let result = drive_child(cmd, "false", None, token).await;
        assert!(matches!(result, Err(SpeakerError::ProcessFailed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn drive_child_consumes_stdin_text() {
        // `cat` drains stdin and exits 0 once it sees EOF.
        let cmd = Command::new("cat");
        let (_handle, token) = stop_channel();
        assert!(drive_child(cmd, "cat", Some("hello"), token).await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn drive_child_kills_on_stop() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let (handle, token) = stop_channel();

        let driver = tokio::spawn(drive_child(cmd, "sleep", None, token));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        handle.stop();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), driver)
            .await
            .expect("kill should be prompt")
            .expect("driver task should not panic");
        assert!(matches!(result, Err(SpeakerError::Interrupted)));
    }
}
