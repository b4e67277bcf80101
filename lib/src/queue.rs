//! The sequential speech queue.
//!
//! All speech requests are serialized through a single-consumer pipeline:
//! at most one utterance plays at a time, in FIFO submission order, with the
//! ability to pause between utterances (never mid-utterance), resume, or
//! cancel everything including the in-flight utterance.
//!
//! The queue is a single-owner worker task. A cloneable [`SpeechQueue`]
//! handle sends commands over a channel and the worker owns every piece of
//! mutable state, so no lock discipline is needed and the drain is an
//! explicit work loop rather than recursion. Speaker completions come back
//! as messages tagged with a cancellation epoch, which gives each utterance
//! an exactly-once completion and lets a cancel discard the report of the
//! utterance it just killed.
//!
//! ## Examples
//!
//! ```no_run
//! use tokio::sync::mpsc;
//! use tts_lib::{NullSpeaker, QueueEvent, SpeechQueue, SpeechTask};
//!
//! # async fn example() {
//! let (event_tx, mut events) = mpsc::unbounded_channel();
//! let queue = SpeechQueue::spawn(NullSpeaker, event_tx);
//!
//! queue.enqueue(SpeechTask::new("Hello, world!", 1.0).unwrap());
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         QueueEvent::Drained => break,
//!         event => println!("{event:?}"),
//!     }
//! }
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::SpeakerError;
use crate::speaker::{Speaker, StopHandle, stop_channel};
use crate::types::{PlaybackState, QueueStatus, SpeechTask};

/// Progress event emitted by the queue worker.
///
/// Events are sent through the channel provided to [`SpeechQueue::spawn`]
/// to notify listeners of utterance lifecycle transitions.
#[derive(Debug)]
pub enum QueueEvent {
    /// The speaker began an utterance.
    UtteranceStarted {
        /// The text being spoken.
        text: String,
    },
    /// The current utterance finished successfully.
    UtteranceFinished,
    /// The current utterance failed. Draining halts; the remaining tasks
    /// stay pending until a new enqueue, a resume, or a cancel.
    UtteranceFailed {
        /// The synthesizer error.
        error: SpeakerError,
    },
    /// The queue ran out of work while unpaused.
    Drained,
}

/// Outcome of a pause request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOutcome {
    /// Draining stops once the current utterance completes.
    Paused,
    /// The queue was already paused; nothing changed.
    AlreadyPaused,
    /// Nothing is being spoken; the request was a no-op.
    NotSpeaking,
}

/// Outcome of a resume request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// Draining continues.
    Resumed,
    /// The queue was not paused; the request was a no-op.
    NotPaused,
}

/// Outcome of a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelOutcome {
    /// Number of queued tasks that were discarded.
    pub discarded: usize,
    /// Whether an in-flight utterance was interrupted.
    pub interrupted: bool,
}

enum Command {
    Enqueue(SpeechTask),
    Pause(oneshot::Sender<PauseOutcome>),
    Resume(oneshot::Sender<ResumeOutcome>),
    Cancel(oneshot::Sender<CancelOutcome>),
    Status(oneshot::Sender<QueueStatus>),
    WaitIdle(oneshot::Sender<()>),
}

struct Completion {
    epoch: u64,
    result: Result<(), SpeakerError>,
}

/// Handle to the speech queue worker.
///
/// Cheap to clone; every clone talks to the same worker. The worker keeps
/// running until all handles are dropped and the in-flight utterance (if
/// any) has completed.
#[derive(Debug, Clone)]
pub struct SpeechQueue {
    commands: mpsc::UnboundedSender<Command>,
}

impl SpeechQueue {
    /// Spawns the queue worker around `speaker`.
    ///
    /// Progress is reported on `events`; send failures are ignored, so the
    /// receiver may be dropped by callers that do not care.
    pub fn spawn<S: Speaker>(speaker: S, events: mpsc::UnboundedSender<QueueEvent>) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let worker = Worker {
            speaker: Arc::new(speaker),
            pending: VecDeque::new(),
            speaking: false,
            paused: false,
            epoch: 0,
            stop_handle: None,
            commands: commands_rx,
            completions: completions_rx,
            completions_tx,
            events,
            idle_waiters: Vec::new(),
        };
        tokio::spawn(worker.run());

        Self {
            commands: commands_tx,
        }
    }

    /// Appends a task to the queue.
    ///
    /// Fire-and-forget: never blocks, and if the queue is idle and not
    /// paused the utterance starts immediately. Synthesis itself happens
    /// asynchronously; listen on the event channel for progress.
    pub fn enqueue(&self, task: SpeechTask) {
        let _ = self.commands.send(Command::Enqueue(task));
    }

    /// Stops draining once the current utterance completes.
    ///
    /// Never interrupts the utterance already in flight. A no-op (reported
    /// as such) when nothing is being spoken.
    pub async fn pause(&self) -> PauseOutcome {
        self.request(Command::Pause)
            .await
            .unwrap_or(PauseOutcome::NotSpeaking)
    }

    /// Continues draining a paused queue.
    ///
    /// Also restarts a drain halted by a failed utterance. A no-op when
    /// neither applies.
    pub async fn resume(&self) -> ResumeOutcome {
        self.request(Command::Resume)
            .await
            .unwrap_or(ResumeOutcome::NotPaused)
    }

    /// Discards all queued tasks and stops any in-flight utterance.
    ///
    /// The only operation that can interrupt audio already playing. Safe to
    /// call in any state.
    pub async fn cancel(&self) -> CancelOutcome {
        self.request(Command::Cancel).await.unwrap_or(CancelOutcome {
            discarded: 0,
            interrupted: false,
        })
    }

    /// Reports the current state and pending count. Pure read.
    pub async fn status(&self) -> QueueStatus {
        self.request(Command::Status).await.unwrap_or(QueueStatus {
            state: PlaybackState::Idle,
            pending: 0,
        })
    }

    /// Resolves the next time the worker has no utterance in flight.
    pub async fn wait_idle(&self) {
        let _ = self.request(Command::WaitIdle).await;
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(make(tx)).is_err() {
            return None;
        }
        rx.await.ok()
    }
}

/// Owns all queue state; runs as a single spawned task.
struct Worker<S: Speaker> {
    speaker: Arc<S>,
    pending: VecDeque<SpeechTask>,
    speaking: bool,
    paused: bool,
    /// Bumped on cancel so completions from killed utterances are ignored.
    epoch: u64,
    /// Stop control for the in-flight utterance, if any.
    stop_handle: Option<StopHandle>,
    commands: mpsc::UnboundedReceiver<Command>,
    completions: mpsc::UnboundedReceiver<Completion>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    events: mpsc::UnboundedSender<QueueEvent>,
    idle_waiters: Vec<oneshot::Sender<()>>,
}

impl<S: Speaker> Worker<S> {
    async fn run(mut self) {
        let mut closed = false;
        loop {
            tokio::select! {
                cmd = self.commands.recv(), if !closed => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => closed = true,
                },
                Some(done) = self.completions.recv() => self.handle_completion(done),
            }
            // Once every handle is gone, finish the drain and shut down.
            if closed && !self.speaking {
                break;
            }
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Enqueue(task) => {
                debug!(pending = self.pending.len(), "queueing utterance");
                self.pending.push_back(task);
                if !self.speaking && !self.paused {
                    self.process_next();
                }
            }
            Command::Pause(reply) => {
                let outcome = if self.paused {
                    PauseOutcome::AlreadyPaused
                } else if self.speaking {
                    self.paused = true;
                    PauseOutcome::Paused
                } else {
                    PauseOutcome::NotSpeaking
                };
                let _ = reply.send(outcome);
            }
            Command::Resume(reply) => {
                let outcome = if self.paused {
                    self.paused = false;
                    self.process_next();
                    ResumeOutcome::Resumed
                } else if !self.speaking && !self.pending.is_empty() {
                    // Drain halted by a failed utterance; pick it back up.
                    self.process_next();
                    ResumeOutcome::Resumed
                } else {
                    ResumeOutcome::NotPaused
                };
                let _ = reply.send(outcome);
            }
            Command::Cancel(reply) => {
                let interrupted = self.speaking;
                self.epoch += 1;
                if let Some(handle) = self.stop_handle.take() {
                    handle.stop();
                }
                let discarded = self.pending.len();
                self.pending.clear();
                self.speaking = false;
                self.paused = false;
                debug!(discarded, interrupted, "queue cancelled");
                self.notify_idle();
                let _ = reply.send(CancelOutcome {
                    discarded,
                    interrupted,
                });
            }
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
            Command::WaitIdle(reply) => {
                if self.speaking {
                    self.idle_waiters.push(reply);
                } else {
                    let _ = reply.send(());
                }
            }
        }
    }

    /// Advances the drain.
    ///
    /// Idempotent: does nothing while an utterance is in flight, and parks
    /// the queue when paused or empty. Otherwise pops the FIFO head and
    /// spawns the speaker invocation; its result comes back through the
    /// completions channel.
    fn process_next(&mut self) {
        if self.speaking {
            return;
        }
        if self.paused || self.pending.is_empty() {
            let drained = self.pending.is_empty() && !self.paused;
            self.notify_idle();
            if drained {
                let _ = self.events.send(QueueEvent::Drained);
            }
            return;
        }

        let Some(task) = self.pending.pop_front() else {
            return;
        };
        self.speaking = true;
        let (handle, token) = stop_channel();
        self.stop_handle = Some(handle);
        debug!(rate = task.rate, remaining = self.pending.len(), "starting utterance");
        let _ = self.events.send(QueueEvent::UtteranceStarted {
            text: task.text.clone(),
        });

        let speaker = Arc::clone(&self.speaker);
        let completions = self.completions_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = speaker.speak(&task, token).await;
            let _ = completions.send(Completion { epoch, result });
        });
    }

    fn handle_completion(&mut self, done: Completion) {
        if done.epoch != self.epoch {
            // The utterance a cancel just killed, reporting in late.
            debug!("dropping completion from cancelled utterance");
            return;
        }
        self.speaking = false;
        self.stop_handle = None;

        match done.result {
            Ok(()) => {
                let _ = self.events.send(QueueEvent::UtteranceFinished);
                self.process_next();
            }
            Err(error) => {
                warn!(error = %error, pending = self.pending.len(), "utterance failed; drain halted");
                let _ = self.events.send(QueueEvent::UtteranceFailed { error });
                self.notify_idle();
            }
        }
    }

    fn notify_idle(&mut self) {
        for waiter in self.idle_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    fn status(&self) -> QueueStatus {
        let state = if self.paused {
            PlaybackState::Paused
        } else if self.speaking {
            PlaybackState::Speaking
        } else {
            PlaybackState::Idle
        };
        QueueStatus {
            state,
            pending: self.pending.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::speaker::{NullSpeaker, StopToken};

    /// Speaker the test drives by hand: records each spoken text, then waits
    /// for the test to release a scripted result (or for its stop token).
    struct ControlledSpeaker {
        calls: Arc<Mutex<Vec<String>>>,
        releases: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<(), SpeakerError>>>,
    }

    impl Speaker for ControlledSpeaker {
        async fn speak(&self, task: &SpeechTask, stop: StopToken) -> Result<(), SpeakerError> {
            self.calls.lock().unwrap().push(task.text.clone());
            let mut releases = self.releases.lock().await;
            tokio::select! {
                msg = releases.recv() => msg.unwrap_or(Ok(())),
                () = stop.stopped() => Err(SpeakerError::Interrupted),
            }
        }
    }

    struct Harness {
        queue: SpeechQueue,
        events: mpsc::UnboundedReceiver<QueueEvent>,
        calls: Arc<Mutex<Vec<String>>>,
        release: mpsc::UnboundedSender<Result<(), SpeakerError>>,
    }

    impl Harness {
        fn new() -> Self {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let (release, release_rx) = mpsc::unbounded_channel();
            let speaker = ControlledSpeaker {
                calls: Arc::clone(&calls),
                releases: tokio::sync::Mutex::new(release_rx),
            };
            let (event_tx, events) = mpsc::unbounded_channel();
            let queue = SpeechQueue::spawn(speaker, event_tx);
            Self {
                queue,
                events,
                calls,
                release,
            }
        }

        fn enqueue(&self, text: &str) {
            self.queue.enqueue(SpeechTask::new(text, 1.0).unwrap());
        }

        async fn next_event(&mut self) -> QueueEvent {
            timeout(Duration::from_secs(5), self.events.recv())
                .await
                .expect("timed out waiting for a queue event")
                .expect("event channel closed")
        }

        async fn expect_started(&mut self, text: &str) {
            match self.next_event().await {
                QueueEvent::UtteranceStarted { text: started } => assert_eq!(started, text),
                other => panic!("expected UtteranceStarted, got {other:?}"),
            }
        }

        async fn expect_finished(&mut self) {
            match self.next_event().await {
                QueueEvent::UtteranceFinished => {}
                other => panic!("expected UtteranceFinished, got {other:?}"),
            }
        }

        async fn expect_drained(&mut self) {
            match self.next_event().await {
                QueueEvent::Drained => {}
                other => panic!("expected Drained, got {other:?}"),
            }
        }

        async fn expect_no_event(&mut self) {
            let result = timeout(Duration::from_millis(100), self.events.recv()).await;
            assert!(result.is_err(), "expected no event, got {result:?}");
        }

        fn release_success(&self) {
            self.release.send(Ok(())).unwrap();
        }

        fn release_failure(&self) {
            self.release
                .send(Err(SpeakerError::ProcessFailed {
                    binary: "mock".into(),
                    stderr: "scripted failure".into(),
                }))
                .unwrap();
        }

        fn spoken(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn fresh_queue_reports_idle() {
        let (event_tx, _events) = mpsc::unbounded_channel();
        let queue = SpeechQueue::spawn(NullSpeaker, event_tx);

        let status = queue.status().await;
        assert_eq!(status.state, PlaybackState::Idle);
        assert_eq!(status.pending, 0);
    }

    #[tokio::test]
    async fn speaks_tasks_in_fifo_order() {
        let mut h = Harness::new();
        h.enqueue("first");
        h.enqueue("second");
        h.enqueue("third");

        h.expect_started("first").await;
        h.release_success();
        h.expect_finished().await;

        h.expect_started("second").await;
        h.release_success();
        h.expect_finished().await;

        h.expect_started("third").await;
        h.release_success();
        h.expect_finished().await;
        h.expect_drained().await;

        assert_eq!(h.spoken(), vec!["first", "second", "third"]);
        let status = h.queue.status().await;
        assert_eq!(status.state, PlaybackState::Idle);
        assert_eq!(status.pending, 0);
    }

    #[tokio::test]
    async fn pause_defers_until_utterance_completes() {
        let mut h = Harness::new();
        h.enqueue("current");
        h.enqueue("held back");

        h.expect_started("current").await;
        assert_eq!(h.queue.pause().await, PauseOutcome::Paused);

        // The in-flight utterance still runs to completion.
        h.release_success();
        h.expect_finished().await;

        let status = h.queue.status().await;
        assert_eq!(status.state, PlaybackState::Paused);
        assert_eq!(status.pending, 1);
        assert_eq!(h.spoken(), vec!["current"]);
        h.expect_no_event().await;
    }

    #[tokio::test]
    async fn pause_twice_reports_already_paused() {
        let mut h = Harness::new();
        h.enqueue("one");
        h.expect_started("one").await;

        assert_eq!(h.queue.pause().await, PauseOutcome::Paused);
        assert_eq!(h.queue.pause().await, PauseOutcome::AlreadyPaused);

        let status = h.queue.status().await;
        assert_eq!(status.state, PlaybackState::Paused);
    }

    #[tokio::test]
    async fn pause_while_idle_is_a_noop() {
        let (event_tx, _events) = mpsc::unbounded_channel();
        let queue = SpeechQueue::spawn(NullSpeaker, event_tx);

        assert_eq!(queue.pause().await, PauseOutcome::NotSpeaking);
        assert_eq!(queue.status().await.state, PlaybackState::Idle);
    }

    #[tokio::test]
    async fn resume_when_not_paused_is_a_noop() {
        let (event_tx, _events) = mpsc::unbounded_channel();
        let queue = SpeechQueue::spawn(NullSpeaker, event_tx);

        assert_eq!(queue.resume().await, ResumeOutcome::NotPaused);
        let status = queue.status().await;
        assert_eq!(status.state, PlaybackState::Idle);
        assert_eq!(status.pending, 0);
    }

    #[tokio::test]
    async fn resume_restarts_the_drain() {
        let mut h = Harness::new();
        h.enqueue("before pause");
        h.enqueue("after resume");

        h.expect_started("before pause").await;
        assert_eq!(h.queue.pause().await, PauseOutcome::Paused);
        h.release_success();
        h.expect_finished().await;

        assert_eq!(h.queue.resume().await, ResumeOutcome::Resumed);
        h.expect_started("after resume").await;
        h.release_success();
        h.expect_finished().await;
        h.expect_drained().await;

        assert_eq!(h.queue.status().await.state, PlaybackState::Idle);
    }

    #[tokio::test]
    async fn resume_with_empty_queue_goes_idle() {
        let mut h = Harness::new();
        h.enqueue("only");

        h.expect_started("only").await;
        assert_eq!(h.queue.pause().await, PauseOutcome::Paused);
        h.release_success();
        h.expect_finished().await;

        assert_eq!(h.queue.resume().await, ResumeOutcome::Resumed);
        h.expect_drained().await;
        let status = h.queue.status().await;
        assert_eq!(status.state, PlaybackState::Idle);
        assert_eq!(status.pending, 0);
    }

    #[tokio::test]
    async fn enqueue_while_paused_stores_without_speaking() {
        let mut h = Harness::new();
        h.enqueue("spoken");
        h.expect_started("spoken").await;
        assert_eq!(h.queue.pause().await, PauseOutcome::Paused);
        h.release_success();
        h.expect_finished().await;

        h.enqueue("stored");
        h.expect_no_event().await;

        let status = h.queue.status().await;
        assert_eq!(status.state, PlaybackState::Paused);
        assert_eq!(status.pending, 1);

        assert_eq!(h.queue.resume().await, ResumeOutcome::Resumed);
        h.expect_started("stored").await;
    }

    #[tokio::test]
    async fn cancel_while_speaking_interrupts_and_clears() {
        let mut h = Harness::new();
        h.enqueue("playing");
        h.enqueue("queued one");
        h.enqueue("queued two");

        h.expect_started("playing").await;
        let outcome = h.queue.cancel().await;
        assert!(outcome.interrupted);
        assert_eq!(outcome.discarded, 2);

        let status = h.queue.status().await;
        assert_eq!(status.state, PlaybackState::Idle);
        assert_eq!(status.pending, 0);

        // The killed utterance's completion is discarded, not reported as
        // a failure.
        h.expect_no_event().await;
        assert_eq!(h.spoken(), vec!["playing"]);
    }

    #[tokio::test]
    async fn cancel_on_idle_queue_is_safe() {
        let (event_tx, _events) = mpsc::unbounded_channel();
        let queue = SpeechQueue::spawn(NullSpeaker, event_tx);

        let outcome = queue.cancel().await;
        assert!(!outcome.interrupted);
        assert_eq!(outcome.discarded, 0);
        assert_eq!(queue.status().await.state, PlaybackState::Idle);
    }

    #[tokio::test]
    async fn cancel_while_paused_clears_everything() {
        let mut h = Harness::new();
        h.enqueue("spoken");
        h.enqueue("held");
        h.expect_started("spoken").await;
        assert_eq!(h.queue.pause().await, PauseOutcome::Paused);
        h.release_success();
        h.expect_finished().await;

        let outcome = h.queue.cancel().await;
        assert!(!outcome.interrupted);
        assert_eq!(outcome.discarded, 1);

        let status = h.queue.status().await;
        assert_eq!(status.state, PlaybackState::Idle);
        assert_eq!(status.pending, 0);
    }

    #[tokio::test]
    async fn failure_halts_the_drain() {
        let mut h = Harness::new();
        h.enqueue("will fail");
        h.enqueue("left pending");

        h.expect_started("will fail").await;
        h.release_failure();

        match h.next_event().await {
            QueueEvent::UtteranceFailed { error } => {
                assert!(matches!(error, SpeakerError::ProcessFailed { .. }));
            }
            other => panic!("expected UtteranceFailed, got {other:?}"),
        }

        // The remaining task is preserved but not spoken.
        h.expect_no_event().await;
        let status = h.queue.status().await;
        assert_eq!(status.state, PlaybackState::Idle);
        assert_eq!(status.pending, 1);
        assert_eq!(h.spoken(), vec!["will fail"]);
    }

    #[tokio::test]
    async fn enqueue_after_failure_restarts_the_drain() {
        let mut h = Harness::new();
        h.enqueue("will fail");
        h.enqueue("survivor");

        h.expect_started("will fail").await;
        h.release_failure();
        match h.next_event().await {
            QueueEvent::UtteranceFailed { .. } => {}
            other => panic!("expected UtteranceFailed, got {other:?}"),
        }

        // A fresh enqueue kicks processing again, FIFO order preserved.
        h.enqueue("newcomer");
        h.expect_started("survivor").await;
        h.release_success();
        h.expect_finished().await;
        h.expect_started("newcomer").await;
        h.release_success();
        h.expect_finished().await;
        h.expect_drained().await;
    }

    #[tokio::test]
    async fn resume_after_failure_restarts_the_drain() {
        let mut h = Harness::new();
        h.enqueue("will fail");
        h.enqueue("survivor");

        h.expect_started("will fail").await;
        h.release_failure();
        match h.next_event().await {
            QueueEvent::UtteranceFailed { .. } => {}
            other => panic!("expected UtteranceFailed, got {other:?}"),
        }
        assert_eq!(h.queue.status().await.pending, 1);

        assert_eq!(h.queue.resume().await, ResumeOutcome::Resumed);
        h.expect_started("survivor").await;
        h.release_success();
        h.expect_finished().await;
        h.expect_drained().await;
        assert_eq!(h.queue.status().await.state, PlaybackState::Idle);
    }

    #[tokio::test]
    async fn wait_idle_resolves_after_drain() {
        let (event_tx, _events) = mpsc::unbounded_channel();
        let queue = SpeechQueue::spawn(NullSpeaker, event_tx);

        queue.enqueue(SpeechTask::new("quick", 1.0).unwrap());
        timeout(Duration::from_secs(5), queue.wait_idle())
            .await
            .expect("wait_idle should resolve once the queue drains");

        let status = queue.status().await;
        assert_eq!(status.state, PlaybackState::Idle);
        assert_eq!(status.pending, 0);
    }

    #[tokio::test]
    async fn status_reports_speaking_while_in_flight() {
        let mut h = Harness::new();
        h.enqueue("in flight");
        h.expect_started("in flight").await;

        let status = h.queue.status().await;
        assert_eq!(status.state, PlaybackState::Speaking);
        assert_eq!(status.pending, 0);
    }
}
