//! Interactive queue session.
//!
//! The one-shot subcommands each run against a fresh process, so pause and
//! resume have nothing to act on. `tts session` keeps one queue alive and
//! drives it from stdin, line by line, until `quit` or EOF.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tts_lib::{PageSource, QueueEvent, SpeechQueue, SpeechTask, SystemSpeaker};

use crate::{CliError, describe_cancel, describe_pause, describe_resume};

const HELP: &str = "\
Commands:
  say <text>     queue text for speech
  read <url>     queue a webpage's readable text
  pause          stop draining after the current utterance
  resume         continue a paused queue
  cancel         discard queued tasks and stop playback
  status         show queue state and pending count
  help           show this help
  quit           exit the session";

/// Runs the interactive loop until `quit` or stdin closes.
pub async fn run(rate: f32, voice: Option<String>) -> Result<(), CliError> {
    let speaker = SystemSpeaker::detect()?;
    println!("Session started using {}. Type `help` for commands.", speaker.describe());

    let (event_tx, events) = mpsc::unbounded_channel();
    let queue = SpeechQueue::spawn(speaker, event_tx);

    // Playback progress prints concurrently with the prompt loop.
    let printer = tokio::spawn(print_events(events));

    let source = PageSource::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if !handle_line(&queue, &source, rate, voice.as_deref(), line.trim()).await {
            break;
        }
    }

    // Let anything already queued finish before tearing down.
    queue.wait_idle().await;
    drop(queue);
    let _ = printer.await;
    Ok(())
}

/// Dispatches one input line. Returns `false` when the session should end.
async fn handle_line(
    queue: &SpeechQueue,
    source: &PageSource,
    rate: f32,
    voice: Option<&str>,
    line: &str,
) -> bool {
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    let enqueue_text = |text: &str| match SpeechTask::new(text, rate) {
        Ok(task) => {
            let task = match voice {
                Some(voice) => task.with_voice(voice),
                None => task,
            };
            queue.enqueue(task);
        }
        Err(error) => println!("{error}"),
    };

    match command {
        "" => {}
        "say" => {
            if rest.is_empty() {
                println!("Usage: say <text>");
            } else {
                enqueue_text(rest);
            }
        }
        "read" => {
            if rest.is_empty() {
                println!("Usage: read <url>");
            } else {
                match source.fetch_readable(rest).await {
                    Ok(text) => enqueue_text(&text),
                    Err(error) => println!("Error fetching the webpage: {error}"),
                }
            }
        }
        "pause" => println!("{}", describe_pause(queue.pause().await)),
        "resume" => println!("{}", describe_resume(queue.resume().await)),
        "cancel" => println!("{}", describe_cancel(queue.cancel().await)),
        "status" => println!("{}", queue.status().await),
        "help" => println!("{HELP}"),
        "quit" | "exit" => return false,
        other => println!("Unknown command `{other}`. Type `help` for commands."),
    }
    true
}

/// Prints playback progress until the queue worker shuts down.
async fn print_events(mut events: mpsc::UnboundedReceiver<QueueEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            QueueEvent::UtteranceStarted { text } => {
                println!("Speaking: {}", preview(&text));
            }
            QueueEvent::UtteranceFinished => {}
            QueueEvent::UtteranceFailed { error } => {
                println!("Error using text-to-speech: {error}");
            }
            QueueEvent::Drained => {}
        }
    }
}

/// First line of the utterance, truncated for display.
fn preview(text: &str) -> String {
    const MAX: usize = 60;
    let first_line = text.lines().next().unwrap_or_default();
    let mut out: String = first_line.chars().take(MAX).collect();
    if first_line.chars().count() > MAX || text.lines().count() > 1 {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use tts_lib::NullSpeaker;

    use super::*;

    fn test_queue() -> SpeechQueue {
        let (event_tx, _events) = mpsc::unbounded_channel();
        SpeechQueue::spawn(NullSpeaker, event_tx)
    }

    #[tokio::test]
    async fn quit_ends_the_session() {
        let queue = test_queue();
        let source = PageSource::new();
        assert!(!handle_line(&queue, &source, 1.0, None, "quit").await);
        assert!(!handle_line(&queue, &source, 1.0, None, "exit").await);
    }

    #[tokio::test]
    async fn blank_and_unknown_lines_keep_the_session_alive() {
        let queue = test_queue();
        let source = PageSource::new();
        assert!(handle_line(&queue, &source, 1.0, None, "").await);
        assert!(handle_line(&queue, &source, 1.0, None, "shout loudly").await);
        assert!(handle_line(&queue, &source, 1.0, None, "help").await);
    }

    #[tokio::test]
    async fn say_enqueues_and_drains() {
        let queue = test_queue();
        let source = PageSource::new();
        assert!(handle_line(&queue, &source, 1.0, Some("Alex"), "say hello there").await);
        queue.wait_idle().await;
        assert_eq!(queue.status().await.pending, 0);
    }

    #[test]
    fn preview_truncates_long_text() {
        let text = "a".repeat(100);
        let shown = preview(&text);
        assert!(shown.ends_with("..."));
        assert_eq!(shown.chars().count(), 63);
    }

    #[test]
    fn preview_keeps_short_text_intact() {
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn preview_marks_multiline_text() {
        assert_eq!(preview("first\nsecond"), "first...");
    }
}
