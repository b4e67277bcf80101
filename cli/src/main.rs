mod session;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;
use tts_lib::{
    CancelOutcome, InvalidRate, NullSpeaker, PageSource, PauseOutcome, QueueEvent, ResumeOutcome,
    SourceError, Speaker, SpeakerError, SpeechQueue, SpeechTask, SystemSpeaker, TaskError,
};

/// Convert text or webpage content to speech.
///
/// Examples:
///   tts say "Hello, world!"                  # Speak text
///   tts say "Slow down" --rate 0.75          # Speak at 75% speed
///   tts read https://example.com/article     # Speak a webpage
///   tts session                              # Interactive queue session
#[derive(Debug, Parser)]
#[command(name = "tts")]
#[command(version)]
#[command(about = "CLI tool for text-to-speech functionality")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert custom text to speech.
    Say {
        /// The text to speak. Multiple words are joined with spaces.
        #[arg(required = true)]
        text: Vec<String>,

        /// Set the speaking rate (default is 1.0).
        #[arg(short, long, default_value_t = 1.0)]
        rate: f32,

        /// Synthesizer voice to use.
        #[arg(short, long)]
        voice: Option<String>,
    },

    /// Convert webpage content to speech.
    Read {
        /// The URL to fetch and read aloud.
        url: String,

        /// Set the speaking rate (default is 1.0).
        #[arg(short, long, default_value_t = 1.0)]
        rate: f32,

        /// Synthesizer voice to use.
        #[arg(short, long)]
        voice: Option<String>,
    },

    /// Pause the queue after the current utterance.
    Pause,

    /// Resume a paused queue.
    Resume,

    /// Discard queued tasks and stop any in-flight utterance.
    Cancel,

    /// Show the queue state and pending count.
    Status {
        /// Print the status as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run an interactive session against one live queue.
    Session {
        /// Default speaking rate for session utterances.
        #[arg(short, long, default_value_t = 1.0)]
        rate: f32,

        /// Synthesizer voice for session utterances.
        #[arg(short, long)]
        voice: Option<String>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Task(#[from] TaskError),

    #[error("{0}")]
    Rate(#[from] InvalidRate),

    #[error("Error using text-to-speech: {0}")]
    Speaker(#[from] SpeakerError),

    #[error("Error fetching the webpage: {0}")]
    Source(#[from] SourceError),

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode status: {0}")]
    Json(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if let Err(error) = run(cli).await {
        eprintln!("{error}");
        std::process::exit(1);
    }
}

/// Sends tracing output to stderr, controlled by `RUST_LOG`.
///
/// Stdout stays clean for the command output itself.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Say { text, rate, voice } => {
            let task = build_task(text.join(" "), rate, voice)?;
            println!("Speaking the provided text...");
            speak_all(vec![task]).await
        }
        Commands::Read { url, rate, voice } => {
            let text = PageSource::new().fetch_readable(&url).await?;
            let task = build_task(text, rate, voice)?;
            println!("Speaking the provided website...");
            speak_all(vec![task]).await
        }
        Commands::Pause => {
            let queue = control_queue();
            println!("{}", describe_pause(queue.pause().await));
            Ok(())
        }
        Commands::Resume => {
            let queue = control_queue();
            println!("{}", describe_resume(queue.resume().await));
            Ok(())
        }
        Commands::Cancel => {
            let queue = control_queue();
            println!("{}", describe_cancel(queue.cancel().await));
            Ok(())
        }
        Commands::Status { json } => {
            let queue = control_queue();
            let status = queue.status().await;
            if json {
                println!("{}", serde_json::to_string(&status)?);
            } else {
                println!("{status}");
            }
            Ok(())
        }
        Commands::Session { rate, voice } => {
            let rate = tts_lib::validate_rate(rate)?;
            session::run(rate, voice).await
        }
    }
}

fn build_task(text: String, rate: f32, voice: Option<String>) -> Result<SpeechTask, TaskError> {
    let task = SpeechTask::new(text, rate)?;
    Ok(match voice {
        Some(voice) => task.with_voice(voice),
        None => task,
    })
}

/// Drains `tasks` through a fresh queue on the detected synthesizer.
///
/// Blocks until every utterance has played. A synthesis failure surfaces as
/// the command's error.
async fn speak_all(tasks: Vec<SpeechTask>) -> Result<(), CliError> {
    let speaker = SystemSpeaker::detect()?;
    debug!(provider = speaker.describe(), "synthesizer selected");
    speak_with(speaker, tasks).await
}

async fn speak_with<S: Speaker>(speaker: S, tasks: Vec<SpeechTask>) -> Result<(), CliError> {
    let (event_tx, mut events) = mpsc::unbounded_channel();
    let queue = SpeechQueue::spawn(speaker, event_tx);
    for task in tasks {
        queue.enqueue(task);
    }

    while let Some(event) = events.recv().await {
        match event {
            QueueEvent::UtteranceStarted { .. } => {}
            QueueEvent::UtteranceFinished => {
                println!("Text has been spoken successfully.");
            }
            QueueEvent::UtteranceFailed { error } => return Err(error.into()),
            QueueEvent::Drained => return Ok(()),
        }
    }
    Ok(())
}

/// Queue used by the one-shot control commands.
///
/// Each CLI invocation is a fresh process, so these commands act on a queue
/// that has nothing in it and report the no-op outcome honestly. The
/// `session` subcommand is the place where pause and resume have teeth.
fn control_queue() -> SpeechQueue {
    let (event_tx, _events) = mpsc::unbounded_channel();
    SpeechQueue::spawn(NullSpeaker, event_tx)
}

fn describe_pause(outcome: PauseOutcome) -> &'static str {
    match outcome {
        PauseOutcome::Paused => "Paused; the current utterance will finish first.",
        PauseOutcome::AlreadyPaused => "The queue is already paused.",
        PauseOutcome::NotSpeaking => "Pause requested, but nothing is being spoken.",
    }
}

fn describe_resume(outcome: ResumeOutcome) -> &'static str {
    match outcome {
        ResumeOutcome::Resumed => "Resumed.",
        ResumeOutcome::NotPaused => "Resume requested, but the queue is not paused.",
    }
}

fn describe_cancel(outcome: CancelOutcome) -> String {
    if outcome.interrupted {
        format!(
            "Cancelled {} queued task(s) and stopped the current utterance.",
            outcome.discarded
        )
    } else {
        format!("Cancelled {} queued task(s).", outcome.discarded)
    }
}
