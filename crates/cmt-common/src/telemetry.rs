#![expect(clippy::print_stderr, reason = "Tracing not initialized yet")]

//! Tracing subscriber setup.
//!
//! The agent owns the pane while a session runs, so the default filter is
//! quiet (`warn`). Set `CMT_LOG` to send everything to a file instead.

use std::io::IsTerminal;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

pub const LOG_FILE_ENV: &str = "CMT_LOG";
pub const LOG_FORMAT_ENV: &str = "CMT_LOG_FORMAT";
pub const LOG_STREAM_ENV: &str = "CMT_LOG_STREAM";

/// Keeps the non-blocking file writer alive; drop it last in `main`.
#[derive(Debug)]
pub struct TelemetryGuard {
    _guard: Option<WorkerGuard>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogStream {
    Stderr,
    Stdout,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelemetrySettings {
    pub file: Option<PathBuf>,
    pub format: LogFormat,
    pub stream: LogStream,
}

impl TelemetrySettings {
    pub fn from_env() -> Self {
        Self {
            file: std::env::var(LOG_FILE_ENV)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from),
            format: match env_lowercase(LOG_FORMAT_ENV).as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            stream: match env_lowercase(LOG_STREAM_ENV).as_deref() {
                Some("stdout") => LogStream::Stdout,
                _ => LogStream::Stderr,
            },
        }
    }
}

fn env_lowercase(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_lowercase())
}

pub fn init_tracing(default_level: &str) -> TelemetryGuard {
    let settings = TelemetrySettings::from_env();
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (writer, guard, ansi) = match settings.file.as_ref() {
        Some(path) => match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
        {
            Ok(file) => {
                let (non_blocking, guard) = tracing_appender::non_blocking(file);
                (BoxMakeWriter::new(non_blocking), Some(guard), false)
            }
            Err(err) => {
                eprintln!(
                    "Warning: failed to open log file {}: {}",
                    path.display(),
                    err
                );
                stream_writer(LogStream::Stderr)
            }
        },
        None => stream_writer(settings.stream),
    };

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = match settings.format {
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(false)
                .json()
                .with_writer(writer)
                .finish(),
        ),
        LogFormat::Text => Box::new(
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_thread_names(true)
                .with_ansi(ansi)
                .with_writer(writer)
                .finish(),
        ),
    };

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return TelemetryGuard { _guard: None };
    }

    TelemetryGuard { _guard: guard }
}

fn stream_writer(stream: LogStream) -> (BoxMakeWriter, Option<WorkerGuard>, bool) {
    match stream {
        LogStream::Stdout => (
            BoxMakeWriter::new(std::io::stdout),
            None,
            std::io::stdout().is_terminal(),
        ),
        LogStream::Stderr => (
            BoxMakeWriter::new(std::io::stderr),
            None,
            std::io::stderr().is_terminal(),
        ),
    }
}
