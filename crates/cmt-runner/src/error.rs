use std::path::PathBuf;

use cmt_common::ConfigError;
use cmt_store::SessionStatus;
use cmt_store::StoreError;
use cmt_terminal::ModeError;
use cmt_terminal::PtyError;
use cmt_terminal::TmuxError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("cmt requires tmux: {0}")]
    Multiplexer(#[source] TmuxError),
    #[error("failed to determine working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),
    #[error("file not found: {}", .0.display())]
    MissingFile(PathBuf),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Pty(#[from] PtyError),
    #[error("terminal mode error during {}: {source}", .source.operation())]
    Mode {
        #[from]
        source: ModeError,
    },
    #[error("failed to create transcript {path}: {source}")]
    Transcript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to start {what}: {source}")]
    Thread {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write agent output to {target}: {source}")]
    Output {
        target: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("agent exited with status {code}")]
    AgentExit { code: u32 },
    #[error("session {id} was {status} while the agent was running")]
    Superseded { id: String, status: SessionStatus },
    #[error("{cause}; recording the abandoned session also failed: {source}")]
    Unrecorded {
        cause: Box<RunError>,
        #[source]
        source: StoreError,
    },
}

impl RunError {
    pub fn suggestion(&self) -> Option<String> {
        match self {
            RunError::Multiplexer(err) => Some(err.suggestion()),
            RunError::Pty(err) => Some(err.suggestion()),
            RunError::Mode { source } => Some(source.suggestion()),
            RunError::Store(err) => err.suggestion().map(str::to_string),
            RunError::MissingFile(_) => Some("Check the path passed to --file.".to_string()),
            RunError::Transcript { .. } => {
                Some("Check permissions on the cmt output directory (CMT_HOME).".to_string())
            }
            RunError::Unrecorded { source, .. } => source.suggestion().map(str::to_string),
            RunError::WorkingDirectory(_)
            | RunError::Config(_)
            | RunError::Thread { .. }
            | RunError::Output { .. }
            | RunError::AgentExit { .. }
            | RunError::Superseded { .. } => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("no sessions found")]
    NoSessions,
    #[error("session {id} is not running (status: {status})")]
    NotRunning { id: String, status: SessionStatus },
    #[error("session {id} is not in the trash (status: {status})")]
    NotDeleted { id: String, status: SessionStatus },
    #[error(transparent)]
    Store(#[from] StoreError),
}
