//! Terminal-layer errors.
//!
//! Each error names the operation that failed and carries a suggestion the
//! CLI can print alongside the message.

use std::io;
use thiserror::Error;

/// Spawn failures are classified so the suggestion can be specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnErrorKind {
    NotFound,
    PermissionDenied,
    Other,
}

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Failed to open PTY: {reason}")]
    Open { reason: String },
    #[error("Failed to spawn process: {reason}")]
    Spawn {
        reason: String,
        kind: SpawnErrorKind,
    },
    #[error("Failed to write to PTY: {reason}")]
    Write {
        reason: String,
        #[source]
        source: Option<io::Error>,
    },
    #[error("Failed to resize PTY: {reason}")]
    Resize { reason: String },
    #[error("Failed to wait for agent process: {reason}")]
    Wait {
        reason: String,
        #[source]
        source: Option<io::Error>,
    },
}

impl PtyError {
    pub fn operation(&self) -> &'static str {
        match self {
            PtyError::Open { .. } => "open",
            PtyError::Spawn { .. } => "spawn",
            PtyError::Write { .. } => "write",
            PtyError::Resize { .. } => "resize",
            PtyError::Wait { .. } => "wait",
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            PtyError::Open { reason }
            | PtyError::Spawn { reason, .. }
            | PtyError::Write { reason, .. }
            | PtyError::Resize { reason }
            | PtyError::Wait { reason, .. } => reason,
        }
    }

    pub fn suggestion(&self) -> String {
        match self {
            PtyError::Open { .. } => {
                "PTY allocation failed. Check system resource limits (ulimit -n) or try restarting."
                    .to_string()
            }
            PtyError::Spawn { kind, .. } => match kind {
                SpawnErrorKind::NotFound => {
                    "Agent binary not found. Check that it is installed and in PATH, or set CMT_AGENT_BIN."
                        .to_string()
                }
                SpawnErrorKind::PermissionDenied => {
                    "Permission denied. Check the agent binary's permissions.".to_string()
                }
                SpawnErrorKind::Other => {
                    "Process spawn failed. Check the agent command and working directory.".to_string()
                }
            },
            PtyError::Write { .. } => {
                "Failed to send input to the agent. The session may have ended.".to_string()
            }
            PtyError::Resize { .. } => {
                "Failed to resize the agent's terminal. Resize the pane to retry.".to_string()
            }
            PtyError::Wait { .. } => {
                "Lost track of the agent process. Run 'cmt sessions' to check its status."
                    .to_string()
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum ModeError {
    #[error("file descriptor {fd} is not a terminal")]
    NotATerminal { fd: i32 },
    #[error("failed to read terminal attributes: {0}")]
    GetAttr(#[source] io::Error),
    #[error("failed to set terminal attributes: {0}")]
    SetAttr(#[source] io::Error),
    #[error("failed to query terminal size: {0}")]
    Size(#[source] io::Error),
}

impl ModeError {
    pub fn operation(&self) -> &'static str {
        match self {
            ModeError::NotATerminal { .. } => "is_terminal",
            ModeError::GetAttr(_) => "tcgetattr",
            ModeError::SetAttr(_) => "tcsetattr",
            ModeError::Size(_) => "size",
        }
    }

    pub fn suggestion(&self) -> String {
        match self {
            ModeError::NotATerminal { .. } => {
                "Run cmt from an interactive terminal, not through a pipe.".to_string()
            }
            ModeError::GetAttr(_) | ModeError::SetAttr(_) => {
                "Terminal mode error. Run 'reset' if the shell looks broken.".to_string()
            }
            ModeError::Size(_) => "Could not read the pane size. Try resizing the pane.".to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum TmuxError {
    #[error("not running inside tmux")]
    NotInTmux,
    #[error("tmux {command} failed: {reason}")]
    Command { command: String, reason: String },
    #[error("unexpected tmux output: {0:?}")]
    Parse(String),
}

impl TmuxError {
    pub fn suggestion(&self) -> String {
        match self {
            TmuxError::NotInTmux => "Start tmux first, e.g. 'tmux new-session -s main'.".to_string(),
            TmuxError::Command { .. } => {
                "Check that the tmux server is running and the target still exists.".to_string()
            }
            TmuxError::Parse(_) => "Check the installed tmux version.".to_string(),
        }
    }
}
