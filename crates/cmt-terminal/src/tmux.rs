//! tmux location lookup and navigation.

use std::fmt;
use std::process::Command;

use tracing::debug;

use crate::error::TmuxError;

const LOCATION_FORMAT: &str = "#{session_name}:#{window_index}:#{pane_index}";

/// A pane address inside tmux.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub session: String,
    pub window: u32,
    pub pane: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.session, self.window, self.pane)
    }
}

/// The terminal multiplexer hosting cmt.
pub trait Multiplexer: Send + Sync {
    fn current_location(&self) -> Result<Location, TmuxError>;

    fn jump_to(&self, location: &Location) -> Result<(), TmuxError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Tmux;

impl Tmux {
    pub fn new() -> Self {
        Self
    }

    pub fn is_inside() -> bool {
        std::env::var_os("TMUX").is_some_and(|value| !value.is_empty())
    }

    pub fn require() -> Result<(), TmuxError> {
        if Self::is_inside() {
            Ok(())
        } else {
            Err(TmuxError::NotInTmux)
        }
    }

    fn run(args: &[&str]) -> Result<String, TmuxError> {
        let command = args.first().copied().unwrap_or_default().to_string();
        let output = Command::new("tmux")
            .args(args)
            .output()
            .map_err(|e| TmuxError::Command {
                command: command.clone(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(TmuxError::Command {
                command,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Multiplexer for Tmux {
    fn current_location(&self) -> Result<Location, TmuxError> {
        Self::require()?;
        let raw = Self::run(&["display-message", "-p", LOCATION_FORMAT])?;
        parse_location(&raw)
    }

    fn jump_to(&self, location: &Location) -> Result<(), TmuxError> {
        Self::require()?;
        let current = Self::run(&["display-message", "-p", "#{session_name}"])?;
        if current != location.session {
            Self::run(&["switch-client", "-t", &location.session])?;
        }
        let window = format!("{}:{}", location.session, location.window);
        Self::run(&["select-window", "-t", &window])?;
        Self::run(&["select-pane", "-t", &location.to_string()])?;
        debug!(%location, "Switched tmux client");
        Ok(())
    }
}

/// Parses `session:window:pane`. Session names may themselves contain `:`,
/// so the two numeric fields are taken from the right.
pub fn parse_location(raw: &str) -> Result<Location, TmuxError> {
    let trimmed = raw.trim();
    let mut parts = trimmed.rsplitn(3, ':');
    let (Some(pane), Some(window), Some(session)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(TmuxError::Parse(trimmed.to_string()));
    };
    if session.is_empty() {
        return Err(TmuxError::Parse(trimmed.to_string()));
    }
    let window = window
        .parse()
        .map_err(|_| TmuxError::Parse(trimmed.to_string()))?;
    let pane = pane
        .parse()
        .map_err(|_| TmuxError::Parse(trimmed.to_string()))?;
    Ok(Location {
        session: session.to_string(),
        window,
        pane,
    })
}
