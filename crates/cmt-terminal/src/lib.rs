#![deny(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! Terminal plumbing: host terminal modes, the agent's pseudo-terminal and
//! the tmux pane the agent runs in.

pub mod error;
pub mod mode;
mod pty;
pub mod tmux;

pub use error::ModeError;
pub use error::PtyError;
pub use error::TmuxError;
pub use mode::ModeToken;
pub use pty::AgentExit;
pub use pty::PtyResizer;
pub use pty::PtySession;
pub use pty::PtySpawn;
pub use pty::PtyWriter;
pub use tmux::Location;
pub use tmux::Multiplexer;
pub use tmux::Tmux;
