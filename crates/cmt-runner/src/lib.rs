#![deny(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! Runs an agent inside a pseudo-terminal and keeps its session row honest.
//!
//! [`Runner`] owns one run end to end: it records the session, spawns the
//! agent, copies I/O, tracks working/waiting through the [`ActivityMonitor`],
//! and hands Ctrl+Z and `SIGCONT` to the [`SuspendCoordinator`].

pub mod activity;
pub mod command;
mod control;
mod error;
mod executor;
mod host;
pub mod prompt;
mod signals;
pub mod suspend;

pub use activity::ActivityMonitor;
pub use activity::Clock;
pub use activity::IDLE_THRESHOLD;
pub use activity::StatusSink;
pub use activity::SystemClock;
pub use activity::TICK_INTERVAL;
pub use command::ResumeTarget;
pub use command::RunOptions;
pub use command::attach_files;
pub use command::build_args;
pub use control::SessionControl;
pub use error::ControlError;
pub use error::RunError;
pub use executor::HostIo;
pub use executor::RunOutcome;
pub use executor::Runner;
pub use host::ProcessGroupSignals;
pub use host::StdinTerminal;
pub use prompt::CommandKind;
pub use signals::SignalListener;
pub use signals::SignalTarget;
pub use suspend::JobControl;
pub use suspend::PtySizer;
pub use suspend::SUSPEND_SENTINEL;
pub use suspend::SuspendCoordinator;
pub use suspend::TerminalControl;
