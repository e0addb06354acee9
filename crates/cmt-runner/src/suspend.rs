//! Job-control emulation for an agent running under a pseudo-terminal.
//!
//! The shell cannot suspend the agent directly: it sits in its own session
//! behind the PTY, and the host terminal is in raw mode so Ctrl+Z arrives as
//! a plain byte. The coordinator turns that byte into the shell's behaviour:
//! cooked mode, stop the agent's process group, stop ourselves, and undo all
//! of it on continue.
//!
//! States are `Raw` (normal operation), `Suspended` (cooked mode, waiting for
//! `SIGCONT`) and `Passthrough` (stdin is not a terminal, or the run has
//! finished). The sentinel path and the continue path share one mutex.

use std::sync::Mutex;

use cmt_common::mutex_lock_or_recover;
use cmt_terminal::ModeError;
use cmt_terminal::PtyError;
use cmt_terminal::PtyResizer;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// ASCII SUB, what Ctrl+Z sends in raw mode.
pub const SUSPEND_SENTINEL: u8 = 0x1A;

/// Host terminal operations. `Token` is whatever `enter_raw` hands back.
pub trait TerminalControl: Send + Sync {
    type Token: Send;

    fn is_terminal(&self) -> bool;

    fn enter_raw(&self) -> Result<Self::Token, ModeError>;

    fn restore(&self, token: &Self::Token) -> Result<(), ModeError>;

    fn size(&self) -> Result<(u16, u16), ModeError>;
}

/// Stop/continue signals for the agent's process group and for cmt itself.
pub trait JobControl: Send + Sync {
    fn stop_group(&self, pid: u32);

    fn continue_group(&self, pid: u32);

    /// Blocks until the process is continued.
    fn stop_self(&self);
}

pub trait PtySizer: Send + Sync {
    fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError>;
}

impl PtySizer for PtyResizer {
    fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        PtyResizer::resize(self, cols, rows)
    }
}

/// A run of ordinary input or a single sentinel byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Data(&'a [u8]),
    Sentinel,
}

/// Splits `chunk` at each sentinel byte. Data segments are never empty.
pub fn split_on_sentinel(chunk: &[u8]) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut start = 0;
    for (i, byte) in chunk.iter().enumerate() {
        if *byte == SUSPEND_SENTINEL {
            if i > start {
                segments.push(Segment::Data(&chunk[start..i]));
            }
            segments.push(Segment::Sentinel);
            start = i + 1;
        }
    }
    if start < chunk.len() {
        segments.push(Segment::Data(&chunk[start..]));
    }
    segments
}

enum Mode<T> {
    Raw(T),
    Suspended,
    Passthrough,
}

impl<T> Mode<T> {
    fn name(&self) -> &'static str {
        match self {
            Mode::Raw(_) => "raw",
            Mode::Suspended => "suspended",
            Mode::Passthrough => "passthrough",
        }
    }
}

pub struct SuspendCoordinator<T: TerminalControl, J: JobControl, S: PtySizer> {
    terminal: T,
    jobs: J,
    pty: S,
    child_pid: Option<u32>,
    mode: Mutex<Mode<T::Token>>,
}

impl<T: TerminalControl, J: JobControl, S: PtySizer> SuspendCoordinator<T, J, S> {
    /// Enters raw mode when stdin is a terminal. The mode is restored by
    /// [`release`](Self::release) or on drop, whichever comes first.
    pub fn engage(terminal: T, jobs: J, pty: S, child_pid: Option<u32>) -> Result<Self, ModeError> {
        let mode = if terminal.is_terminal() {
            Mode::Raw(terminal.enter_raw()?)
        } else {
            Mode::Passthrough
        };
        debug!(mode = mode.name(), ?child_pid, "Suspend coordinator engaged");
        Ok(Self {
            terminal,
            jobs,
            pty,
            child_pid,
            mode: Mutex::new(mode),
        })
    }

    pub fn is_raw(&self) -> bool {
        matches!(*mutex_lock_or_recover(&self.mode), Mode::Raw(_))
    }

    /// Sentinel bytes are only intercepted while the host terminal is ours.
    pub fn intercepts_sentinel(&self) -> bool {
        !matches!(*mutex_lock_or_recover(&self.mode), Mode::Passthrough)
    }

    /// Forwards one chunk of host input, suspending at each sentinel.
    /// Bytes before a sentinel reach the agent before anything is stopped.
    pub fn forward_input<W>(&self, chunk: &[u8], mut write: W) -> Result<(), PtyError>
    where
        W: FnMut(&[u8]) -> Result<(), PtyError>,
    {
        for segment in split_on_sentinel(chunk) {
            match segment {
                Segment::Data(data) => write(data)?,
                Segment::Sentinel => {
                    if !self.suspend() {
                        write(&[SUSPEND_SENTINEL])?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Ctrl+Z: cooked mode, stop the agent, stop ourselves, then resume.
    /// Returns false, doing nothing, in `Passthrough`; the caller then owns
    /// the sentinel byte.
    ///
    /// The lock is held across the self-stop. A `SIGCONT` handled on another
    /// thread blocks on it until this path has re-entered raw mode, then
    /// finds nothing to do.
    pub fn suspend(&self) -> bool {
        let mut mode = mutex_lock_or_recover(&self.mode);
        match std::mem::replace(&mut *mode, Mode::Suspended) {
            Mode::Raw(token) => {
                if let Err(err) = self.terminal.restore(&token) {
                    warn!(error = %err, "Failed to restore terminal before suspend");
                }
            }
            Mode::Suspended => {}
            Mode::Passthrough => {
                *mode = Mode::Passthrough;
                return false;
            }
        }

        if let Some(pid) = self.child_pid {
            self.jobs.stop_group(pid);
        }
        info!(child_pid = ?self.child_pid, "Suspending");
        self.jobs.stop_self();

        self.resume_locked(&mut mode);
        true
    }

    /// External `SIGCONT`: resume only if we were stopped without going
    /// through [`suspend`](Self::suspend). Returns true if it resumed.
    pub fn on_continue(&self) -> bool {
        let mut mode = mutex_lock_or_recover(&self.mode);
        if !matches!(*mode, Mode::Suspended) || !self.terminal.is_terminal() {
            return false;
        }
        self.resume_locked(&mut mode);
        true
    }

    fn resume_locked(&self, mode: &mut Mode<T::Token>) {
        match self.terminal.enter_raw() {
            Ok(token) => *mode = Mode::Raw(token),
            Err(err) => warn!(error = %err, "Failed to re-enter raw mode after resume"),
        }
        if let Some(pid) = self.child_pid {
            self.jobs.continue_group(pid);
        }
        self.sync_size();
        info!(mode = mode.name(), "Resumed");
    }

    /// Copies the host terminal size onto the PTY.
    pub fn sync_size(&self) {
        match self.terminal.size() {
            Ok((cols, rows)) => {
                if let Err(err) = self.pty.resize(cols, rows) {
                    warn!(cols, rows, error = %err, "Failed to resize agent terminal");
                }
            }
            Err(err) => debug!(error = %err, "Host terminal size unavailable"),
        }
    }

    /// Restores the host terminal. Later calls, and later continue signals,
    /// do nothing.
    pub fn release(&self) -> Result<(), ModeError> {
        let mut mode = mutex_lock_or_recover(&self.mode);
        match std::mem::replace(&mut *mode, Mode::Passthrough) {
            Mode::Raw(token) => self.terminal.restore(&token),
            Mode::Suspended | Mode::Passthrough => Ok(()),
        }
    }
}

impl<T: TerminalControl, J: JobControl, S: PtySizer> Drop for SuspendCoordinator<T, J, S> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(error = %err, "Failed to restore terminal");
        }
    }
}
