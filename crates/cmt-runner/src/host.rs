//! Real terminal and signal backends for the suspend coordinator.

use std::os::fd::RawFd;

use cmt_terminal::ModeError;
use cmt_terminal::ModeToken;
use cmt_terminal::mode;
use tracing::warn;

use crate::suspend::JobControl;
use crate::suspend::TerminalControl;

/// The host terminal behind a file descriptor, usually stdin.
#[derive(Debug, Clone, Copy)]
pub struct StdinTerminal {
    fd: Option<RawFd>,
}

impl StdinTerminal {
    pub fn stdin() -> Self {
        Self {
            fd: Some(mode::STDIN_FD),
        }
    }

    /// A host with no terminal at all, for piped runs.
    pub fn detached() -> Self {
        Self { fd: None }
    }
}

impl TerminalControl for StdinTerminal {
    type Token = ModeToken;

    fn is_terminal(&self) -> bool {
        self.fd.is_some_and(mode::is_terminal)
    }

    fn enter_raw(&self) -> Result<ModeToken, ModeError> {
        match self.fd {
            Some(fd) => mode::enter_raw(fd),
            None => Err(ModeError::NotATerminal { fd: -1 }),
        }
    }

    fn restore(&self, token: &ModeToken) -> Result<(), ModeError> {
        match self.fd {
            Some(fd) => mode::restore(fd, Some(token)),
            None => Ok(()),
        }
    }

    fn size(&self) -> Result<(u16, u16), ModeError> {
        match self.fd {
            Some(fd) => mode::size(fd),
            None => Err(ModeError::NotATerminal { fd: -1 }),
        }
    }
}

/// Job control with real signals. The agent leads its own process group
/// because the PTY spawn puts it in a new session.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessGroupSignals;

impl ProcessGroupSignals {
    fn signal_group(pid: u32, signal: libc::c_int) {
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return;
        };
        if pid <= 0 {
            return;
        }
        // SAFETY: kill(2) on a negative pid addresses that process group.
        if unsafe { libc::kill(-pid, signal) } != 0 {
            warn!(
                pid,
                signal,
                error = %std::io::Error::last_os_error(),
                "Failed to signal agent process group"
            );
        }
    }
}

impl JobControl for ProcessGroupSignals {
    fn stop_group(&self, pid: u32) {
        Self::signal_group(pid, libc::SIGSTOP);
    }

    fn continue_group(&self, pid: u32) {
        Self::signal_group(pid, libc::SIGCONT);
    }

    fn stop_self(&self) {
        // SAFETY: pid 0 addresses our own process group, as a shell's ^Z would.
        if unsafe { libc::kill(0, libc::SIGSTOP) } != 0 {
            warn!(error = %std::io::Error::last_os_error(), "Failed to stop cmt");
        }
    }
}
