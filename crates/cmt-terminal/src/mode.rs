//! Host terminal mode control.
//!
//! `enter_raw` hands back a [`ModeToken`] holding the attributes it replaced;
//! the caller threads that token to exactly one `restore`. Nothing here keeps
//! process-global state.

use std::io;
use std::mem::MaybeUninit;
use std::os::fd::RawFd;

use crate::error::ModeError;

pub const STDIN_FD: RawFd = libc::STDIN_FILENO;

const FALLBACK_TERM: &str = "xterm-256color";

/// Terminal attributes captured before switching to raw mode.
#[derive(Clone, Copy)]
pub struct ModeToken {
    saved: libc::termios,
}

impl std::fmt::Debug for ModeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeToken").finish_non_exhaustive()
    }
}

pub fn is_terminal(fd: RawFd) -> bool {
    // SAFETY: isatty only inspects the descriptor.
    unsafe { libc::isatty(fd) == 1 }
}

fn get_attrs(fd: RawFd) -> Result<libc::termios, ModeError> {
    let mut attrs = MaybeUninit::<libc::termios>::uninit();
    // SAFETY: tcgetattr fully initialises `attrs` when it returns 0.
    if unsafe { libc::tcgetattr(fd, attrs.as_mut_ptr()) } != 0 {
        return Err(ModeError::GetAttr(io::Error::last_os_error()));
    }
    // SAFETY: checked above.
    Ok(unsafe { attrs.assume_init() })
}

fn set_attrs(fd: RawFd, attrs: &libc::termios) -> Result<(), ModeError> {
    // SAFETY: `attrs` is a valid termios obtained from tcgetattr.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, attrs) } != 0 {
        return Err(ModeError::SetAttr(io::Error::last_os_error()));
    }
    Ok(())
}

/// Puts `fd` into raw mode and returns the mode it was in before.
pub fn enter_raw(fd: RawFd) -> Result<ModeToken, ModeError> {
    if !is_terminal(fd) {
        return Err(ModeError::NotATerminal { fd });
    }
    let saved = get_attrs(fd)?;
    let mut raw = saved;
    // SAFETY: cfmakeraw only mutates the struct it is given.
    unsafe { libc::cfmakeraw(&mut raw) };
    set_attrs(fd, &raw)?;
    Ok(ModeToken { saved })
}

/// Restores the mode captured in `token`. `None` is a no-op.
pub fn restore(fd: RawFd, token: Option<&ModeToken>) -> Result<(), ModeError> {
    match token {
        Some(token) => set_attrs(fd, &token.saved),
        None => Ok(()),
    }
}

/// Returns `(cols, rows)` for the terminal behind `fd`.
pub fn size(fd: RawFd) -> Result<(u16, u16), ModeError> {
    let mut ws = MaybeUninit::<libc::winsize>::zeroed();
    // SAFETY: TIOCGWINSZ writes a winsize into the provided pointer.
    if unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, ws.as_mut_ptr()) } != 0 {
        return Err(ModeError::Size(io::Error::last_os_error()));
    }
    // SAFETY: zero-initialised and then filled by the kernel.
    let ws = unsafe { ws.assume_init() };
    Ok((ws.ws_col, ws.ws_row))
}

/// Terminal type advertised to the agent.
pub fn term_type() -> String {
    std::env::var("TERM")
        .ok()
        .filter(|term| !term.is_empty() && term != "dumb")
        .unwrap_or_else(|| FALLBACK_TERM.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use portable_pty::{PtySize, native_pty_system};

    fn pipe_read_end() -> (RawFd, RawFd) {
        let mut fds = [0; 2];
        // SAFETY: test-only pipe creation.
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        (fds[0], fds[1])
    }

    fn close(fd: RawFd) {
        // SAFETY: test-only close of a descriptor we own.
        unsafe { libc::close(fd) };
    }

    #[test]
    fn test_pipe_is_not_a_terminal() {
        let (read, write) = pipe_read_end();
        assert!(!is_terminal(read));
        assert!(matches!(
            enter_raw(read),
            Err(ModeError::NotATerminal { fd }) if fd == read
        ));
        assert!(matches!(size(read), Err(ModeError::Size(_))));
        close(read);
        close(write);
    }

    #[test]
    fn test_restore_without_token_is_noop() {
        let (read, write) = pipe_read_end();
        assert!(restore(read, None).is_ok());
        close(read);
        close(write);
    }

    #[test]
    fn test_raw_round_trip_on_pty() {
        let pair = native_pty_system()
            .openpty(PtySize {
                rows: 24,
                cols: 80,
                pixel_width: 0,
                pixel_height: 0,
            })
            .unwrap();
        let fd = pair.master.as_raw_fd().unwrap();
        assert!(is_terminal(fd));

        let before = get_attrs(fd).unwrap();
        assert_ne!(before.c_lflag & libc::ICANON, 0);

        let token = enter_raw(fd).unwrap();
        let raw = get_attrs(fd).unwrap();
        assert_eq!(raw.c_lflag & libc::ICANON, 0);
        assert_eq!(raw.c_lflag & libc::ECHO, 0);

        restore(fd, Some(&token)).unwrap();
        let after = get_attrs(fd).unwrap();
        assert_eq!(after.c_lflag, before.c_lflag);

        assert_eq!(size(fd).unwrap(), (80, 24));
    }

    #[test]
    fn test_term_type_never_empty() {
        assert!(!term_type().is_empty());
    }
}
