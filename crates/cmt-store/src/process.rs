//! Host process probes used by recovery and session controls.

use std::io;

/// True when a process with `pid` exists and this user may signal it.
///
/// Any failure, including `EPERM`, counts as not alive.
pub fn is_process_alive(pid: i64) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs the permission and existence checks only.
    unsafe { libc::kill(pid, 0) == 0 }
}

/// Sends SIGKILL to `pid`.
pub fn kill_process(pid: u32) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    if pid <= 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "pid must be positive"));
    }
    // SAFETY: plain kill(2) on a positive pid.
    if unsafe { libc::kill(pid, libc::SIGKILL) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
