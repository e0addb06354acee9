use std::io;
use std::io::Read;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use cmt_common::mutex_lock_or_recover;
use portable_pty::Child;
use portable_pty::ChildKiller;
use portable_pty::CommandBuilder;
use portable_pty::MasterPty;
use portable_pty::PtySize;
use portable_pty::native_pty_system;
use tracing::debug;

use crate::error::PtyError;
use crate::error::SpawnErrorKind;
use crate::mode;

const DEFAULT_COLS: u16 = 80;
const DEFAULT_ROWS: u16 = 24;

/// What to run inside the pseudo-terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtySpawn {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub cols: u16,
    pub rows: u16,
}

impl PtySpawn {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: None,
            env: Vec::new(),
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
        }
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Starts at the host size when it is known; zero sizes are ignored.
    pub fn size(mut self, cols: u16, rows: u16) -> Self {
        if cols > 0 && rows > 0 {
            self.cols = cols;
            self.rows = rows;
        }
        self
    }
}

/// How the agent process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentExit {
    pub code: u32,
    pub success: bool,
}

/// A child process attached to a fresh pseudo-terminal.
///
/// The reader and writer are handed out once each so the output and input
/// copy loops can own their direction outright.
pub struct PtySession {
    master: Arc<Mutex<Box<dyn MasterPty + Send>>>,
    child: Box<dyn Child + Send + Sync>,
    reader: Option<Box<dyn Read + Send>>,
    writer: Option<Box<dyn Write + Send>>,
}

impl Drop for PtySession {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.child.kill();
        }
    }
}

impl PtySession {
    pub fn spawn(launch: &PtySpawn) -> Result<Self, PtyError> {
        let pair = native_pty_system()
            .openpty(PtySize {
                rows: launch.rows,
                cols: launch.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Open {
                reason: e.to_string(),
            })?;

        let mut cmd = CommandBuilder::new(&launch.program);
        cmd.args(&launch.args);
        if let Some(dir) = launch.cwd.as_ref() {
            cmd.cwd(dir);
        }
        cmd.env("TERM", mode::term_type());
        for (key, value) in &launch.env {
            cmd.env(key, value);
        }

        let child = pair.slave.spawn_command(cmd).map_err(|e| {
            let kind = match e.downcast_ref::<io::Error>().map(io::Error::kind) {
                Some(io::ErrorKind::NotFound) => SpawnErrorKind::NotFound,
                Some(io::ErrorKind::PermissionDenied) => SpawnErrorKind::PermissionDenied,
                _ => SpawnErrorKind::Other,
            };
            PtyError::Spawn {
                reason: format!("{}: {}", launch.program, e),
                kind,
            }
        })?;
        // The master only sees EOF once no slave descriptor is left open here.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Open {
                reason: e.to_string(),
            })?;
        let writer = pair.master.take_writer().map_err(|e| PtyError::Open {
            reason: e.to_string(),
        })?;

        debug!(
            program = %launch.program,
            pid = ?child.process_id(),
            cols = launch.cols,
            rows = launch.rows,
            "Spawned agent in PTY"
        );

        Ok(Self {
            master: Arc::new(Mutex::new(pair.master)),
            child,
            reader: Some(reader),
            writer: Some(writer),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.process_id()
    }

    pub fn is_running(&mut self) -> bool {
        self.child
            .try_wait()
            .map(|status| status.is_none())
            .unwrap_or(false)
    }

    pub fn take_reader(&mut self) -> Option<Box<dyn Read + Send>> {
        self.reader.take()
    }

    pub fn take_writer(&mut self) -> Option<PtyWriter> {
        self.writer.take().map(|inner| PtyWriter { inner })
    }

    pub fn resizer(&self) -> PtyResizer {
        PtyResizer {
            master: Arc::clone(&self.master),
        }
    }

    /// Blocks until the agent exits.
    pub fn wait(&mut self) -> Result<AgentExit, PtyError> {
        let status = self.child.wait().map_err(|e| PtyError::Wait {
            reason: e.to_string(),
            source: Some(e),
        })?;
        Ok(AgentExit {
            code: status.exit_code(),
            success: status.success(),
        })
    }
}

/// Input half of the pseudo-terminal.
pub struct PtyWriter {
    inner: Box<dyn Write + Send>,
}

impl PtyWriter {
    pub fn send(&mut self, data: &[u8]) -> Result<(), PtyError> {
        let mut offset = 0;
        while offset < data.len() {
            match self.inner.write(&data[offset..]) {
                Ok(0) => {
                    return Err(PtyError::Write {
                        reason: "write returned 0 bytes, PTY closed".to_string(),
                        source: None,
                    });
                }
                Ok(n) => offset += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(PtyError::Write {
                        reason: e.to_string(),
                        source: Some(e),
                    });
                }
            }
        }
        self.inner.flush().map_err(|e| PtyError::Write {
            reason: e.to_string(),
            source: Some(e),
        })
    }
}

/// Shared handle for resizing the pseudo-terminal from signal listeners.
#[derive(Clone)]
pub struct PtyResizer {
    master: Arc<Mutex<Box<dyn MasterPty + Send>>>,
}

impl PtyResizer {
    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        if cols == 0 || rows == 0 {
            return Ok(());
        }
        let master = mutex_lock_or_recover(&self.master);
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Resize {
                reason: e.to_string(),
            })
    }

    pub fn size(&self) -> Result<(u16, u16), PtyError> {
        let master = mutex_lock_or_recover(&self.master);
        master
            .get_size()
            .map(|size| (size.cols, size.rows))
            .map_err(|e| PtyError::Resize {
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(reader: &mut Box<dyn Read + Send>) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => out.extend_from_slice(&buf[..n]),
            }
        }
        out
    }

    #[test]
    fn test_spawn_captures_output_and_exit() {
        let launch = PtySpawn::new("/bin/sh", vec!["-c".into(), "printf hello".into()]);
        let mut session = PtySession::spawn(&launch).unwrap();
        assert!(session.pid().is_some());

        let mut reader = session.take_reader().unwrap();
        assert!(session.take_reader().is_none());

        let exit = session.wait().unwrap();
        assert!(exit.success);
        assert_eq!(exit.code, 0);

        let output = read_all(&mut reader);
        assert!(String::from_utf8_lossy(&output).contains("hello"));
    }

    #[test]
    fn test_nonzero_exit_is_reported() {
        let launch = PtySpawn::new("/bin/sh", vec!["-c".into(), "exit 3".into()]);
        let mut session = PtySession::spawn(&launch).unwrap();
        let exit = session.wait().unwrap();
        assert!(!exit.success);
        assert_eq!(exit.code, 3);
    }

    #[test]
    fn test_missing_program_fails_to_spawn() {
        let launch = PtySpawn::new("/nonexistent/cmt-agent", Vec::new());
        let err = PtySession::spawn(&launch).err().unwrap();
        assert_eq!(err.operation(), "spawn");
    }

    #[test]
    fn test_writer_feeds_child_stdin() {
        let launch = PtySpawn::new("/bin/sh", vec!["-c".into(), "read line; echo got-$line".into()]);
        let mut session = PtySession::spawn(&launch).unwrap();
        let mut reader = session.take_reader().unwrap();
        let mut writer = session.take_writer().unwrap();

        writer.send(b"ping\r").unwrap();
        session.wait().unwrap();

        let output = read_all(&mut reader);
        assert!(String::from_utf8_lossy(&output).contains("got-ping"));
    }

    #[test]
    fn test_resizer_updates_size_and_ignores_zero() {
        let launch = PtySpawn::new("/bin/sh", vec!["-c".into(), "sleep 1".into()]).size(100, 30);
        let session = PtySession::spawn(&launch).unwrap();
        let resizer = session.resizer();
        assert_eq!(resizer.size().unwrap(), (100, 30));

        resizer.resize(120, 40).unwrap();
        assert_eq!(resizer.size().unwrap(), (120, 40));

        resizer.resize(0, 0).unwrap();
        assert_eq!(resizer.size().unwrap(), (120, 40));
    }

    #[test]
    fn test_spawn_builder_keeps_defaults_for_zero_size() {
        let launch = PtySpawn::new("agent", Vec::new())
            .size(0, 0)
            .cwd("/tmp")
            .env("CMT_SESSION_ID", "abc12345");
        assert_eq!((launch.cols, launch.rows), (DEFAULT_COLS, DEFAULT_ROWS));
        assert_eq!(launch.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(launch.env, vec![("CMT_SESSION_ID".to_string(), "abc12345".to_string())]);
    }
}
