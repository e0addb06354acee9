//! One agent run, from session row to final status.

use std::fs::File;
use std::io;
use std::io::Read;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cmt_common::CmtConfig;
use cmt_store::Session;
use cmt_store::SessionStatus;
use cmt_store::SessionStore;
use cmt_store::StoreError;
use cmt_store::TmuxLocation;
use cmt_terminal::AgentExit;
use cmt_terminal::Location;
use cmt_terminal::Multiplexer;
use cmt_terminal::PtyError;
use cmt_terminal::PtySession;
use cmt_terminal::PtySpawn;
use crossbeam_channel as channel;
use tracing::debug;
use tracing::info;
use tracing::warn;
use uuid::Uuid;

use crate::activity::ActivityMonitor;
use crate::activity::StatusSink;
use crate::command::RunOptions;
use crate::command::build_args;
use crate::error::RunError;
use crate::host::ProcessGroupSignals;
use crate::host::StdinTerminal;
use crate::signals::SignalListener;
use crate::suspend::SuspendCoordinator;
use crate::suspend::TerminalControl;

const READ_BUFFER_SIZE: usize = 4096;
const SESSION_ID_LEN: usize = 8;
/// How long to keep draining agent output after it exits.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// The host side of a run: where input comes from and output goes.
pub struct HostIo {
    pub input: Box<dyn Read + Send>,
    pub output: Box<dyn Write + Send>,
    pub terminal: StdinTerminal,
}

impl HostIo {
    pub fn stdio() -> Self {
        Self {
            input: Box::new(io::stdin()),
            output: Box::new(io::stdout()),
            terminal: StdinTerminal::stdin(),
        }
    }

    /// Non-interactive host; Ctrl+Z bytes are passed through.
    pub fn piped(input: impl Read + Send + 'static, output: impl Write + Send + 'static) -> Self {
        Self {
            input: Box::new(input),
            output: Box::new(output),
            terminal: StdinTerminal::detached(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub session_id: String,
    pub exit: AgentExit,
}

pub struct Runner {
    store: Arc<SessionStore>,
    config: CmtConfig,
    multiplexer: Arc<dyn Multiplexer>,
}

impl Runner {
    pub fn new(store: Arc<SessionStore>, config: CmtConfig, multiplexer: Arc<dyn Multiplexer>) -> Self {
        Self {
            store,
            config,
            multiplexer,
        }
    }

    pub fn config(&self) -> &CmtConfig {
        &self.config
    }

    /// Runs the agent to completion.
    ///
    /// Nothing is recorded if the tmux precondition fails. Once the session
    /// row exists it ends `completed` or `abandoned`, unless it was killed or
    /// trashed while the agent ran.
    pub fn run(&self, options: &RunOptions, host: HostIo) -> Result<RunOutcome, RunError> {
        let location = self
            .multiplexer
            .current_location()
            .map_err(RunError::Multiplexer)?;
        let working_dir = match &options.working_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().map_err(RunError::WorkingDirectory)?,
        };
        self.config.ensure_output_dir()?;

        let session = self.new_session(options, working_dir, location);
        self.store.create(&session)?;

        let outcome = match self.execute(&session, options, host) {
            Ok(exit) if exit.success => Ok(exit),
            Ok(exit) => Err(RunError::AgentExit { code: exit.code }),
            Err(err) => Err(err),
        };
        let final_status = if outcome.is_ok() {
            SessionStatus::Completed
        } else {
            SessionStatus::Abandoned
        };
        self.finish(&session.id, final_status, outcome)
            .map(|exit| RunOutcome {
                session_id: session.id,
                exit,
            })
    }

    /// Records how the run ended, unless the session was already ended
    /// from outside (killed or trashed), in which case that wins.
    fn finish(
        &self,
        session_id: &str,
        status: SessionStatus,
        outcome: Result<AgentExit, RunError>,
    ) -> Result<AgentExit, RunError> {
        let recorded = match self.store.update_running_status(session_id, status) {
            Ok(recorded) => recorded,
            Err(source) => {
                return Err(match outcome {
                    Ok(_) => RunError::Store(source),
                    Err(cause) => RunError::Unrecorded {
                        cause: Box::new(cause),
                        source,
                    },
                });
            }
        };
        if !recorded {
            let current = self
                .store
                .get(session_id)?
                .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
            info!(session_id, status = %current.status, "Session ended outside the run");
            return Err(RunError::Superseded {
                id: session_id.to_string(),
                status: current.status,
            });
        }
        info!(session_id, %status, "Session finished");
        outcome
    }

    fn new_session(&self, options: &RunOptions, working_dir: PathBuf, location: Location) -> Session {
        let id: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(SESSION_ID_LEN)
            .collect();
        let output_file = self.config.transcript_path(&id);
        Session::new(
            id,
            options.command.workflow(),
            working_dir,
            TmuxLocation {
                session: location.session,
                window: location.window,
                pane: location.pane,
            },
            output_file,
        )
        .with_task(options.task.clone())
        .with_prefix(self.config.prefix())
        .with_agent_session_id(
            options
                .resume
                .as_ref()
                .and_then(|target| target.agent_session_id())
                .map(str::to_string),
        )
    }

    fn execute(&self, session: &Session, options: &RunOptions, host: HostIo) -> Result<AgentExit, RunError> {
        let args = build_args(options, self.config.comment_tag());
        let mut spawn = PtySpawn::new(self.config.agent_program(), args)
            .cwd(&session.working_directory)
            .env("CMT_SESSION_ID", &session.id);
        if let Ok((cols, rows)) = host.terminal.size() {
            spawn = spawn.size(cols, rows);
        }

        let mut pty = PtySession::spawn(&spawn)?;
        let child_pid = pty.pid();
        if let Some(pid) = child_pid {
            self.store.update_pid(&session.id, pid)?;
        }
        info!(session_id = %session.id, pid = ?child_pid, "Agent started");

        let sink: Arc<dyn StatusSink> = self.store.clone();
        let monitor = Arc::new(ActivityMonitor::new(session.id.clone(), sink));
        monitor.start()?;

        let result = attach(&mut pty, &session.output_file, host, Arc::clone(&monitor));
        let stopped = monitor.stop();
        let exit = result?;
        stopped?;
        Ok(exit)
    }
}

/// Wires the host to the agent until the agent exits.
fn attach(
    pty: &mut PtySession,
    transcript_path: &std::path::Path,
    host: HostIo,
    monitor: Arc<ActivityMonitor>,
) -> Result<AgentExit, RunError> {
    let transcript = File::create(transcript_path).map_err(|source| RunError::Transcript {
        path: transcript_path.to_path_buf(),
        source,
    })?;

    let coordinator = Arc::new(SuspendCoordinator::engage(
        host.terminal,
        ProcessGroupSignals,
        pty.resizer(),
        pty.pid(),
    )?);
    let listener = SignalListener::spawn(coordinator.clone())?;

    let reader = pty.take_reader().ok_or_else(|| PtyError::Open {
        reason: "PTY reader already taken".to_string(),
    })?;
    let mut writer = pty.take_writer().ok_or_else(|| PtyError::Open {
        reason: "PTY writer already taken".to_string(),
    })?;

    let output_done = spawn_output_copy(reader, host.output, transcript, monitor)?;

    let input_coordinator = Arc::clone(&coordinator);
    let mut input = host.input;
    // Left detached: a blocking stdin read cannot be interrupted.
    thread::Builder::new()
        .name("cmt-stdin".to_string())
        .spawn(move || {
            let mut buf = [0u8; READ_BUFFER_SIZE];
            loop {
                let n = match input.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        debug!(error = %e, "Host input closed");
                        break;
                    }
                };
                if let Err(err) =
                    input_coordinator.forward_input(&buf[..n], |data| writer.send(data))
                {
                    debug!(error = %err, "Agent input closed");
                    break;
                }
            }
        })
        .map_err(|source| RunError::Thread {
            what: "input copy",
            source,
        })?;

    let waited = pty.wait();
    let copied = match output_done.recv_timeout(OUTPUT_DRAIN_TIMEOUT) {
        Ok(copied) => copied,
        Err(_) => {
            debug!("Agent output still open after exit");
            Ok(())
        }
    };

    drop(listener);
    let released = coordinator.release();
    let exit = waited?;
    released?;
    copied?;
    debug!(code = exit.code, success = exit.success, "Agent exited");
    Ok(exit)
}

/// PTY output to host output and transcript. At EOF, `done` carries the
/// first write error; copying continues to whichever side still works.
fn spawn_output_copy(
    mut reader: Box<dyn Read + Send>,
    mut output: Box<dyn Write + Send>,
    mut transcript: File,
    monitor: Arc<ActivityMonitor>,
) -> Result<channel::Receiver<Result<(), RunError>>, RunError> {
    let (done_tx, done_rx) = channel::bounded(1);
    thread::Builder::new()
        .name("cmt-pty-output".to_string())
        .spawn(move || {
            let mut buf = [0u8; READ_BUFFER_SIZE];
            let mut output_ok = true;
            let mut transcript_ok = true;
            let mut first_error: Option<RunError> = None;
            loop {
                let n = match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    // EIO once the agent side of the PTY is gone.
                    Err(e) => {
                        debug!(error = %e, "Agent output closed");
                        break;
                    }
                };
                monitor.on_output();
                let chunk = &buf[..n];
                if output_ok {
                    if let Err(source) = output.write_all(chunk).and_then(|()| output.flush()) {
                        warn!(error = %source, "Host output write failed");
                        output_ok = false;
                        first_error.get_or_insert(RunError::Output {
                            target: "host output",
                            source,
                        });
                    }
                }
                if transcript_ok {
                    if let Err(source) = transcript.write_all(chunk) {
                        warn!(error = %source, "Transcript write failed");
                        transcript_ok = false;
                        first_error.get_or_insert(RunError::Output {
                            target: "transcript",
                            source,
                        });
                    }
                }
            }
            if transcript_ok {
                if let Err(source) = transcript.flush() {
                    first_error.get_or_insert(RunError::Output {
                        target: "transcript",
                        source,
                    });
                }
            }
            let _ = done_tx.send(first_error.map_or(Ok(()), Err));
        })
        .map_err(|source| RunError::Thread {
            what: "output copy",
            source,
        })?;
    Ok(done_rx)
}
