//! Working/waiting detection from output cadence.
//!
//! Any output marks the session `working`. A ticker flips it back to
//! `waiting` once no output has arrived for [`IDLE_THRESHOLD`]. Both paths
//! take the same lock, so fresh output is always seen before the idle check
//! can call it stale.

use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use cmt_common::mutex_lock_or_recover;
use cmt_store::SessionStatus;
use cmt_store::SessionStore;
use cmt_store::StoreError;
use crossbeam_channel as channel;
use tracing::debug;
use tracing::warn;

use crate::error::RunError;

pub const IDLE_THRESHOLD: Duration = Duration::from_secs(1);
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Where status changes are pushed.
pub trait StatusSink: Send + Sync {
    fn set_status(&self, session_id: &str, status: SessionStatus) -> Result<(), StoreError>;
}

/// Only touches sessions that are still running, so a kill or trash that
/// lands mid-run is never flipped back to `waiting`.
impl StatusSink for SessionStore {
    fn set_status(&self, session_id: &str, status: SessionStatus) -> Result<(), StoreError> {
        self.update_running_status(session_id, status).map(|_| ())
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    fn elapsed(&self, start: Instant) -> Duration {
        self.now().saturating_duration_since(start)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct ActivityState {
    last_output: Instant,
    working: bool,
    stopped: bool,
    first_error: Option<StoreError>,
}

struct Inner {
    session_id: String,
    sink: Arc<dyn StatusSink>,
    clock: Arc<dyn Clock>,
    idle_threshold: Duration,
    state: Mutex<ActivityState>,
}

impl Inner {
    fn push(&self, state: &mut ActivityState, status: SessionStatus) {
        if let Err(err) = self.sink.set_status(&self.session_id, status) {
            warn!(session_id = %self.session_id, %status, error = %err, "Failed to record activity");
            state.first_error.get_or_insert(err);
        }
    }

    fn on_output(&self) {
        let mut state = mutex_lock_or_recover(&self.state);
        if state.stopped {
            return;
        }
        state.last_output = self.clock.now();
        if !state.working {
            state.working = true;
            self.push(&mut state, SessionStatus::Working);
        }
    }

    fn check_idle(&self, now: Instant) -> bool {
        let mut state = mutex_lock_or_recover(&self.state);
        if state.working && now.saturating_duration_since(state.last_output) >= self.idle_threshold
        {
            state.working = false;
            self.push(&mut state, SessionStatus::Waiting);
            return true;
        }
        false
    }
}

struct Ticker {
    cancel: channel::Sender<()>,
    handle: JoinHandle<()>,
}

/// Per-run activity tracker. Share it behind an `Arc` with the output loop.
pub struct ActivityMonitor {
    inner: Arc<Inner>,
    ticker: Mutex<Option<Ticker>>,
}

impl ActivityMonitor {
    pub fn new(session_id: impl Into<String>, sink: Arc<dyn StatusSink>) -> Self {
        Self::with_clock(session_id, sink, Arc::new(SystemClock), IDLE_THRESHOLD)
    }

    pub fn with_clock(
        session_id: impl Into<String>,
        sink: Arc<dyn StatusSink>,
        clock: Arc<dyn Clock>,
        idle_threshold: Duration,
    ) -> Self {
        let last_output = clock.now();
        Self {
            inner: Arc::new(Inner {
                session_id: session_id.into(),
                sink,
                clock,
                idle_threshold,
                state: Mutex::new(ActivityState {
                    last_output,
                    working: false,
                    stopped: false,
                    first_error: None,
                }),
            }),
            ticker: Mutex::new(None),
        }
    }

    /// Starts the idle ticker. A second call is a no-op.
    pub fn start(&self) -> Result<(), RunError> {
        let mut ticker = mutex_lock_or_recover(&self.ticker);
        if ticker.is_some() {
            return Ok(());
        }
        let (cancel, cancelled) = channel::bounded::<()>(1);
        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name("cmt-activity".to_string())
            .spawn(move || {
                let tick = channel::tick(TICK_INTERVAL);
                loop {
                    channel::select! {
                        recv(cancelled) -> _ => break,
                        recv(tick) -> _ => {
                            if inner.check_idle(inner.clock.now()) {
                                debug!(session_id = %inner.session_id, "Agent went idle");
                            }
                        }
                    }
                }
            })
            .map_err(|source| RunError::Thread {
                what: "activity monitor",
                source,
            })?;
        *ticker = Some(Ticker { cancel, handle });
        Ok(())
    }

    pub fn on_output(&self) {
        self.inner.on_output();
    }

    /// Runs one idle check as of `now`; returns true if it flipped to waiting.
    pub fn check_idle(&self, now: Instant) -> bool {
        self.inner.check_idle(now)
    }

    pub fn is_working(&self) -> bool {
        mutex_lock_or_recover(&self.inner.state).working
    }

    /// Cancels the ticker and waits for it to exit. Output seen afterwards
    /// is ignored. Safe to call repeatedly; the first store error seen during
    /// the run is returned once.
    pub fn stop(&self) -> Result<(), StoreError> {
        mutex_lock_or_recover(&self.inner.state).stopped = true;
        if let Some(ticker) = mutex_lock_or_recover(&self.ticker).take() {
            drop(ticker.cancel);
            if ticker.handle.join().is_err() {
                warn!(session_id = %self.inner.session_id, "Activity ticker panicked");
            }
        }
        match mutex_lock_or_recover(&self.inner.state).first_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for ActivityMonitor {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
