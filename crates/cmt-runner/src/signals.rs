//! SIGWINCH and SIGCONT listener for one run.

use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use signal_hook::consts::SIGCONT;
use signal_hook::consts::SIGWINCH;
use signal_hook::iterator::Handle;
use signal_hook::iterator::Signals;
use tracing::debug;
use tracing::warn;

use crate::error::RunError;
use crate::suspend::JobControl;
use crate::suspend::PtySizer;
use crate::suspend::SuspendCoordinator;
use crate::suspend::TerminalControl;

pub trait SignalTarget: Send + Sync + 'static {
    fn on_resize(&self);

    fn on_continue(&self);
}

impl<T, J, S> SignalTarget for SuspendCoordinator<T, J, S>
where
    T: TerminalControl + 'static,
    J: JobControl + 'static,
    S: PtySizer + 'static,
{
    fn on_resize(&self) {
        self.sync_size();
    }

    fn on_continue(&self) {
        if SuspendCoordinator::on_continue(self) {
            debug!("Resumed after external SIGCONT");
        }
    }
}

/// Forwards signals to a [`SignalTarget`] on a dedicated thread until dropped.
pub struct SignalListener {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalListener {
    /// Starts listening and applies one resize immediately.
    pub fn spawn(target: Arc<dyn SignalTarget>) -> Result<Self, RunError> {
        let mut signals = Signals::new([SIGWINCH, SIGCONT]).map_err(|source| RunError::Thread {
            what: "signal listener",
            source,
        })?;
        let handle = signals.handle();

        target.on_resize();

        let thread = thread::Builder::new()
            .name("cmt-signals".to_string())
            .spawn(move || {
                for signal in signals.forever() {
                    match signal {
                        SIGWINCH => target.on_resize(),
                        SIGCONT => target.on_continue(),
                        other => debug!(signal = other, "Ignoring signal"),
                    }
                }
            })
            .map_err(|source| RunError::Thread {
                what: "signal listener",
                source,
            })?;

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for SignalListener {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Signal listener panicked");
            }
        }
    }
}
