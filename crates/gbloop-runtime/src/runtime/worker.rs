use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

/// Bounded wait for a worker to acknowledge a stop request.
pub(crate) const ACK_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Default)]
struct Signals {
    stop: Mutex<bool>,
    stop_cv: Condvar,
    acked: Mutex<bool>,
    ack_cv: Condvar,
}

impl Signals {
    fn request_stop(&self) {
        let mut stop = self.stop.lock();
        *stop = true;
        self.stop_cv.notify_all();
    }

    fn acknowledge(&self) {
        let mut acked = self.acked.lock();
        *acked = true;
        self.ack_cv.notify_all();
    }

    fn wait_ack(&self, timeout: Duration) -> bool {
        let mut acked = self.acked.lock();
        if !*acked {
            self.ack_cv.wait_while_for(&mut acked, |acked| !*acked, timeout);
        }
        *acked
    }
}

/// Handed to the worker body. Dropping it acknowledges the stop request, so
/// a body that returns (or unwinds) always unblocks the coordinator.
pub struct WorkerContext {
    signals: Arc<Signals>,
}

impl WorkerContext {
    pub fn should_run(&self) -> bool {
        !*self.signals.stop.lock()
    }

    /// Sleeps for `period` or until a stop is requested.
    ///
    /// Returns whether the worker should keep running.
    pub fn sleep(&self, period: Duration) -> bool {
        let mut stop = self.signals.stop.lock();
        if !*stop {
            self.signals
                .stop_cv
                .wait_while_for(&mut stop, |stop| !*stop, period);
        }
        !*stop
    }
}

impl Drop for WorkerContext {
    fn drop(&mut self) {
        self.signals.acknowledge();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The worker acknowledged and was joined.
    Acknowledged,
    /// The acknowledgement timed out; the thread was left to finish alone.
    Detached,
}

/// A long-lived background thread with a stop flag and an acknowledgement.
pub struct WorkerHandle {
    name: &'static str,
    signals: Arc<Signals>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn spawn<F>(name: &'static str, body: F) -> io::Result<Self>
    where
        F: FnOnce(WorkerContext) + Send + 'static,
    {
        let signals = Arc::new(Signals::default());
        let ctx = WorkerContext {
            signals: Arc::clone(&signals),
        };
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(ctx))?;

        Ok(Self {
            name,
            signals,
            join: Some(join),
        })
    }

    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|join| !join.is_finished())
    }

    pub fn request_stop(&self) {
        self.signals.request_stop();
    }

    /// Requests a stop and waits up to `timeout` for the acknowledgement.
    pub fn shutdown(mut self, timeout: Duration) -> ShutdownOutcome {
        self.signals.request_stop();

        if !self.signals.wait_ack(timeout) {
            warn!(worker = self.name, ?timeout, "worker did not acknowledge stop, detaching");
            self.join.take();
            return ShutdownOutcome::Detached;
        }

        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!(worker = self.name, "worker panicked");
            }
        }
        debug!(worker = self.name, "worker joined");
        ShutdownOutcome::Acknowledged
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.signals.request_stop();
    }
}
