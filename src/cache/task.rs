//! Periodic Background Tasks
//!
//! A named thread that runs a closure on a fixed interval until stopped.
//! Used by the expiring cache's sweep and the registry monitor.
//!
//! # Design
//!
//! - `crossbeam` ticker plus a stop channel drive the loop
//! - A panicking cycle is caught and logged; the task keeps running
//! - `stop()` is idempotent and joins the thread; `Drop` calls it

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::error::{Error, Result};

/// Handle owning a periodic background thread
pub struct PeriodicTask {
    name: String,
    interval: Duration,
    stop_tx: Mutex<Option<Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicTask {
    /// Spawn a thread running `tick` every `interval`.
    ///
    /// The first cycle runs one interval after spawning.
    pub fn spawn<F>(name: impl Into<String>, interval: Duration, mut tick: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        if interval.is_zero() {
            return Err(Error::InvalidConfig(
                "task interval must be greater than 0".to_string(),
            ));
        }

        let name = name.into();
        let task_name = name.clone();
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);

        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            let ticker = channel::tick(interval);
            loop {
                crossbeam::select! {
                    // Fires on an explicit signal or when the sender is dropped
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(&mut tick)) {
                            error!(
                                task = %task_name,
                                "Periodic task cycle failed: {}",
                                panic_message(payload.as_ref())
                            );
                        }
                    }
                }
            }
            debug!(task = %task_name, "Periodic task stopped");
        })?;

        debug!(task = %name, ?interval, "Periodic task started");

        Ok(Self {
            name,
            interval,
            stop_tx: Mutex::new(Some(stop_tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Task name (also the thread name)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interval between cycles
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Check if the task has not been stopped yet
    pub fn is_running(&self) -> bool {
        self.stop_tx.lock().is_some()
    }

    /// Stop the task and wait for the running cycle to finish.
    ///
    /// Returns `true` on the call that actually stopped it; later calls are
    /// no-ops returning `false`.
    pub fn stop(&self) -> bool {
        let Some(stop_tx) = self.stop_tx.lock().take() else {
            return false;
        };
        // Receiver may already be gone if the thread died; either way it exits
        let _ = stop_tx.send(());
        drop(stop_tx);

        if let Some(handle) = self.handle.lock().take() {
            // Stopping from inside a cycle must not join itself
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                error!(task = %self.name, "Periodic task thread panicked");
            }
        }
        true
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for PeriodicTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_zero_interval_rejected() {
        let result = PeriodicTask::spawn("zero", Duration::ZERO, || {});
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_runs_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let task = PeriodicTask::spawn("counter", Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert!(task.is_running());
        assert_eq!(task.name(), "counter");
        thread::sleep(Duration::from_millis(60));

        assert!(task.stop());
        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop > 0);

        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_stop_exactly_once() {
        let task = PeriodicTask::spawn("once", Duration::from_millis(5), || {}).unwrap();
        assert!(task.stop());
        assert!(!task.stop());
        assert!(!task.is_running());
    }

    #[test]
    fn test_panicking_cycle_keeps_task_alive() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let task = PeriodicTask::spawn("flaky", Duration::from_millis(5), move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first cycle fails");
            }
        })
        .unwrap();

        thread::sleep(Duration::from_millis(60));
        task.stop();
        assert!(count.load(Ordering::SeqCst) > 1);
    }

    #[test]
    fn test_drop_stops_thread() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        {
            let _task = PeriodicTask::spawn("dropped", Duration::from_millis(5), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
            thread::sleep(Duration::from_millis(20));
        }
        let after_drop = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), after_drop);
    }
}
