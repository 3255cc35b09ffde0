// SPDX-License-Identifier: GPL-3.0-only
//! Paced producer thread for software camera sources
//!
//! Backends without a driver thread of their own (the still-image camera)
//! run their frame production here. The loop ticks at a fixed interval
//! and stops promptly: `stop()` wakes a sleeping loop instead of waiting
//! out the interval, and returns only after the thread has exited.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Action returned by the loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a paced loop running in its own thread
///
/// # Example
///
/// ```ignore
/// let mut producer = FrameLoop::start("still-image", Duration::from_millis(33), move || {
///     sink(frame.clone());
///     LoopAction::Continue
/// });
///
/// // Later; no tick runs after this returns
/// producer.stop();
/// ```
pub struct FrameLoop {
    thread_handle: Option<JoinHandle<()>>,
    /// Dropping or sending on this wakes the loop and ends it
    stop_tx: Option<Sender<()>>,
    name: String,
}

impl FrameLoop {
    /// Start calling `tick_fn` every `interval` until stopped
    ///
    /// The first tick runs immediately. A tick that overruns the interval
    /// delays the next one rather than queueing catch-up ticks.
    pub fn start<F>(name: &str, interval: Duration, mut tick_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let name_clone = name.to_string();

        info!(name = %name, interval_ms = interval.as_millis(), "Starting frame loop");

        let thread_handle = thread::spawn(move || {
            debug!(name = %name_clone, "Frame loop thread started");
            let mut ticks: u64 = 0;

            loop {
                let tick_start = Instant::now();
                ticks += 1;
                if tick_fn() == LoopAction::Stop {
                    debug!(name = %name_clone, "Loop requested stop");
                    break;
                }

                let wait = interval.saturating_sub(tick_start.elapsed());
                match stop_rx.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        debug!(name = %name_clone, "Stop signal received");
                        break;
                    }
                }
            }

            info!(name = %name_clone, ticks, "Frame loop thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_tx: Some(stop_tx),
            name: name.to_string(),
        }
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            debug!(name = %self.name, "Requesting frame loop stop");
            // The loop may already be gone; a closed channel is fine
            let _ = tx.send(());
        }
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Frame loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Frame loop thread finished");
            }
        }
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "FrameLoop dropped, stopping loop");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_loop_stops_itself() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut producer = FrameLoop::start("test-loop", Duration::from_millis(1), move || {
            let count = counter_clone.fetch_add(1, Ordering::SeqCst);
            if count >= 4 {
                LoopAction::Stop
            } else {
                LoopAction::Continue
            }
        });

        producer.join();
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_stop_interrupts_long_interval() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut producer = FrameLoop::start("test-slow", Duration::from_secs(60), move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            LoopAction::Continue
        });
        thread::sleep(Duration::from_millis(20));

        let started = Instant::now();
        producer.stop();
        assert!(started.elapsed() < Duration::from_secs(5), "stop waited out the interval");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!producer.is_running());
    }

    #[test]
    fn test_no_ticks_after_stop() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut producer = FrameLoop::start("test-stop", Duration::from_millis(2), move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            LoopAction::Continue
        });
        thread::sleep(Duration::from_millis(30));
        producer.stop();

        let after_stop = counter.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(counter.load(Ordering::SeqCst), after_stop);
    }
}
