// SPDX-License-Identifier: GPL-3.0-only

//! Fixed-interval repaint ticks for the overlay
//!
//! The overlay repaints on its own schedule so the scan line keeps moving
//! even when the camera delivers no frames. The tick task lives on a tokio
//! runtime and is aborted when the ticker is detached or dropped.

use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

pub struct OverlayTicker {
    task: Option<JoinHandle<()>>,
}

impl OverlayTicker {
    /// Start calling `on_tick` every `interval` on `runtime`
    pub fn attach<F>(runtime: &Handle, interval: Duration, on_tick: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        debug!(interval_ms = interval.as_millis(), "Attaching overlay ticker");
        let task = runtime.spawn(async move {
            let mut ticks = tokio::time::interval(interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                on_tick();
            }
        });
        Self { task: Some(task) }
    }

    pub fn is_attached(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop ticking; no tick starts after this returns
    pub fn detach(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Detaching overlay ticker");
            task.abort();
        }
    }
}

impl Drop for OverlayTicker {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_ticks_until_detached() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&count);
        let mut ticker = OverlayTicker::attach(&Handle::current(), Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(ticker.is_attached());
        ticker.detach();
        assert!(!ticker.is_attached());

        // Let an aborted task settle before sampling
        tokio::time::sleep(Duration::from_millis(10)).await;
        let after_detach = count.load(Ordering::SeqCst);
        assert!(after_detach >= 2, "expected repeated ticks, got {}", after_detach);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_detach);
    }

    #[tokio::test]
    async fn test_drop_stops_ticks() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&count);
        let ticker = OverlayTicker::attach(&Handle::current(), Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(ticker);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let after_drop = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_drop);
    }
}
