// SPDX-License-Identifier: GPL-3.0-only

//! Idle session timeout

use std::time::{Duration, Instant};
use tracing::debug;

/// Fires once a session has gone `timeout` without activity
///
/// Time is passed in explicitly so the session's pump decides when to
/// check. A paused timer never expires.
#[derive(Debug, Clone)]
pub struct InactivityTimer {
    timeout: Duration,
    last_activity: Instant,
    running: bool,
}

impl InactivityTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_activity: Instant::now(),
            running: false,
        }
    }

    /// Record activity and (re)start the countdown
    pub fn activity(&mut self, now: Instant) {
        self.last_activity = now;
        self.running = true;
    }

    /// Stop counting, e.g. while the session is paused
    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn expired(&self, now: Instant) -> bool {
        let expired = self.running && now.saturating_duration_since(self.last_activity) >= self.timeout;
        if expired {
            debug!(timeout_secs = self.timeout.as_secs(), "Inactivity timeout reached");
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_after_timeout() {
        let start = Instant::now();
        let mut timer = InactivityTimer::new(Duration::from_secs(10));
        timer.activity(start);
        assert!(!timer.expired(start + Duration::from_secs(9)));
        assert!(timer.expired(start + Duration::from_secs(10)));
    }

    #[test]
    fn test_activity_resets() {
        let start = Instant::now();
        let mut timer = InactivityTimer::new(Duration::from_secs(10));
        timer.activity(start);
        timer.activity(start + Duration::from_secs(8));
        assert!(!timer.expired(start + Duration::from_secs(15)));
        assert!(timer.expired(start + Duration::from_secs(18)));
    }

    #[test]
    fn test_paused_timer_never_expires() {
        let start = Instant::now();
        let mut timer = InactivityTimer::new(Duration::from_secs(1));
        assert!(!timer.expired(start + Duration::from_secs(5)), "not started yet");
        timer.activity(start);
        timer.pause();
        assert!(!timer.expired(start + Duration::from_secs(5)));
    }
}
