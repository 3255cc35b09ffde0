// SPDX-License-Identifier: GPL-3.0-only

//! Scan line animation

use std::f64::consts::PI;
use std::time::{Duration, Instant};

/// Accelerate-decelerate curve on [0, 1]
pub fn ease_in_out(t: f64) -> f64 {
    ((t + 1.0) * PI).cos() / 2.0 + 0.5
}

/// Sweeps a position between two edges and back, one sweep per `cycle`
#[derive(Debug, Clone, Copy)]
pub struct LaserAnimator {
    cycle: Duration,
    started: Instant,
}

impl LaserAnimator {
    pub fn new(cycle: Duration, started: Instant) -> Self {
        Self { cycle, started }
    }

    /// Progress through the current sweep in [0, 1], top to bottom and back
    pub fn progress(&self, now: Instant) -> f64 {
        let cycle = self.cycle.as_millis().max(1);
        let elapsed = now.saturating_duration_since(self.started).as_millis() % (2 * cycle);
        let phase = elapsed as f64 / cycle as f64;
        let linear = if phase <= 1.0 { phase } else { 2.0 - phase };
        ease_in_out(linear)
    }

    /// Line position between `top` and `bottom` at `now`
    pub fn position(&self, now: Instant, top: i32, bottom: i32) -> i32 {
        let span = (bottom - top) as f64;
        top + (self.progress(now) * span).round() as i32
    }
}
