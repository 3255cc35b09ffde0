// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Session timing
pub mod timing {
    use super::Duration;

    /// Close an idle session after this long without activity
    pub const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

    /// Delay before the pipeline is re-armed in continuous mode
    pub const DEFAULT_REARM_DELAY_MS: u64 = 1500;

    /// Longest accepted re-arm delay
    pub const MAX_REARM_DELAY_MS: u64 = 60_000;

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// Pipeline playing state timeout on start
    pub const START_TIMEOUT_SECS: u64 = 5;

    /// Pipeline state change timeout on stop
    pub const STOP_TIMEOUT_SECS: u64 = 2;

    /// Frame interval for the still-image camera (about 30 fps)
    pub const STILL_IMAGE_FRAME_INTERVAL: Duration = Duration::from_millis(33);
}

/// Zoom numerics, all in tenths of a zoom factor
pub mod zoom {
    /// Zoom applied on open (2.7x)
    pub const DESIRED_TENTHS: u32 = 27;

    /// Change per zoom-in/zoom-out request
    pub const DIRECTION_STEP_TENTHS: u32 = 5;

    /// Never zoom out past 1.0x
    pub const MIN_TENTHS: u32 = 10;
}

/// On-screen framing rectangle limits
pub mod framing {
    /// Numerator and denominator of the screen fraction the rect covers
    pub const SCREEN_FRACTION: (u32, u32) = (5, 8);

    pub const MIN_SIDE: u32 = 240;

    pub const MAX_SIDE: u32 = 1200;
}

/// Viewfinder overlay drawing
pub mod overlay {
    use super::Duration;

    /// Repaint interval, independent of camera frames
    pub const ANIMATION_DELAY: Duration = Duration::from_millis(80);

    /// Scan line sweep from top to bottom
    pub const LASER_CYCLE: Duration = Duration::from_millis(2500);

    /// Candidate points kept before trimming
    pub const MAX_RESULT_POINTS: usize = 20;

    /// Alpha for points from the most recent batch
    pub const CURRENT_POINT_OPACITY: u8 = 0xA0;

    /// Radius of a candidate point marker
    pub const POINT_SIZE: f32 = 6.0;
}

/// GStreamer pipeline settings
pub mod pipeline {
    /// Maximum buffer queue size (keep small for low latency)
    pub const MAX_BUFFERS: u32 = 2;

    /// Output pixel format for appsink; the decoder only needs luminance
    pub const OUTPUT_FORMAT: &str = "GRAY8";
}

/// Options file location, relative to the user config dir
pub mod app_info {
    pub const CONFIG_DIR: &str = "scanner";
    pub const OPTIONS_FILE: &str = "options.json";
    pub const LOG_FILE: &str = "scanner.log";
}
