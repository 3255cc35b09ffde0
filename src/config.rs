// SPDX-License-Identifier: GPL-3.0-only

//! Scan options accepted at session start
//!
//! Options come from an optional JSON file in the user config dir and are
//! overridden by command line flags. Invalid values never reach the
//! session: [`ScanOptions::sanitize`] resets them to defaults.

use crate::backends::camera::types::{CameraSelection, Size};
use crate::constants::{app_info, timing, zoom};
use crate::errors::ConfigError;
use crate::pipelines::decode::{CharacterSet, DecodeHints};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Requested capture resolution; the screen size is used when absent
    pub capture_size: Option<Size>,
    /// Manual framing rectangle size in screen pixels
    pub frame_size: Option<Size>,
    /// Camera to open
    pub camera: CameraSelection,
    /// Character set hint for the decoder (`UTF-8`, `ISO-8859-1`)
    pub character_set: Option<String>,
    /// Keep scanning after a result instead of closing the session
    pub continuous: bool,
    /// Debounce before re-arming in continuous mode
    pub rearm_delay_ms: u64,
    /// Idle session timeout
    pub inactivity_timeout_secs: u64,
    /// Zoom applied when the camera opens, in tenths
    pub desired_zoom_tenths: u32,
    /// Attach the decoded frame to each result
    pub keep_snapshot: bool,
    /// Ring the terminal bell on each result
    pub beep_on_result: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            capture_size: None,
            frame_size: None,
            camera: CameraSelection::default(),
            character_set: None,
            continuous: false,
            rearm_delay_ms: timing::DEFAULT_REARM_DELAY_MS,
            inactivity_timeout_secs: timing::INACTIVITY_TIMEOUT.as_secs(),
            desired_zoom_tenths: zoom::DESIRED_TENTHS,
            keep_snapshot: false,
            beep_on_result: true,
        }
    }
}

impl ScanOptions {
    /// Default options file path, `~/.config/scanner/options.json` on Linux
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(app_info::CONFIG_DIR).join(app_info::OPTIONS_FILE))
    }

    /// Load options from the default path
    ///
    /// A missing file gives defaults; an unreadable or invalid file is
    /// logged and also gives defaults.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            debug!(path = %path.display(), "No options file, using defaults");
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(options) => options,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring options file");
                Self::default()
            }
        }
    }

    /// Load and sanitize options from a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let options: ScanOptions = serde_json::from_str(&text)?;
        Ok(options.sanitize())
    }

    /// Replace invalid values with defaults
    pub fn sanitize(mut self) -> Self {
        let defaults = Self::default();

        if self.capture_size.is_some_and(|s| s.is_empty()) {
            warn!(size = ?self.capture_size, "Ignoring empty capture size");
            self.capture_size = None;
        }
        if self.frame_size.is_some_and(|s| s.is_empty()) {
            warn!(size = ?self.frame_size, "Ignoring empty frame size");
            self.frame_size = None;
        }
        if let Some(name) = &self.character_set
            && CharacterSet::from_name(name).is_none()
        {
            warn!(charset = %name, "Unknown character set, using UTF-8");
            self.character_set = None;
        }
        if self.rearm_delay_ms > timing::MAX_REARM_DELAY_MS {
            warn!(delay_ms = self.rearm_delay_ms, "Re-arm delay too long, clamping");
            self.rearm_delay_ms = timing::MAX_REARM_DELAY_MS;
        }
        if self.inactivity_timeout_secs == 0 {
            self.inactivity_timeout_secs = defaults.inactivity_timeout_secs;
        }
        if self.desired_zoom_tenths < zoom::MIN_TENTHS {
            self.desired_zoom_tenths = defaults.desired_zoom_tenths;
        }
        self
    }

    /// Decoder hints derived from these options
    pub fn hints(&self) -> DecodeHints {
        DecodeHints {
            character_set: self
                .character_set
                .as_deref()
                .and_then(CharacterSet::from_name)
                .unwrap_or_default(),
        }
    }

    pub fn rearm_delay(&self) -> Duration {
        Duration::from_millis(self.rearm_delay_ms.min(timing::MAX_REARM_DELAY_MS))
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }
}
