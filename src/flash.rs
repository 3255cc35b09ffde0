// SPDX-License-Identifier: GPL-3.0-only

//! Torch LEDs via Linux sysfs
//!
//! Used when the capture device itself has no flash control. LEDs are
//! found under `/sys/class/leds/*:flash` (and `*:torch`) and driven
//! through their `brightness` file, which does not need root.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const LEDS_DIR: &str = "/sys/class/leds";

/// A writable LED usable as a torch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorchLed {
    /// Sysfs directory, e.g. `/sys/class/leds/white:flash`
    path: PathBuf,
    max_brightness: u32,
    name: String,
}

impl TorchLed {
    /// Find writable torch LEDs, sorted by name
    pub fn discover() -> Vec<TorchLed> {
        Self::discover_in(Path::new(LEDS_DIR))
    }

    /// Scan a directory laid out like `/sys/class/leds`
    pub fn discover_in(leds_dir: &Path) -> Vec<TorchLed> {
        let Ok(entries) = std::fs::read_dir(leds_dir) else {
            debug!(dir = %leds_dir.display(), "No LED class directory, torch fallback disabled");
            return Vec::new();
        };

        let mut leds: Vec<TorchLed> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                if !(name.ends_with(":flash") || name.ends_with(":torch")) {
                    return None;
                }
                Self::from_sysfs(entry.path(), name)
            })
            .collect();

        leds.sort_by(|a, b| a.name.cmp(&b.name));
        leds
    }

    fn from_sysfs(path: PathBuf, name: String) -> Option<TorchLed> {
        let max_path = path.join("max_brightness");
        let max_brightness = match std::fs::read_to_string(&max_path) {
            Ok(s) => match s.trim().parse::<u32>() {
                Ok(v) if v > 0 => v,
                _ => {
                    warn!(path = %max_path.display(), "Invalid max_brightness value");
                    return None;
                }
            },
            Err(e) => {
                warn!(path = %max_path.display(), error = %e, "Cannot read max_brightness");
                return None;
            }
        };

        let brightness_path = path.join("brightness");
        if let Err(e) = std::fs::OpenOptions::new().write(true).open(&brightness_path) {
            warn!(
                path = %brightness_path.display(),
                error = %e,
                "Torch LED found but brightness is not writable"
            );
            return None;
        }

        info!(name = %name, max_brightness, "Discovered torch LED");
        Some(TorchLed {
            path,
            max_brightness,
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set raw brightness; clamped to the LED's maximum
    pub fn set_brightness(&self, value: u32) -> io::Result<()> {
        let clamped = value.min(self.max_brightness);
        std::fs::write(self.path.join("brightness"), clamped.to_string())
    }

    /// Switch fully on or off
    pub fn set(&self, on: bool) -> io::Result<()> {
        self.set_brightness(if on { self.max_brightness } else { 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_led(dir: &Path, name: &str, max: &str) -> PathBuf {
        let led = dir.join(name);
        std::fs::create_dir(&led).unwrap();
        std::fs::write(led.join("max_brightness"), max).unwrap();
        std::fs::write(led.join("brightness"), "0").unwrap();
        led
    }

    #[test]
    fn test_discovers_flash_and_torch_entries() {
        let dir = tempfile::tempdir().unwrap();
        fake_led(dir.path(), "yellow:flash", "255\n");
        fake_led(dir.path(), "white:torch", "100\n");
        fake_led(dir.path(), "green:status", "1\n");

        let names: Vec<_> = TorchLed::discover_in(dir.path())
            .iter()
            .map(|l| l.name().to_string())
            .collect();
        assert_eq!(names, vec!["white:torch", "yellow:flash"]);
    }

    #[test]
    fn test_invalid_max_brightness_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fake_led(dir.path(), "white:flash", "0");
        assert!(TorchLed::discover_in(dir.path()).is_empty());
    }

    #[test]
    fn test_set_writes_clamped_brightness() {
        let dir = tempfile::tempdir().unwrap();
        let path = fake_led(dir.path(), "white:flash", "128");
        let led = TorchLed::discover_in(dir.path()).remove(0);

        led.set(true).unwrap();
        assert_eq!(std::fs::read_to_string(path.join("brightness")).unwrap(), "128");
        led.set_brightness(999).unwrap();
        assert_eq!(std::fs::read_to_string(path.join("brightness")).unwrap(), "128");
        led.set(false).unwrap();
        assert_eq!(std::fs::read_to_string(path.join("brightness")).unwrap(), "0");
    }

    #[test]
    fn test_missing_directory() {
        assert!(TorchLed::discover_in(Path::new("/nonexistent/leds")).is_empty());
    }
}
