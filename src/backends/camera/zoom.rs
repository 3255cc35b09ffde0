// SPDX-License-Identifier: GPL-3.0-only

//! Zoom level calculation
//!
//! Devices describe zoom with loosely formatted strings. All arithmetic
//! here is in tenths of a zoom factor (27 = 2.7x). Parsing failures are
//! logged and the affected rule is skipped; they never produce a zoom
//! value the device did not advertise.

use super::types::ZoomCapabilities;
use crate::constants::zoom::{DIRECTION_STEP_TENTHS, MIN_TENTHS};
use tracing::{debug, warn};

/// What to do with the device zoom
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDecision {
    /// Leave zoom alone, the device does not take it
    Unsupported,
    /// Apply this level, in tenths
    Apply(u32),
}

impl ZoomDecision {
    pub fn tenths(&self) -> Option<u32> {
        match self {
            ZoomDecision::Unsupported => None,
            ZoomDecision::Apply(t) => Some(*t),
        }
    }
}

/// Whether the capabilities allow zoom at all
///
/// An explicit `supported` flag other than `true` disables zoom. Without
/// any limit or value list there is nothing to drive the device with
/// either.
pub fn zoom_supported(caps: &ZoomCapabilities) -> bool {
    if let Some(flag) = &caps.supported
        && !flag.trim().eq_ignore_ascii_case("true")
    {
        return false;
    }
    caps.max_zoom.is_some() || caps.zoom_values.is_some() || caps.taking_picture_zoom_max.is_some()
}

/// Compute the zoom level to apply for a desired level
///
/// Rules apply strictly in order: device max, picture-taking max,
/// snap to the allowed values list, round down to the step size.
pub fn compute_zoom(desired_tenths: u32, caps: &ZoomCapabilities) -> ZoomDecision {
    if !zoom_supported(caps) {
        debug!(?caps, "Zoom unsupported");
        return ZoomDecision::Unsupported;
    }

    let mut tenths = clamp_to_limits(desired_tenths, caps);

    if let Some(values) = &caps.zoom_values {
        tenths = snap_to_values(tenths, values);
    }

    if let Some(step) = &caps.zoom_step {
        tenths = round_to_step(tenths, step);
    }

    debug!(desired_tenths, tenths, "Computed zoom");
    ZoomDecision::Apply(tenths)
}

/// Move one step from `current` towards more or less zoom
///
/// With an allowed values list the next listed value in that direction is
/// taken. Otherwise the level moves by a fixed step. The result passes
/// through [`compute_zoom`] so device limits still hold.
pub fn step_zoom(current_tenths: u32, increase: bool, caps: &ZoomCapabilities) -> ZoomDecision {
    if !zoom_supported(caps) {
        return ZoomDecision::Unsupported;
    }

    let listed = caps.zoom_values.as_deref().and_then(parse_values);
    let desired = match listed {
        Some(values) => {
            let next = if increase {
                values.iter().copied().filter(|v| *v > current_tenths).min()
            } else {
                values.iter().copied().filter(|v| *v < current_tenths).max()
            };
            next.unwrap_or(current_tenths)
        }
        None if increase => current_tenths + DIRECTION_STEP_TENTHS,
        None => current_tenths
            .saturating_sub(DIRECTION_STEP_TENTHS)
            .max(MIN_TENTHS),
    };

    compute_zoom(desired, caps)
}

fn clamp_to_limits(desired: u32, caps: &ZoomCapabilities) -> u32 {
    let mut tenths = desired;

    if let Some(max) = &caps.max_zoom {
        match max.trim().parse::<f64>() {
            Ok(v) => tenths = tenths.min((10.0 * v) as u32),
            Err(_) => warn!(value = %max, "Bad max-zoom"),
        }
    }

    if let Some(max) = &caps.taking_picture_zoom_max {
        match max.trim().parse::<u32>() {
            Ok(v) => tenths = tenths.min(v),
            Err(_) => warn!(value = %max, "Bad taking-picture-zoom-max"),
        }
    }

    tenths
}

/// Snap to the nearest listed value; any malformed entry keeps `tenths`
fn snap_to_values(tenths: u32, values: &str) -> u32 {
    let Some(parsed) = parse_values(values) else {
        warn!(values, "Bad zoom values list, keeping {}", tenths);
        return tenths;
    };

    let mut best: Option<u32> = None;
    for value in parsed {
        let closer = match best {
            None => true,
            Some(b) => tenths.abs_diff(value) < tenths.abs_diff(b),
        };
        if closer {
            best = Some(value);
        }
    }
    best.unwrap_or(tenths)
}

fn parse_values(values: &str) -> Option<Vec<u32>> {
    if values.trim().is_empty() {
        return Some(Vec::new());
    }
    values
        .split(',')
        .map(|v| {
            let factor = v.trim().parse::<f64>().ok()?;
            (factor.is_finite() && factor >= 0.0).then(|| (factor * 10.0).round() as u32)
        })
        .collect()
}

fn round_to_step(tenths: u32, step: &str) -> u32 {
    match step.trim().parse::<f64>() {
        Ok(v) => {
            let step_tenths = (10.0 * v) as u32;
            if step_tenths > 1 {
                tenths - tenths % step_tenths
            } else {
                tenths
            }
        }
        Err(_) => {
            warn!(value = %step, "Bad zoom step");
            tenths
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::zoom::DESIRED_TENTHS;

    fn caps() -> ZoomCapabilities {
        ZoomCapabilities {
            supported: Some("true".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_clamped_to_max_zoom() {
        let c = ZoomCapabilities {
            max_zoom: Some("5.0".into()),
            ..caps()
        };
        let z = compute_zoom(DESIRED_TENTHS, &c).tenths().unwrap();
        assert!(z <= 50, "zoom {} exceeds device max", z);
        assert_eq!(z, 27);

        let small = ZoomCapabilities {
            max_zoom: Some("2.0".into()),
            ..caps()
        };
        assert_eq!(compute_zoom(27, &small), ZoomDecision::Apply(20));
    }

    #[test]
    fn test_picture_max_applies_after_device_max() {
        let c = ZoomCapabilities {
            max_zoom: Some("4.0".into()),
            taking_picture_zoom_max: Some("22".into()),
            ..caps()
        };
        assert_eq!(compute_zoom(27, &c), ZoomDecision::Apply(22));
    }

    #[test]
    fn test_snaps_to_nearest_value() {
        let c = ZoomCapabilities {
            zoom_values: Some("1,2,3".into()),
            ..caps()
        };
        assert_eq!(compute_zoom(27, &c), ZoomDecision::Apply(30));
        assert_eq!(compute_zoom(14, &c), ZoomDecision::Apply(10));
    }

    #[test]
    fn test_decimal_values_are_factors() {
        let c = ZoomCapabilities {
            zoom_values: Some("1.0, 1.5, 2.0, 3.0".into()),
            ..caps()
        };
        assert_eq!(compute_zoom(27, &c), ZoomDecision::Apply(30));
        assert_eq!(compute_zoom(17, &c), ZoomDecision::Apply(15));
        assert_eq!(step_zoom(15, true, &c), ZoomDecision::Apply(20));
    }

    #[test]
    fn test_malformed_values_keep_prior() {
        let c = ZoomCapabilities {
            max_zoom: Some("2.5".into()),
            zoom_values: Some("1,abc,3".into()),
            ..caps()
        };
        // Clamped to 25 first, the snap is skipped
        assert_eq!(compute_zoom(27, &c), ZoomDecision::Apply(25));
    }

    #[test]
    fn test_rounds_down_to_step() {
        let c = ZoomCapabilities {
            max_zoom: Some("8.0".into()),
            zoom_step: Some("0.5".into()),
            ..caps()
        };
        assert_eq!(compute_zoom(27, &c), ZoomDecision::Apply(25));

        // Step of 0.1 is not > 1 tenth, no rounding
        let fine = ZoomCapabilities {
            zoom_step: Some("0.1".into()),
            ..c
        };
        assert_eq!(compute_zoom(27, &fine), ZoomDecision::Apply(27));
    }

    #[test]
    fn test_unsupported() {
        let off = ZoomCapabilities {
            supported: Some("false".into()),
            max_zoom: Some("4.0".into()),
            ..Default::default()
        };
        assert_eq!(compute_zoom(27, &off), ZoomDecision::Unsupported);
        assert_eq!(compute_zoom(27, &ZoomCapabilities::default()), ZoomDecision::Unsupported);

        // No explicit flag but a limit is enough
        let implicit = ZoomCapabilities {
            max_zoom: Some("4.0".into()),
            ..Default::default()
        };
        assert_eq!(compute_zoom(27, &implicit), ZoomDecision::Apply(27));
    }

    #[test]
    fn test_bad_max_zoom_is_ignored() {
        let c = ZoomCapabilities {
            max_zoom: Some("lots".into()),
            ..caps()
        };
        assert_eq!(compute_zoom(27, &c), ZoomDecision::Apply(27));
    }

    #[test]
    fn test_step_direction_with_values() {
        let c = ZoomCapabilities {
            zoom_values: Some("1,2,3".into()),
            ..caps()
        };
        assert_eq!(step_zoom(20, true, &c), ZoomDecision::Apply(30));
        assert_eq!(step_zoom(20, false, &c), ZoomDecision::Apply(10));
        assert_eq!(step_zoom(30, true, &c), ZoomDecision::Apply(30));
    }

    #[test]
    fn test_step_direction_without_values() {
        let c = ZoomCapabilities {
            max_zoom: Some("3.0".into()),
            ..caps()
        };
        assert_eq!(step_zoom(20, true, &c), ZoomDecision::Apply(25));
        assert_eq!(step_zoom(28, true, &c), ZoomDecision::Apply(30));
        assert_eq!(step_zoom(12, false, &c), ZoomDecision::Apply(10));
    }
}
