// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera control interface
//!
//! Queries and sets the two controls the scanner drives: absolute zoom
//! and the flash LED mode (for torch). Control access opens the device
//! node separately from the streaming pipeline, which V4L2 allows.

use super::types::{BackendError, BackendResult, ZoomCapabilities};
use std::fs::File;
use std::os::unix::io::AsRawFd;
use tracing::{debug, warn};

// ===== V4L2 Control Class Bases =====
const V4L2_CTRL_CLASS_CAMERA: u32 = 0x009a0000;
const V4L2_CTRL_CLASS_FLASH: u32 = 0x009c0000;

const V4L2_CID_CAMERA_CLASS_BASE: u32 = V4L2_CTRL_CLASS_CAMERA | 0x900;
const V4L2_CID_FLASH_CLASS_BASE: u32 = V4L2_CTRL_CLASS_FLASH | 0x900;

// ===== V4L2 Control IDs =====

/// Absolute zoom, device units
pub const V4L2_CID_ZOOM_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 13;
/// Flash LED mode menu: none, flash, torch
pub const V4L2_CID_FLASH_LED_MODE: u32 = V4L2_CID_FLASH_CLASS_BASE + 1;

// ===== V4L2 Flash LED Mode Menu Values =====

pub const V4L2_FLASH_LED_MODE_NONE: i32 = 0;
pub const V4L2_FLASH_LED_MODE_TORCH: i32 = 2;

/// Zoom units treated as 1.0x when the control's minimum is zero
///
/// UVC devices commonly report 100..=500 for 1x..5x.
const ZOOM_UNITS_PER_FACTOR: i32 = 100;

// ===== V4L2 Control Flags =====
const V4L2_CTRL_FLAG_DISABLED: u32 = 0x0001;
const V4L2_CTRL_FLAG_READ_ONLY: u32 = 0x0004;

// ===== V4L2 ioctl Numbers =====
// Calculated as: (dir << 30) | (size << 16) | ('V' << 8) | nr
// where dir: 2=READ, 1=WRITE, 3=READ|WRITE

/// Get control value (v4l2_control: 8 bytes)
const VIDIOC_G_CTRL: libc::c_ulong = 0xC008561B;
/// Set control value (v4l2_control: 8 bytes)
const VIDIOC_S_CTRL: libc::c_ulong = 0xC008561C;
/// Query control info (v4l2_queryctrl: 68 bytes)
const VIDIOC_QUERYCTRL: libc::c_ulong = 0xC0445624;

// ===== V4L2 ioctl Structures =====

/// V4L2 control get/set structure
#[repr(C)]
struct V4l2Control {
    id: u32,
    value: i32,
}

/// V4L2 query control structure
#[repr(C)]
struct V4l2Queryctrl {
    id: u32,
    ctrl_type: u32,
    name: [u8; 32],
    minimum: i32,
    maximum: i32,
    step: i32,
    default_value: i32,
    flags: u32,
    reserved: [u32; 2],
}

/// Range and flags of a V4L2 control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlInfo {
    pub id: u32,
    pub name: String,
    pub minimum: i32,
    pub maximum: i32,
    pub step: i32,
    pub default_value: i32,
    pub flags: u32,
}

impl ControlInfo {
    pub fn is_disabled(&self) -> bool {
        self.flags & V4L2_CTRL_FLAG_DISABLED != 0
    }

    pub fn is_writable(&self) -> bool {
        !self.is_disabled() && self.flags & V4L2_CTRL_FLAG_READ_ONLY == 0
    }

    /// Device units that correspond to 1.0x
    fn zoom_base(&self) -> i32 {
        if self.minimum > 0 {
            self.minimum
        } else {
            ZOOM_UNITS_PER_FACTOR
        }
    }

    /// Describe an absolute zoom control as zoom capability strings
    pub fn zoom_capabilities(&self) -> ZoomCapabilities {
        let base = self.zoom_base() as f64;
        let writable = self.is_writable() && self.maximum > self.minimum;
        ZoomCapabilities {
            supported: Some(writable.to_string()),
            max_zoom: Some(format!("{:.1}", self.maximum as f64 / base)),
            taking_picture_zoom_max: None,
            zoom_values: None,
            zoom_step: (self.step > 1).then(|| format!("{:.2}", self.step as f64 / base)),
        }
    }

    /// Convert a zoom level in tenths to device units
    pub fn zoom_value(&self, tenths: u32) -> i32 {
        let value = (self.zoom_base() as i64 * tenths as i64 / 10) as i32;
        value.clamp(self.minimum, self.maximum)
    }
}

/// Extract a null-terminated string from a fixed-size byte array
fn extract_name(bytes: &[u8; 32]) -> String {
    let name_len = bytes.iter().position(|&c| c == 0).unwrap_or(32);
    String::from_utf8_lossy(&bytes[..name_len]).to_string()
}

/// Query if a control exists and get its information
pub fn query_control(device_path: &str, control_id: u32) -> Option<ControlInfo> {
    let file = File::open(device_path).ok()?;
    let fd = file.as_raw_fd();

    let mut qctrl = V4l2Queryctrl {
        id: control_id,
        ctrl_type: 0,
        name: [0; 32],
        minimum: 0,
        maximum: 0,
        step: 0,
        default_value: 0,
        flags: 0,
        reserved: [0; 2],
    };

    // SAFETY: fd is open for the lifetime of `file`, qctrl matches the kernel layout
    let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYCTRL, &mut qctrl as *mut V4l2Queryctrl) };
    if result < 0 {
        return None;
    }

    Some(ControlInfo {
        id: qctrl.id,
        name: extract_name(&qctrl.name),
        minimum: qctrl.minimum,
        maximum: qctrl.maximum,
        step: qctrl.step,
        default_value: qctrl.default_value,
        flags: qctrl.flags,
    })
}

/// Get current value of a control
pub fn get_control(device_path: &str, control_id: u32) -> Option<i32> {
    let file = File::open(device_path).ok()?;
    let fd = file.as_raw_fd();

    let mut ctrl = V4l2Control {
        id: control_id,
        value: 0,
    };

    // SAFETY: as above, v4l2_control is two 32-bit fields
    let result = unsafe { libc::ioctl(fd, VIDIOC_G_CTRL, &mut ctrl as *mut V4l2Control) };
    if result < 0 {
        debug!(device_path, control_id, "Failed to get V4L2 control");
        return None;
    }

    Some(ctrl.value)
}

/// Set value of a control
pub fn set_control(device_path: &str, control_id: u32, value: i32) -> BackendResult<()> {
    let file = File::open(device_path)?;
    let fd = file.as_raw_fd();

    let mut ctrl = V4l2Control {
        id: control_id,
        value,
    };

    // SAFETY: as above
    let result = unsafe { libc::ioctl(fd, VIDIOC_S_CTRL, &mut ctrl as *mut V4l2Control) };
    if result < 0 {
        let errno = std::io::Error::last_os_error();
        warn!(
            device_path,
            control_id,
            value,
            ?errno,
            "Failed to set V4L2 control"
        );
        return Err(match errno.raw_os_error() {
            Some(libc::EINVAL) => BackendError::Unsupported(format!("control {:#x}", control_id)),
            _ => BackendError::from(errno),
        });
    }

    if ctrl.value != value {
        debug!(
            device_path,
            control_id,
            requested = value,
            actual = ctrl.value,
            "V4L2 control value was clamped"
        );
    }

    Ok(())
}

/// Check if a control is available on the device
pub fn has_control(device_path: &str, control_id: u32) -> bool {
    query_control(device_path, control_id).is_some_and(|info| !info.is_disabled())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zoom_control(minimum: i32, maximum: i32, step: i32) -> ControlInfo {
        ControlInfo {
            id: V4L2_CID_ZOOM_ABSOLUTE,
            name: "Zoom, Absolute".to_string(),
            minimum,
            maximum,
            step,
            default_value: minimum,
            flags: 0,
        }
    }

    #[test]
    fn test_control_id_values() {
        assert_eq!(V4L2_CID_ZOOM_ABSOLUTE, 0x009a090d);
        assert_eq!(V4L2_CID_FLASH_LED_MODE, 0x009c0901);
    }

    #[test]
    fn test_uvc_zoom_range() {
        let ctrl = zoom_control(100, 500, 1);
        let caps = ctrl.zoom_capabilities();
        assert_eq!(caps.supported.as_deref(), Some("true"));
        assert_eq!(caps.max_zoom.as_deref(), Some("5.0"));
        assert_eq!(caps.zoom_step, None);
        assert_eq!(ctrl.zoom_value(27), 270);
        assert_eq!(ctrl.zoom_value(80), 500);
    }

    #[test]
    fn test_zero_based_zoom_range() {
        let ctrl = zoom_control(0, 300, 50);
        assert_eq!(ctrl.zoom_capabilities().max_zoom.as_deref(), Some("3.0"));
        assert_eq!(ctrl.zoom_capabilities().zoom_step.as_deref(), Some("0.50"));
        assert_eq!(ctrl.zoom_value(10), 100);
    }

    #[test]
    fn test_disabled_zoom_is_unsupported() {
        let mut ctrl = zoom_control(100, 500, 1);
        ctrl.flags = V4L2_CTRL_FLAG_DISABLED;
        assert_eq!(ctrl.zoom_capabilities().supported.as_deref(), Some("false"));
    }
}
