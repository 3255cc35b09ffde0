// SPDX-License-Identifier: GPL-3.0-only

//! Display-to-camera rotation compensation

use super::types::CameraFacing;
use crate::errors::{ScanError, ScanResult};

/// Display rotation in quarter turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Rotation {
    /// Normalise a raw display rotation
    ///
    /// Any multiple of 90 (including negative ones) is accepted; anything
    /// else is a [`ScanError::BadRotation`].
    pub fn from_display_degrees(degrees: i32) -> ScanResult<Self> {
        if degrees % 90 != 0 {
            return Err(ScanError::BadRotation(degrees));
        }
        Ok(match degrees.rem_euclid(360) {
            90 => Rotation::Rotate90,
            180 => Rotation::Rotate180,
            270 => Rotation::Rotate270,
            _ => Rotation::None,
        })
    }

    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Rotate90 => 90,
            Rotation::Rotate180 => 180,
            Rotation::Rotate270 => 270,
        }
    }
}

/// Sensor orientation as used in the compensation formula
///
/// Front cameras report their mount angle mirrored.
pub fn sensor_orientation(mount_degrees: u32, facing: CameraFacing) -> u32 {
    let mount = mount_degrees % 360;
    match facing {
        CameraFacing::Back => mount,
        CameraFacing::Front => (360 - mount) % 360,
    }
}

/// `(360 + sensor - display) % 360`
pub fn compensation(display: Rotation, sensor_degrees: u32) -> u32 {
    (360 + sensor_degrees % 360 - display.degrees()) % 360
}

/// Angle actually written to the device
///
/// Front cameras preview mirrored, so the compensation is negated.
pub fn hardware_angle(compensation_degrees: u32, facing: CameraFacing) -> u32 {
    match facing {
        CameraFacing::Back => compensation_degrees % 360,
        CameraFacing::Front => (360 - compensation_degrees % 360) % 360,
    }
}

/// Full pipeline from display rotation and mount angle to device angle
pub fn display_orientation(display: Rotation, mount_degrees: u32, facing: CameraFacing) -> u32 {
    let sensor = sensor_orientation(mount_degrees, facing);
    hardware_angle(compensation(display, sensor), facing)
}
