// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera capture
//!
//! # Modules
//!
//! - [`camera`]: Camera backends, device controls and the camera resource
//! - [`crate::flash`]: sysfs flash LEDs used as a torch fallback

pub mod camera;
