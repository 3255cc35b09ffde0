// SPDX-License-Identifier: GPL-3.0-only

//! Camera resource lifecycle
//!
//! The resource provides:
//! - Guarded open/close of exactly one camera handle
//! - Size, zoom and rotation negotiation on (re)configure
//! - Best-effort torch and zoom controls

use super::rotation::{self, Rotation};
use super::size_selector::select_best_size;
use super::types::*;
use super::zoom::{ZoomDecision, compute_zoom, step_zoom};
use super::{CameraBackend, CameraHandle};
use crate::app::framing::FramingGeometry;
use crate::config::ScanOptions;
use crate::errors::{ScanError, ScanResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Negotiated state of an open camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConfiguration {
    pub camera: CameraInfo,
    pub preview_size: Size,
    pub picture_size: Size,
    /// Current zoom in tenths, `None` when zoom is unsupported
    pub zoom_tenths: Option<u32>,
    pub torch: bool,
    /// Angle sent to the device to compensate for display rotation
    pub orientation: u32,
}

/// Parts of [`ScanOptions`] the resource cares about
#[derive(Debug, Clone, Copy, Default)]
struct ResourceOptions {
    selection: CameraSelection,
    capture_size: Option<Size>,
    frame_size: Option<Size>,
    desired_zoom_tenths: u32,
}

/// Owner of the open camera handle
///
/// Not shareable: the capture session holds it and calls it from its own
/// thread only. Dropping the resource closes the camera.
pub struct CameraResource {
    backend: Arc<dyn CameraBackend>,
    options: ResourceOptions,
    handle: Option<Box<dyn CameraHandle>>,
    parameters: CameraParameters,
    config: Option<CameraConfiguration>,
    display: Rotation,
}

impl CameraResource {
    pub fn new(backend: Arc<dyn CameraBackend>, options: &ScanOptions) -> Self {
        info!(backend = backend.name(), "Creating camera resource");
        Self {
            backend,
            options: ResourceOptions {
                selection: options.camera,
                capture_size: options.capture_size,
                frame_size: options.frame_size,
                desired_zoom_tenths: options.desired_zoom_tenths,
            },
            handle: None,
            parameters: CameraParameters::default(),
            config: None,
            display: Rotation::None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn configuration(&self) -> Option<&CameraConfiguration> {
        self.config.as_ref()
    }

    /// Open the selected camera and negotiate against `screen`
    ///
    /// Calling this while already open logs a warning and returns the
    /// existing configuration.
    pub fn open(&mut self, screen: Size, display_rotation: i32) -> ScanResult<CameraConfiguration> {
        if self.handle.is_some()
            && let Some(config) = &self.config
        {
            warn!(camera = %config.camera.name, "Camera already open, keeping configuration");
            return Ok(config.clone());
        }

        let display = Rotation::from_display_degrees(display_rotation)?;

        let cameras = self.backend.enumerate();
        let camera = self
            .options
            .selection
            .pick(&cameras)
            .cloned()
            .ok_or_else(|| {
                ScanError::HardwareUnavailable(format!(
                    "no camera matches {:?} ({} found)",
                    self.options.selection,
                    cameras.len()
                ))
            })?;

        info!(camera = %camera.name, path = %camera.path, facing = %camera.facing, "Opening camera");

        let mut handle = self
            .backend
            .open(&camera)
            .map_err(|e| ScanError::HardwareUnavailable(e.to_string()))?;

        let parameters = match handle.parameters() {
            Ok(p) => p,
            Err(e) => {
                handle.release();
                return Err(ScanError::HardwareUnavailable(e.to_string()));
            }
        };
        debug!(
            preview_sizes = parameters.preview_sizes.len(),
            torch = parameters.torch_supported,
            zoom = ?parameters.zoom,
            "Camera parameters"
        );

        self.handle = Some(handle);
        self.parameters = parameters;
        self.display = display;

        match self.negotiate(screen) {
            Ok(config) => Ok(config),
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    /// Renegotiate for a new screen size and return the resulting geometry
    pub fn configure(&mut self, screen: Size) -> ScanResult<FramingGeometry> {
        let config = self.negotiate(screen)?;
        Ok(FramingGeometry::compute(
            screen,
            config.preview_size,
            self.options.frame_size,
        ))
    }

    /// Geometry for the current configuration without touching the device
    pub fn geometry(&self, screen: Size) -> Option<FramingGeometry> {
        self.config.as_ref().map(|c| {
            FramingGeometry::compute(screen, c.preview_size, self.options.frame_size)
        })
    }

    fn negotiate(&mut self, screen: Size) -> ScanResult<CameraConfiguration> {
        let Some(handle) = self.handle.as_mut() else {
            return Err(ScanError::HardwareUnavailable("camera not open".to_string()));
        };
        let camera = handle.info().clone();

        let target = self.options.capture_size.unwrap_or(screen);
        let preview = select_best_size(target, &self.parameters.preview_sizes).unwrap_or_else(|| {
            warn!(target = %target, "No usable preview size advertised, requesting target");
            target
        });
        let picture = select_best_size(target, &self.parameters.picture_sizes).unwrap_or(preview);

        // Keep a zoom level the user picked across reconfiguration
        let desired_zoom = self
            .config
            .as_ref()
            .and_then(|c| c.zoom_tenths)
            .unwrap_or(self.options.desired_zoom_tenths);
        let zoom = compute_zoom(desired_zoom, &self.parameters.zoom).tenths();
        let torch = self.config.as_ref().is_some_and(|c| c.torch);
        let orientation = rotation::display_orientation(self.display, camera.orientation, camera.facing);

        let requested = CameraSettings {
            preview_size: preview,
            picture_size: picture,
            zoom_tenths: zoom,
            torch,
            display_orientation: orientation,
        };
        let applied = handle.apply(&requested)?;
        if applied.preview_size != requested.preview_size {
            info!(
                requested = %requested.preview_size,
                actual = %applied.preview_size,
                "Camera adjusted preview size"
            );
        }

        let config = CameraConfiguration {
            camera,
            preview_size: applied.preview_size,
            picture_size: applied.picture_size,
            zoom_tenths: applied.zoom_tenths,
            torch: applied.torch,
            orientation: applied.display_orientation,
        };
        info!(
            screen = %screen,
            preview = %config.preview_size,
            picture = %config.picture_size,
            zoom = ?config.zoom_tenths,
            orientation = config.orientation,
            "Camera configured"
        );
        self.config = Some(config.clone());
        Ok(config)
    }

    /// Start streaming frames into `sink`
    pub fn start_preview(&mut self, sink: FrameSink) -> ScanResult<()> {
        let Some(handle) = self.handle.as_mut() else {
            return Err(ScanError::HardwareUnavailable("camera not open".to_string()));
        };
        if handle.is_previewing() {
            debug!("Preview already running");
            return Ok(());
        }
        handle
            .start_preview(sink)
            .map_err(|e| ScanError::HardwareUnavailable(e.to_string()))
    }

    /// Stop streaming; returns once no frame will be delivered anymore
    pub fn stop_preview(&mut self) {
        if let Some(handle) = self.handle.as_mut()
            && handle.is_previewing()
        {
            handle.stop_preview();
        }
    }

    /// Switch the torch; false if nothing changed
    pub fn set_torch(&mut self, on: bool) -> bool {
        let (Some(handle), Some(config)) = (self.handle.as_mut(), self.config.as_mut()) else {
            return false;
        };
        if !self.parameters.torch_supported {
            debug!("{}", ScanError::CapabilityUnsupported("torch".to_string()));
            return false;
        }
        if config.torch == on {
            return false;
        }
        match handle.set_torch(on) {
            Ok(()) => {
                info!(on, "Torch switched");
                config.torch = on;
                true
            }
            Err(e) => {
                debug!(error = %e, "Torch request ignored");
                false
            }
        }
    }

    /// Zoom one step in or out; false if nothing changed
    pub fn set_zoom_direction(&mut self, increase: bool) -> bool {
        let (Some(handle), Some(config)) = (self.handle.as_mut(), self.config.as_mut()) else {
            return false;
        };
        let Some(current) = config.zoom_tenths else {
            debug!("{}", ScanError::CapabilityUnsupported("zoom".to_string()));
            return false;
        };
        let next = match step_zoom(current, increase, &self.parameters.zoom) {
            ZoomDecision::Apply(t) if t != current => t,
            _ => return false,
        };
        match handle.set_zoom(next) {
            Ok(()) => {
                info!(from = current, to = next, "Zoom changed");
                config.zoom_tenths = Some(next);
                true
            }
            Err(e) => {
                debug!(error = %e, "Zoom request ignored");
                false
            }
        }
    }

    /// Release the camera; safe to call when already closed
    pub fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            info!(camera = %handle.info().name, "Closing camera");
            if handle.is_previewing() {
                handle.stop_preview();
            }
            handle.release();
        }
        self.config = None;
        self.parameters = CameraParameters::default();
    }
}

impl Drop for CameraResource {
    fn drop(&mut self) {
        self.close();
    }
}
