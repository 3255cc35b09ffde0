// SPDX-License-Identifier: MPL-2.0

//! V4L2 camera backend
//!
//! Devices are discovered through the `v4l` crate and streamed with a
//! GStreamer `v4l2src` pipeline that converts to luminance. Zoom and
//! torch use V4L2 controls; torch falls back to a sysfs LED when the
//! device has no flash control.

mod enumeration;
mod pipeline;

pub use enumeration::{enumerate_v4l2_cameras, supported_sizes};
pub use pipeline::{GrayPipeline, launch_description};

use super::types::*;
use super::v4l2_controls::{self, ControlInfo};
use super::{CameraBackend, CameraHandle};
use crate::flash::TorchLed;
use tracing::{debug, info, warn};

/// Backend for `/dev/video*` capture devices
#[derive(Debug, Default)]
pub struct V4l2Backend;

impl V4l2Backend {
    pub fn new() -> Self {
        Self
    }
}

impl CameraBackend for V4l2Backend {
    fn name(&self) -> &'static str {
        "v4l2"
    }

    fn enumerate(&self) -> Vec<CameraInfo> {
        enumerate_v4l2_cameras()
    }

    fn open(&self, camera: &CameraInfo) -> BackendResult<Box<dyn CameraHandle>> {
        // Fails early for vanished nodes and permission problems
        v4l::Device::with_path(&camera.path)?;

        let sizes = supported_sizes(&camera.path);
        if sizes.is_empty() {
            return Err(BackendError::FormatNotSupported(format!(
                "{} offers no frame sizes",
                camera.path
            )));
        }

        let zoom = v4l2_controls::query_control(&camera.path, v4l2_controls::V4L2_CID_ZOOM_ABSOLUTE)
            .filter(|c| c.is_writable());
        let flash_control =
            v4l2_controls::has_control(&camera.path, v4l2_controls::V4L2_CID_FLASH_LED_MODE);
        let torch_led = if flash_control {
            None
        } else {
            TorchLed::discover().into_iter().next()
        };

        info!(
            camera = %camera.name,
            sizes = sizes.len(),
            zoom = zoom.is_some(),
            flash_control,
            torch_led = torch_led.as_ref().map(|l| l.name()),
            "Opened V4L2 camera"
        );

        Ok(Box::new(V4l2Camera {
            info: camera.clone(),
            sizes,
            zoom,
            flash_control,
            torch_led,
            settings: CameraSettings::default(),
            sink: None,
            pipeline: None,
        }))
    }
}

struct V4l2Camera {
    info: CameraInfo,
    sizes: Vec<Size>,
    zoom: Option<ControlInfo>,
    flash_control: bool,
    torch_led: Option<TorchLed>,
    settings: CameraSettings,
    /// Kept so a size change can rebuild the pipeline
    sink: Option<FrameSink>,
    pipeline: Option<GrayPipeline>,
}

impl V4l2Camera {
    fn snap(&self, requested: Size) -> Size {
        if self.sizes.contains(&requested) {
            return requested;
        }
        self.sizes
            .iter()
            .copied()
            .min_by_key(|s| s.area().abs_diff(requested.area()))
            .unwrap_or(requested)
    }

    fn start_pipeline(&mut self, sink: FrameSink) -> BackendResult<()> {
        let size = self.settings.preview_size;
        let pipeline = GrayPipeline::start(&self.info.path, size, sink)?;
        self.pipeline = Some(pipeline);
        Ok(())
    }

    fn write_zoom(&self, tenths: u32) -> BackendResult<()> {
        let Some(control) = &self.zoom else {
            return Err(BackendError::Unsupported("zoom".to_string()));
        };
        v4l2_controls::set_control(&self.info.path, control.id, control.zoom_value(tenths))
    }

    fn write_torch(&self, on: bool) -> BackendResult<()> {
        if self.flash_control {
            let mode = if on {
                v4l2_controls::V4L2_FLASH_LED_MODE_TORCH
            } else {
                v4l2_controls::V4L2_FLASH_LED_MODE_NONE
            };
            return v4l2_controls::set_control(
                &self.info.path,
                v4l2_controls::V4L2_CID_FLASH_LED_MODE,
                mode,
            );
        }
        match &self.torch_led {
            Some(led) => Ok(led.set(on)?),
            None => Err(BackendError::Unsupported("torch".to_string())),
        }
    }
}

impl CameraHandle for V4l2Camera {
    fn info(&self) -> &CameraInfo {
        &self.info
    }

    fn parameters(&self) -> BackendResult<CameraParameters> {
        Ok(CameraParameters {
            preview_sizes: self.sizes.clone(),
            picture_sizes: self.sizes.clone(),
            zoom: self
                .zoom
                .as_ref()
                .map(ControlInfo::zoom_capabilities)
                .unwrap_or_default(),
            torch_supported: self.flash_control || self.torch_led.is_some(),
        })
    }

    fn apply(&mut self, settings: &CameraSettings) -> BackendResult<CameraSettings> {
        let mut applied = *settings;
        applied.preview_size = self.snap(settings.preview_size);
        applied.picture_size = self.snap(settings.picture_size);

        if let Some(tenths) = settings.zoom_tenths
            && let Err(e) = self.write_zoom(tenths)
        {
            debug!(error = %e, "Zoom not applied");
            applied.zoom_tenths = None;
        }
        if settings.torch != self.settings.torch
            && let Err(e) = self.write_torch(settings.torch)
        {
            debug!(error = %e, "Torch not applied");
            applied.torch = self.settings.torch;
        }
        if settings.display_orientation != 0 {
            // Frames are delivered in sensor orientation; the host rotates
            debug!(
                orientation = settings.display_orientation,
                "Display orientation recorded"
            );
        }

        let resize = applied.preview_size != self.settings.preview_size;
        self.settings = applied;

        if resize
            && self.pipeline.is_some()
            && let Some(sink) = self.sink.clone()
        {
            info!(size = %applied.preview_size, "Restarting pipeline for new preview size");
            if let Some(mut old) = self.pipeline.take() {
                old.stop();
            }
            self.start_pipeline(sink)?;
        }

        Ok(applied)
    }

    fn start_preview(&mut self, sink: FrameSink) -> BackendResult<()> {
        if self.pipeline.is_some() {
            return Ok(());
        }
        if self.settings.preview_size.is_empty()
            && let Some(largest) = self.sizes.first()
        {
            self.settings.preview_size = *largest;
        }
        self.sink = Some(sink.clone());
        self.start_pipeline(sink)
    }

    fn stop_preview(&mut self) {
        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.stop();
        }
        self.sink = None;
    }

    fn is_previewing(&self) -> bool {
        self.pipeline.is_some()
    }

    fn set_torch(&mut self, on: bool) -> BackendResult<()> {
        self.write_torch(on)?;
        self.settings.torch = on;
        Ok(())
    }

    fn set_zoom(&mut self, tenths: u32) -> BackendResult<()> {
        self.write_zoom(tenths)?;
        self.settings.zoom_tenths = Some(tenths);
        Ok(())
    }

    fn release(&mut self) {
        self.stop_preview();
        if self.settings.torch {
            if let Err(e) = self.write_torch(false) {
                warn!(error = %e, "Failed to switch torch off on release");
            }
            self.settings.torch = false;
        }
    }
}

impl Drop for V4l2Camera {
    fn drop(&mut self) {
        self.release();
    }
}
