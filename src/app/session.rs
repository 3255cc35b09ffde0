// SPDX-License-Identifier: GPL-3.0-only

//! Capture session
//!
//! The session is the only entry point for a host shell. It owns the
//! camera resource and the decode pipeline and moves them through the
//! [`SessionState`] machine in step with the render surface.
//!
//! All methods run on the host's interactive thread. Decoded results come
//! back from the worker over a channel and are picked up by
//! [`CaptureSession::pump`], which the host calls from its event loop.

use super::framing::FramingGeometry;
use super::inactivity::InactivityTimer;
use super::state::{SessionState, Transition};
use crate::backends::camera::{CameraBackend, CameraResource, FrameBuffer, FrameSink, Size};
use crate::config::ScanOptions;
use crate::errors::{ScanError, ScanResult};
use crate::pipelines::decode::{
    BarcodeDecoder, DecodePipeline, DecodedFrame, PipelineConfig, PointSink,
};
use image::GrayImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// A render surface the preview is shown on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Surface {
    pub id: u64,
    pub size: Size,
}

/// Why a session closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// A single-shot scan produced its result
    Decoded,
    /// The user backed out; no payload
    Cancelled,
    /// The camera could not be used
    Fatal,
    /// Nothing happened for too long
    Inactive,
}

/// What the host receives for every decoded barcode
#[derive(Debug, Clone)]
pub struct ScanPayload {
    pub text: String,
    pub captured_at: Instant,
    pub snapshot: Option<FrameBuffer>,
}

impl ScanPayload {
    /// Write the snapshot as a timestamped PNG in `dir`
    ///
    /// Returns `Ok(None)` when the payload carries no snapshot.
    pub fn save_snapshot(&self, dir: &Path) -> Result<Option<PathBuf>, image::ImageError> {
        let Some(frame) = &self.snapshot else {
            return Ok(None);
        };
        let Some(img) = GrayImage::from_raw(frame.width, frame.height, frame.data.clone()) else {
            return Ok(None);
        };
        std::fs::create_dir_all(dir)?;

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S%.3f");
        let path = dir.join(format!("SCAN_{}.png", timestamp));
        img.save(&path)?;
        info!(path = %path.display(), "Snapshot saved");
        Ok(Some(path))
    }
}

impl From<DecodedFrame> for ScanPayload {
    fn from(frame: DecodedFrame) -> Self {
        Self {
            text: frame.text,
            captured_at: frame.captured_at,
            snapshot: frame.snapshot,
        }
    }
}

/// Callbacks into the host application
///
/// Everything except the rotation query and the result has a no-op
/// default, so minimal hosts only implement what they show.
pub trait HostShell: Send {
    /// Current display rotation in degrees
    fn display_rotation(&self) -> i32;

    fn set_keep_screen_on(&mut self, _on: bool) {}

    /// Pin the display to `degrees` while the camera runs
    fn lock_orientation(&mut self, _degrees: i32) {}

    /// New framing geometry after (re)configuration
    fn on_geometry(&mut self, _geometry: &FramingGeometry) {}

    fn on_result(&mut self, payload: ScanPayload);

    fn on_error(&mut self, _error: &ScanError) {}

    fn on_closed(&mut self, _reason: CloseReason) {}
}

/// Observer for every preview frame, used by hosts that draw the preview
pub type PreviewTap = Arc<dyn Fn(&FrameBuffer) + Send + Sync>;

pub struct CaptureSession {
    state: SessionState,
    options: ScanOptions,
    backend: Arc<dyn CameraBackend>,
    decoder: Arc<dyn BarcodeDecoder>,
    shell: Box<dyn HostShell>,
    surface: Option<Surface>,
    camera: Option<CameraResource>,
    pipeline: Option<DecodePipeline>,
    results: Option<Receiver<DecodedFrame>>,
    geometry: Option<FramingGeometry>,
    inactivity: InactivityTimer,
    rearm_at: Option<Instant>,
    points: Option<PointSink>,
    preview_tap: Option<PreviewTap>,
    delivered: u64,
}

impl CaptureSession {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        decoder: Arc<dyn BarcodeDecoder>,
        shell: Box<dyn HostShell>,
        options: ScanOptions,
    ) -> Self {
        let options = options.sanitize();
        info!(
            backend = backend.name(),
            continuous = options.continuous,
            camera = ?options.camera,
            "Creating capture session"
        );
        Self {
            state: SessionState::Idle,
            inactivity: InactivityTimer::new(options.inactivity_timeout()),
            options,
            backend,
            decoder,
            shell,
            surface: None,
            camera: None,
            pipeline: None,
            results: None,
            geometry: None,
            rearm_at: None,
            points: None,
            preview_tap: None,
            delivered: 0,
        }
    }

    /// Forward candidate points from every decode attempt
    pub fn with_point_sink(mut self, points: PointSink) -> Self {
        self.points = Some(points);
        self
    }

    /// Observe preview frames as they arrive from the camera
    pub fn with_preview_tap(mut self, tap: PreviewTap) -> Self {
        self.preview_tap = Some(tap);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn geometry(&self) -> Option<&FramingGeometry> {
        self.geometry.as_ref()
    }

    pub fn surface(&self) -> Option<Surface> {
        self.surface
    }

    /// Number of results handed to the host
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn torch_enabled(&self) -> bool {
        self.camera
            .as_ref()
            .and_then(|c| c.configuration())
            .is_some_and(|c| c.torch)
    }

    pub fn zoom_tenths(&self) -> Option<u32> {
        self.camera
            .as_ref()
            .and_then(|c| c.configuration())
            .and_then(|c| c.zoom_tenths)
    }

    fn transition(&mut self, transition: Transition) -> bool {
        match self.state.next(transition) {
            Some(next) => {
                debug!(from = %self.state, to = %next, ?transition, "Session transition");
                self.state = next;
                true
            }
            None => {
                debug!(state = %self.state, ?transition, "Ignoring event in this state");
                false
            }
        }
    }

    // ===== Surface lifecycle =====

    /// A surface became available; opens the camera
    pub fn surface_ready(&mut self, surface: Surface) {
        if self.state == SessionState::Paused {
            debug!(surface = surface.id, "Surface arrived while paused, kept for resume");
            self.surface = Some(surface);
            return;
        }
        if !self.transition(Transition::SurfaceArrived) {
            return;
        }
        self.surface = Some(surface);
        self.open_camera();
    }

    /// The surface was resized; renegotiates while previewing
    pub fn surface_changed(&mut self, size: Size) {
        let Some(surface) = self.surface.as_mut() else {
            debug!(size = %size, "Surface change without a surface");
            return;
        };
        if surface.size == size {
            return;
        }
        surface.size = size;
        if self.state != SessionState::Previewing {
            return;
        }

        let Some(camera) = self.camera.as_mut() else {
            return;
        };
        match camera.configure(size) {
            Ok(geometry) => self.publish_geometry(geometry),
            Err(e) => self.fail(e),
        }
    }

    /// The surface is gone; the camera must not keep rendering into it
    pub fn surface_destroyed(&mut self) {
        if self.state == SessionState::Paused {
            self.surface = None;
            return;
        }
        if self.state.next(Transition::SurfaceLost).is_none() {
            debug!(state = %self.state, "Surface destroyed with nothing to release");
            self.surface = None;
            return;
        }
        info!("{}", ScanError::SurfaceLost);
        self.teardown();
        self.surface = None;
        self.transition(Transition::SurfaceLost);
    }

    // ===== Pause / resume =====

    /// Release the camera; returns after the last frame was handled
    pub fn pause(&mut self) {
        if self.state.next(Transition::Pause).is_none() {
            debug!(state = %self.state, "Pause ignored");
            return;
        }
        self.teardown();
        self.transition(Transition::Pause);
        self.inactivity.pause();
    }

    /// Reopen the camera if the surface survived the pause
    pub fn resume(&mut self) {
        let surface_valid = self.surface.is_some();
        let resume = Transition::Resume { surface_valid };
        if self.state.next(resume).is_none() {
            debug!(state = %self.state, "Resume ignored");
            return;
        }
        if !surface_valid {
            self.transition(resume);
            return;
        }

        match self.start_camera() {
            Ok(()) => {
                self.transition(resume);
                self.inactivity.activity(Instant::now());
            }
            Err(e) => self.fail(e),
        }
    }

    /// User cancel: closes without a payload
    pub fn cancel(&mut self) {
        if self.state.next(Transition::Cancel).is_none() {
            return;
        }
        self.teardown();
        self.transition(Transition::Cancel);
        info!(delivered = self.delivered, "Session cancelled");
        self.shell.on_closed(CloseReason::Cancelled);
    }

    // ===== Live controls =====

    /// Best effort; returns whether the torch changed
    pub fn set_torch(&mut self, on: bool) -> bool {
        if self.state != SessionState::Previewing {
            return false;
        }
        self.inactivity.activity(Instant::now());
        self.camera.as_mut().is_some_and(|c| c.set_torch(on))
    }

    pub fn toggle_torch(&mut self) -> bool {
        let on = !self.torch_enabled();
        self.set_torch(on)
    }

    /// Best effort; returns whether the zoom changed
    pub fn zoom(&mut self, increase: bool) -> bool {
        if self.state != SessionState::Previewing {
            return false;
        }
        self.inactivity.activity(Instant::now());
        self.camera
            .as_mut()
            .is_some_and(|c| c.set_zoom_direction(increase))
    }

    // ===== Event pump =====

    /// Deliver decoded results, re-arm and check for inactivity
    pub fn pump(&mut self, now: Instant) {
        if self.state != SessionState::Previewing {
            return;
        }

        loop {
            let Some(results) = self.results.as_ref() else {
                break;
            };
            let frame = match results.try_recv() {
                Ok(frame) => frame,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("Decode pipeline went away");
                    self.results = None;
                    break;
                }
            };
            self.on_decoded(frame, now);
            if self.state != SessionState::Previewing {
                return;
            }
        }

        if let Some(at) = self.rearm_at
            && now >= at
        {
            self.rearm_at = None;
            if let Some(pipeline) = &self.pipeline {
                pipeline.request_decode();
            }
        }

        if self.inactivity.expired(now) && self.transition(Transition::InactivityTimeout) {
            info!("Closing idle session");
            self.teardown();
            self.shell.on_closed(CloseReason::Inactive);
        }
    }

    pub fn pump_now(&mut self) {
        self.pump(Instant::now());
    }

    fn on_decoded(&mut self, frame: DecodedFrame, now: Instant) {
        let continuous = self.options.continuous;
        if !self.transition(Transition::Decoded { continuous }) {
            return;
        }
        self.inactivity.activity(now);
        self.delivered += 1;
        info!(len = frame.text.len(), delivered = self.delivered, "Barcode decoded");

        if continuous {
            self.shell.on_result(frame.into());
            let delay = self.options.rearm_delay();
            self.rearm_at = Some(now.checked_add(delay).unwrap_or(now));
        } else {
            // Stop everything before the host sees the result
            self.teardown();
            self.shell.on_result(frame.into());
            self.shell.on_closed(CloseReason::Decoded);
        }
    }

    // ===== Camera plumbing =====

    fn open_camera(&mut self) {
        if !self.transition(Transition::OpenStarted) {
            return;
        }
        match self.start_camera() {
            Ok(()) => {
                self.transition(Transition::OpenSucceeded);
                self.inactivity.activity(Instant::now());
            }
            Err(e) => self.fail(e),
        }
    }

    /// Open, configure and start streaming into a fresh pipeline
    fn start_camera(&mut self) -> ScanResult<()> {
        let Some(surface) = self.surface else {
            return Err(ScanError::SurfaceLost);
        };
        let rotation = self.shell.display_rotation();

        let mut camera = CameraResource::new(Arc::clone(&self.backend), &self.options);
        camera.open(surface.size, rotation)?;
        let geometry = camera.geometry(surface.size).ok_or_else(|| {
            ScanError::HardwareUnavailable("camera closed during configuration".to_string())
        })?;

        let (tx, rx) = mpsc::channel();
        let pipeline = DecodePipeline::start(
            Arc::clone(&self.decoder),
            PipelineConfig {
                hints: self.options.hints(),
                region: Some(geometry.preview_rect),
                keep_snapshot: self.options.keep_snapshot,
            },
            tx,
            self.points.clone(),
        );

        let decode_sink = pipeline.frame_sink();
        let sink: FrameSink = match self.preview_tap.clone() {
            Some(tap) => Arc::new(move |frame: FrameBuffer| {
                tap(&frame);
                decode_sink(frame);
            }),
            None => decode_sink,
        };
        camera.start_preview(sink)?;
        pipeline.request_decode();

        self.camera = Some(camera);
        self.pipeline = Some(pipeline);
        self.results = Some(rx);

        self.shell.lock_orientation(rotation);
        self.shell.set_keep_screen_on(true);
        self.publish_geometry(geometry);
        Ok(())
    }

    fn publish_geometry(&mut self, geometry: FramingGeometry) {
        if let Some(pipeline) = &self.pipeline {
            pipeline.set_decode_region(Some(geometry.preview_rect));
        }
        debug!(
            screen = %geometry.screen,
            preview = %geometry.preview,
            rect = ?geometry.preview_rect,
            "Framing geometry"
        );
        self.shell.on_geometry(&geometry);
        self.geometry = Some(geometry);
    }

    /// Stop pipeline, then preview, then the camera itself
    fn teardown(&mut self) {
        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.quit();
        }
        if let Some(mut camera) = self.camera.take() {
            camera.stop_preview();
            camera.close();
            self.shell.set_keep_screen_on(false);
        }
        self.results = None;
        self.rearm_at = None;
        self.geometry = None;
    }

    fn fail(&mut self, e: ScanError) {
        error!(error = %e, state = %self.state, "Session failed");
        self.teardown();
        if !self.transition(Transition::OpenFailed) {
            self.transition(Transition::Cancel);
        }
        if e.is_user_visible() {
            self.shell.on_error(&e);
        }
        self.shell.on_closed(CloseReason::Fatal);
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
