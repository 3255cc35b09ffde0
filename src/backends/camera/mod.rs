// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   CaptureSession    │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │   CameraResource    │  ← Single owner of the open handle
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraBackend Trait │  ← Enumeration, open
//! └──────────┬──────────┘
//!            │
//!            ▼
//!  ┌──────────────────┐   ┌─────────────┐
//!  │ GStreamer / V4L2 │   │ Still image │
//!  └──────────────────┘   └─────────────┘
//! ```
//!
//! Resolution, zoom and rotation math lives in [`size_selector`],
//! [`zoom`] and [`rotation`] and is backend independent.

pub mod frame_loop;
pub mod resource;
pub mod rotation;
pub mod size_selector;
pub mod still_image;
pub mod types;
pub mod v4l2;
pub mod v4l2_controls;
pub mod zoom;

pub use resource::{CameraConfiguration, CameraResource};
pub use types::*;

/// Source of cameras
pub trait CameraBackend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    // ===== Enumeration =====

    /// Enumerate available cameras on this backend
    fn enumerate(&self) -> Vec<CameraInfo>;

    // ===== Lifecycle =====

    /// Open a camera for exclusive use
    ///
    /// The returned handle owns the device until
    /// [`CameraHandle::release`] or drop.
    fn open(&self, camera: &CameraInfo) -> BackendResult<Box<dyn CameraHandle>>;
}

/// An open camera
///
/// Methods are only called from the thread that owns the
/// [`CameraResource`]. Frame delivery happens on the backend's own thread
/// through the [`FrameSink`] given to `start_preview`.
pub trait CameraHandle: Send {
    fn info(&self) -> &CameraInfo;

    // ===== Configuration =====

    /// Supported sizes and capability strings
    fn parameters(&self) -> BackendResult<CameraParameters>;

    /// Apply settings, returning what the device actually accepted
    ///
    /// Devices may round sizes; callers must use the returned preview
    /// size for geometry.
    fn apply(&mut self, settings: &CameraSettings) -> BackendResult<CameraSettings>;

    // ===== Preview =====

    /// Start delivering frames to `sink`
    fn start_preview(&mut self, sink: FrameSink) -> BackendResult<()>;

    /// Stop delivering frames
    ///
    /// Blocks until the sink will not be called again.
    fn stop_preview(&mut self);

    fn is_previewing(&self) -> bool;

    // ===== Live controls =====

    fn set_torch(&mut self, on: bool) -> BackendResult<()>;

    /// Set zoom in tenths of a zoom factor
    fn set_zoom(&mut self, tenths: u32) -> BackendResult<()>;

    // ===== Release =====

    /// Stop preview and let go of the device; safe to call twice
    fn release(&mut self);
}
