// SPDX-License-Identifier: MPL-2.0

//! Scanner - barcode scanning from a live camera
//!
//! This library opens a camera, streams preview frames into a background
//! decode worker and reports decoded QR payloads to a host shell while a
//! viewfinder overlay shows where to hold the code.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: Capture session, framing geometry and viewfinder overlay
//! - [`backends`]: Camera backends (V4L2 via GStreamer, still image)
//! - [`pipelines`]: Background frame decoding
//! - [`config`]: Scan options
//! - [`flash`]: sysfs LEDs used as a torch
//! - [`terminal`]: Terminal host rendering the preview with half blocks
//!
//! # Example
//!
//! ```ignore
//! let backend = Arc::new(V4l2Backend::new());
//! let mut session = CaptureSession::new(backend, Arc::new(QrDecoder), shell, ScanOptions::load());
//! session.surface_ready(Surface { id: 0, size: Size::new(1280, 720) });
//! loop {
//!     session.pump_now();
//!     if session.state().is_closed() {
//!         break;
//!     }
//! }
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod flash;
pub mod pipelines;
pub mod terminal;

// Re-export commonly used types
pub use app::{CaptureSession, CloseReason, HostShell, ScanPayload, SessionState, Surface};
pub use backends::camera::{CameraBackend, CameraResource, FrameBuffer, Size};
pub use config::ScanOptions;
pub use errors::{ScanError, ScanResult};
pub use pipelines::decode::{BarcodeDecoder, DecodeOutcome, QrDecoder};
