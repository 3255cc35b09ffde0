// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when width is at least height
    pub fn is_landscape(&self) -> bool {
        self.width >= self.height
    }

    /// Swap width and height
    pub fn transposed(&self) -> Self {
        Self::new(self.height, self.width)
    }

    /// The same size with the longer side as width
    pub fn landscape(&self) -> Self {
        if self.is_landscape() {
            *self
        } else {
            self.transposed()
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for Size {
    type Err = String;

    /// Parse `WIDTHxHEIGHT`, e.g. `1280x720`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
        let width = w.trim().parse::<u32>().map_err(|e| e.to_string())?;
        let height = h.trim().parse::<u32>().map_err(|e| e.to_string())?;
        Ok(Size::new(width, height))
    }
}

/// Axis-aligned rectangle, right and bottom exclusive
///
/// Signed so that decorations drawn just outside a rectangle (corner
/// brackets) can be expressed without clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_origin_size(left: i32, top: i32, size: Size) -> Self {
        Self::new(
            left,
            top,
            left + size.width as i32,
            top + size.height as i32,
        )
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Whether `other` lies completely inside this rectangle
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right <= self.right
            && other.bottom <= self.bottom
    }

    /// Intersection with `other`, empty rect if they do not overlap
    pub fn intersect(&self, other: &Rect) -> Rect {
        let r = Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        if r.is_empty() { Rect::default() } else { r }
    }

    /// Swap the x and y axes
    pub fn transposed(&self) -> Rect {
        Rect::new(self.top, self.left, self.bottom, self.right)
    }
}

/// Which way the camera faces relative to the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    #[default]
    Back,
    Front,
}

impl std::fmt::Display for CameraFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraFacing::Back => write!(f, "back"),
            CameraFacing::Front => write!(f, "front"),
        }
    }
}

/// A camera found during enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    /// Position in the backend's enumeration order
    pub index: usize,
    /// Human-readable name
    pub name: String,
    /// Device path, e.g. `/dev/video0`
    pub path: String,
    pub facing: CameraFacing,
    /// Mount angle of the sensor relative to the device's natural orientation
    pub orientation: u32,
}

/// Which camera a session should open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CameraSelection {
    /// Explicit enumeration index
    pub index: Option<usize>,
    /// Preferred facing when no index is given
    pub facing: Option<CameraFacing>,
}

impl CameraSelection {
    /// Pick a camera from an enumeration
    ///
    /// An explicit index must exist, there is no fallback for a missing one.
    /// Otherwise the first camera with the requested facing (back when
    /// unspecified) wins, then the first camera at all.
    pub fn pick<'a>(&self, cameras: &'a [CameraInfo]) -> Option<&'a CameraInfo> {
        if let Some(index) = self.index {
            return cameras.iter().find(|c| c.index == index);
        }
        let facing = self.facing.unwrap_or_default();
        cameras
            .iter()
            .find(|c| c.facing == facing)
            .or_else(|| cameras.first())
    }
}

/// Zoom capability strings as reported by the device
///
/// Values are kept as raw strings; interpreting (and rejecting) them is
/// the zoom calculator's job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoomCapabilities {
    /// `"true"` / `"false"`; absent means "not stated"
    pub supported: Option<String>,
    /// Maximum zoom factor, e.g. `"5.0"`
    pub max_zoom: Option<String>,
    /// Maximum zoom while taking pictures, in tenths, e.g. `"40"`
    pub taking_picture_zoom_max: Option<String>,
    /// Comma separated allowed zoom factors, e.g. `"1.0,1.5,2.0"`
    pub zoom_values: Option<String>,
    /// Zoom step factor, e.g. `"0.5"`
    pub zoom_step: Option<String>,
}

/// Parameters a camera reports once it is open
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraParameters {
    pub preview_sizes: Vec<Size>,
    pub picture_sizes: Vec<Size>,
    pub zoom: ZoomCapabilities,
    pub torch_supported: bool,
}

/// Settings pushed to an open camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CameraSettings {
    pub preview_size: Size,
    pub picture_size: Size,
    /// Zoom in tenths, `None` leaves the device alone
    pub zoom_tenths: Option<u32>,
    pub torch: bool,
    /// Clockwise rotation the device should apply to its preview
    pub display_orientation: u32,
}

/// One 8-bit luminance frame
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    /// Tightly packed rows, `width * height` bytes
    pub data: Vec<u8>,
    pub captured_at: Instant,
}

impl FrameBuffer {
    /// Wrap luminance data, `None` if the buffer is too small
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() < width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
            captured_at: Instant::now(),
        })
    }

    /// Copy luminance rows out of a strided buffer
    pub fn from_strided(width: u32, height: u32, stride: usize, src: &[u8]) -> Option<Self> {
        let w = width as usize;
        if stride < w || src.len() < stride * (height as usize).saturating_sub(1) + w {
            return None;
        }
        let mut data = Vec::with_capacity(w * height as usize);
        for row in src.chunks(stride).take(height as usize) {
            data.extend_from_slice(&row[..w]);
        }
        Self::new(width, height, data)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn luma(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Copy out the part of the frame covered by `rect`
    ///
    /// The rect is clipped to the frame; an empty intersection yields an
    /// empty frame. The capture timestamp is preserved.
    pub fn crop(&self, rect: &Rect) -> FrameBuffer {
        let bounds = Rect::from_origin_size(0, 0, self.size());
        let r = bounds.intersect(rect);
        let (w, h) = (r.width().max(0) as usize, r.height().max(0) as usize);
        let mut data = Vec::with_capacity(w * h);
        for y in r.top..r.bottom {
            let start = y as usize * self.width as usize + r.left as usize;
            data.extend_from_slice(&self.data[start..start + w]);
        }
        FrameBuffer {
            width: w as u32,
            height: h as u32,
            data,
            captured_at: self.captured_at,
        }
    }
}

/// Callback a camera invokes for every preview frame
///
/// Runs on the camera's own thread; implementations must hand the frame
/// off and return without blocking.
pub type FrameSink = Arc<dyn Fn(FrameBuffer) + Send + Sync>;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Device exists but is held by someone else
    Busy(String),
    /// Failed to initialize the device or its pipeline
    InitializationFailed(String),
    /// Format not supported
    FormatNotSupported(String),
    /// Capability (torch, zoom) not offered by the device
    Unsupported(String),
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::Busy(msg) => write!(f, "Device busy: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::Unsupported(msg) => write!(f, "Not supported: {}", msg),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::EBUSY) => BackendError::Busy(err.to_string()),
            Some(libc::ENOENT) | Some(libc::ENODEV) => BackendError::DeviceNotFound(err.to_string()),
            _ => BackendError::IoError(err.to_string()),
        }
    }
}
