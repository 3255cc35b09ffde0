// SPDX-License-Identifier: GPL-3.0-only

//! Framing rectangle geometry
//!
//! The framing rect is where the user should hold the barcode. It lives
//! in two coordinate spaces:
//!
//! - screen: pixels of the render surface, used by the overlay
//! - preview: pixels of the camera buffer, used to crop frames for decoding
//!
//! The preview is shown scaled to cover the screen and centered, so one
//! uniform scale maps screen to preview. When the camera buffer is
//! oriented differently from the screen (landscape sensor, portrait
//! screen) the rect is transposed into buffer axes.

use crate::backends::camera::types::{Rect, Size};
use crate::constants::framing::{MAX_SIDE, MIN_SIDE, SCREEN_FRACTION};
use crate::pipelines::decode::CandidatePoint;

/// Geometry published after every camera (re)configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramingGeometry {
    /// Render surface size
    pub screen: Size,
    /// Camera preview buffer size, in buffer orientation
    pub preview: Size,
    /// Framing rect on screen
    pub screen_rect: Rect,
    /// Framing rect in preview buffer pixels
    pub preview_rect: Rect,
    /// Preview buffer axes are swapped relative to the screen
    pub transposed: bool,
    /// Preview pixels per screen pixel
    pub scale: f64,
}

impl FramingGeometry {
    /// Compute geometry for a screen and the negotiated preview size
    ///
    /// `manual` overrides the default square framing rect; it is clamped
    /// to the screen and centered.
    pub fn compute(screen: Size, preview: Size, manual: Option<Size>) -> Self {
        let screen_rect = screen_framing_rect(screen, manual);

        let transposed = !preview.is_empty()
            && !screen.is_empty()
            && preview.is_landscape() != screen.is_landscape();
        let oriented = if transposed {
            preview.transposed()
        } else {
            preview
        };

        let scale = if screen.is_empty() {
            0.0
        } else {
            (oriented.width as f64 / screen.width as f64)
                .min(oriented.height as f64 / screen.height as f64)
        };

        let mapped = map_rect(&screen_rect, screen, oriented, scale);
        let bounds = Rect::from_origin_size(0, 0, oriented);
        let clamped = mapped.intersect(&bounds);
        let preview_rect = if transposed {
            clamped.transposed()
        } else {
            clamped
        };

        Self {
            screen,
            preview,
            screen_rect,
            preview_rect,
            transposed,
            scale,
        }
    }

    /// Map a point reported for the preview crop back to the screen
    pub fn candidate_to_screen(&self, point: CandidatePoint) -> (f32, f32) {
        let (px, py, pw, ph) = if self.transposed {
            (
                point.y,
                point.x,
                self.preview_rect.height(),
                self.preview_rect.width(),
            )
        } else {
            (
                point.x,
                point.y,
                self.preview_rect.width(),
                self.preview_rect.height(),
            )
        };
        let sx = self.screen_rect.width() as f32 / pw.max(1) as f32;
        let sy = self.screen_rect.height() as f32 / ph.max(1) as f32;
        (
            self.screen_rect.left as f32 + px * sx,
            self.screen_rect.top as f32 + py * sy,
        )
    }
}

/// Default framing rect: a centered square
///
/// The side is 5/8 of the shorter screen side, kept within
/// [`MIN_SIDE`, `MAX_SIDE`] and never larger than the screen.
pub fn screen_framing_rect(screen: Size, manual: Option<Size>) -> Rect {
    let (width, height) = match manual {
        Some(size) => (size.width.min(screen.width), size.height.min(screen.height)),
        None => {
            let shorter = screen.width.min(screen.height);
            let side = (shorter * SCREEN_FRACTION.0 / SCREEN_FRACTION.1)
                .clamp(MIN_SIDE, MAX_SIDE)
                .min(shorter);
            (side, side)
        }
    };
    let left = (screen.width - width) / 2;
    let top = (screen.height - height) / 2;
    Rect::from_origin_size(left as i32, top as i32, Size::new(width, height))
}

/// Scale a screen rect into a preview of the same orientation, about the centers
fn map_rect(rect: &Rect, screen: Size, preview: Size, scale: f64) -> Rect {
    let sx = screen.width as f64 / 2.0;
    let sy = screen.height as f64 / 2.0;
    let px = preview.width as f64 / 2.0;
    let py = preview.height as f64 / 2.0;
    let map_x = |x: i32| ((x as f64 - sx) * scale + px).round() as i32;
    let map_y = |y: i32| ((y as f64 - sy) * scale + py).round() as i32;
    Rect::new(
        map_x(rect.left),
        map_y(rect.top),
        map_x(rect.right),
        map_y(rect.bottom),
    )
}
