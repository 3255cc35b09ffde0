// SPDX-License-Identifier: GPL-3.0-only

//! Viewfinder overlay
//!
//! Paints on top of the camera preview:
//!
//! - a dimmed mask outside the framing rect
//! - corner brackets around the rect
//! - a scan line sweeping up and down inside it
//! - candidate points the decoder reported recently
//!
//! # Coordinate System
//!
//! The overlay works in screen pixels. Candidate points arrive in
//! preview-crop pixels and are mapped through the current
//! [`FramingGeometry`] at paint time, so a geometry change never leaves
//! stale points in the wrong place.

mod animation;
mod canvas;
mod points;
mod ticker;

pub use animation::{LaserAnimator, ease_in_out};
pub use canvas::{Canvas, Rgba};
pub use points::{CandidatePoints, PointFrame};
pub use ticker::OverlayTicker;

use super::framing::FramingGeometry;
use crate::backends::camera::types::Rect;
use crate::constants::overlay::{CURRENT_POINT_OPACITY, LASER_CYCLE, POINT_SIZE};
use std::sync::Arc;
use std::time::Instant;

/// Colors and dimensions of the overlay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewfinderStyle {
    pub mask: Rgba,
    pub corner: Rgba,
    pub laser: Rgba,
    pub point: Rgba,
    /// Length of each bracket arm, measured from the outer corner
    pub corner_length: i32,
    /// Bracket thickness, drawn outside the rect
    pub corner_thickness: i32,
    pub laser_height: i32,
    pub point_radius: f32,
}

impl Default for ViewfinderStyle {
    fn default() -> Self {
        Self {
            mask: Rgba::from_argb(0x6000_0000),
            corner: Rgba::from_argb(0xFF1F_B3E2),
            laser: Rgba::from_argb(0xFFFF_5252),
            point: Rgba::from_argb(0xFFFF_BD21),
            corner_length: 48,
            corner_thickness: 8,
            laser_height: 4,
            point_radius: POINT_SIZE,
        }
    }
}

impl ViewfinderStyle {
    /// Smaller strokes for low-resolution canvases such as a terminal
    pub fn compact() -> Self {
        Self {
            corner_length: 8,
            corner_thickness: 2,
            laser_height: 1,
            point_radius: POINT_SIZE / 3.0,
            ..Self::default()
        }
    }
}

pub struct ViewfinderOverlay {
    style: ViewfinderStyle,
    geometry: Option<FramingGeometry>,
    laser: Option<LaserAnimator>,
    points: Arc<CandidatePoints>,
}

impl ViewfinderOverlay {
    pub fn new(style: ViewfinderStyle, points: Arc<CandidatePoints>) -> Self {
        Self {
            style,
            geometry: None,
            laser: None,
            points,
        }
    }

    pub fn points(&self) -> &Arc<CandidatePoints> {
        &self.points
    }

    /// Use new geometry from the next repaint on
    pub fn set_geometry(&mut self, geometry: Option<FramingGeometry>) {
        if geometry.is_none() {
            self.points.clear();
        }
        self.geometry = geometry;
    }

    pub fn geometry(&self) -> Option<&FramingGeometry> {
        self.geometry.as_ref()
    }

    /// Paint one overlay frame
    ///
    /// Nothing is drawn until geometry is known.
    pub fn draw(&mut self, canvas: &mut dyn Canvas, now: Instant) {
        let Some(geometry) = self.geometry else {
            return;
        };
        let frame = geometry.screen_rect;
        if frame.is_empty() {
            return;
        }
        let size = canvas.size();
        let (width, height) = (size.width as i32, size.height as i32);
        let style = self.style;

        for rect in mask_rects(frame, width, height) {
            canvas.fill_rect(rect, style.mask);
        }
        for rect in corner_rects(frame, style.corner_length, style.corner_thickness) {
            canvas.fill_rect(rect, style.corner);
        }

        let laser = *self
            .laser
            .get_or_insert_with(|| LaserAnimator::new(LASER_CYCLE, now));
        let y = laser.position(now, frame.top, frame.bottom);
        let half = style.laser_height / 2;
        canvas.fill_rect(
            Rect::new(frame.left, y - half, frame.right, y - half + style.laser_height.max(1)),
            style.laser,
        );

        let batch = self.points.take_frame();
        let current = style.point.with_alpha(CURRENT_POINT_OPACITY);
        for point in &batch.current {
            let (x, y) = geometry.candidate_to_screen(*point);
            canvas.fill_circle(x, y, style.point_radius, current);
        }
        let faded = style.point.with_alpha(CURRENT_POINT_OPACITY / 2);
        for point in &batch.last {
            let (x, y) = geometry.candidate_to_screen(*point);
            canvas.fill_circle(x, y, style.point_radius / 2.0, faded);
        }
    }
}

/// The four mask bands around `frame`: above, left, right, below
pub fn mask_rects(frame: Rect, width: i32, height: i32) -> [Rect; 4] {
    [
        Rect::new(0, 0, width, frame.top),
        Rect::new(0, frame.top, frame.left, frame.bottom),
        Rect::new(frame.right, frame.top, width, frame.bottom),
        Rect::new(0, frame.bottom, width, height),
    ]
}

/// Eight bars forming L-shaped brackets just outside the corners
///
/// `length` is each arm's extent from the outer corner, `thickness` the
/// bar width.
pub fn corner_rects(frame: Rect, length: i32, thickness: i32) -> [Rect; 8] {
    let (l, t, r, b) = (frame.left, frame.top, frame.right, frame.bottom);
    let (w, h) = (length, thickness);
    [
        // top left
        Rect::new(l - h, t - h, l - h + w, t),
        Rect::new(l - h, t, l, t + w - h),
        // top right
        Rect::new(r - w + h, t - h, r, t),
        Rect::new(r, t - h, r + h, t + w - h),
        // bottom left
        Rect::new(l - h, b - w + h, l, b),
        Rect::new(l - h, b, l - h + w, b + h),
        // bottom right
        Rect::new(r - w + h, b, r + h, b + h),
        Rect::new(r, b - w + h, r + h, b),
    ]
}
