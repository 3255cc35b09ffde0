// SPDX-License-Identifier: GPL-3.0-only

//! Drawing surface for the viewfinder

use crate::backends::camera::types::{Rect, Size};
use image::RgbaImage;

/// Straight (non-premultiplied) RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `0xAARRGGBB`
    pub const fn from_argb(argb: u32) -> Self {
        Self {
            a: (argb >> 24) as u8,
            r: (argb >> 16) as u8,
            g: (argb >> 8) as u8,
            b: argb as u8,
        }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

/// Minimal painter the overlay draws through
pub trait Canvas {
    fn size(&self) -> Size;

    /// Fill `rect`, clipped to the canvas; exclusive right and bottom
    fn fill_rect(&mut self, rect: Rect, color: Rgba);

    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgba);
}

fn blend_channel(dst: u8, src: u8, alpha: u32) -> u8 {
    ((src as u32 * alpha + dst as u32 * (255 - alpha) + 127) / 255) as u8
}

fn blend(pixel: &mut image::Rgba<u8>, color: Rgba) {
    let alpha = color.a as u32;
    if alpha == 0 {
        return;
    }
    let [r, g, b, a] = pixel.0;
    pixel.0 = [
        blend_channel(r, color.r, alpha),
        blend_channel(g, color.g, alpha),
        blend_channel(b, color.b, alpha),
        a.max(color.a),
    ];
}

impl Canvas for RgbaImage {
    fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        let bounds = Rect::from_origin_size(0, 0, Canvas::size(self));
        let r = bounds.intersect(&rect);
        if r.is_empty() {
            return;
        }
        for y in r.top..r.bottom {
            for x in r.left..r.right {
                blend(self.get_pixel_mut(x as u32, y as u32), color);
            }
        }
    }

    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgba) {
        if radius <= 0.0 {
            return;
        }
        let (w, h) = (self.width() as i32, self.height() as i32);
        let x0 = ((cx - radius).floor() as i32).max(0);
        let x1 = ((cx + radius).ceil() as i32).min(w);
        let y0 = ((cy - radius).floor() as i32).max(0);
        let y1 = ((cy + radius).ceil() as i32).min(h);
        let r2 = radius * radius;
        for y in y0..y1 {
            for x in x0..x1 {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                if dx * dx + dy * dy <= r2 {
                    blend(self.get_pixel_mut(x as u32, y as u32), color);
                }
            }
        }
    }
}
