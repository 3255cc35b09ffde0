// SPDX-License-Identifier: GPL-3.0-only

//! Barcode decode capability
//!
//! The pipeline only knows the [`BarcodeDecoder`] trait. [`QrDecoder`]
//! implements it with rqrr; tests substitute scripted decoders.

use crate::backends::camera::types::FrameBuffer;
use std::path::Path;
use tracing::{debug, trace};

/// Result of one decode attempt on one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A symbol was found and decoded
    Success(String),
    /// The frame was fine but held no readable symbol
    Empty,
    /// The attempt failed (corrupt symbol, bad input)
    Error(String),
}

/// A position in the decoded frame where symbol features were seen
///
/// Coordinates are in pixels of the frame passed to the decoder, which
/// is the framing-rect crop in preview space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidatePoint {
    pub x: f32,
    pub y: f32,
}

/// Text encoding of the symbol payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharacterSet {
    #[default]
    Utf8,
    /// Latin-1, every byte maps to the code point of the same value
    Iso8859_1,
}

impl CharacterSet {
    /// Parse a charset name as hosts usually spell it
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().replace('_', "-").as_str() {
            "UTF-8" | "UTF8" => Some(CharacterSet::Utf8),
            "ISO-8859-1" | "ISO8859-1" | "LATIN1" | "LATIN-1" => Some(CharacterSet::Iso8859_1),
            _ => None,
        }
    }

    /// Turn raw payload bytes into text
    pub fn decode_bytes(&self, bytes: &[u8]) -> String {
        match self {
            CharacterSet::Utf8 => match std::str::from_utf8(bytes) {
                Ok(s) => s.to_string(),
                Err(e) => {
                    debug!(error = %e, "Payload is not valid UTF-8, decoding lossily");
                    String::from_utf8_lossy(bytes).into_owned()
                }
            },
            CharacterSet::Iso8859_1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

impl std::fmt::Display for CharacterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CharacterSet::Utf8 => write!(f, "UTF-8"),
            CharacterSet::Iso8859_1 => write!(f, "ISO-8859-1"),
        }
    }
}

/// Hints passed with every decode call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeHints {
    pub character_set: CharacterSet,
}

/// Opaque decode capability
///
/// Called from the decode worker thread, one frame at a time. Positions
/// of symbol features may be pushed to `points` whether or not decoding
/// succeeds.
pub trait BarcodeDecoder: Send + Sync {
    fn decode(
        &self,
        frame: &FrameBuffer,
        hints: &DecodeHints,
        points: &mut Vec<CandidatePoint>,
    ) -> DecodeOutcome;
}

/// QR code decoder backed by rqrr
#[derive(Debug, Default, Clone, Copy)]
pub struct QrDecoder;

impl BarcodeDecoder for QrDecoder {
    fn decode(
        &self,
        frame: &FrameBuffer,
        hints: &DecodeHints,
        points: &mut Vec<CandidatePoint>,
    ) -> DecodeOutcome {
        if frame.width == 0 || frame.height == 0 {
            return DecodeOutcome::Error("empty frame".to_string());
        }

        let start = std::time::Instant::now();
        let width = frame.width as usize;
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            width,
            frame.height as usize,
            |x, y| frame.data[y * width + x],
        );
        let grids = prepared.detect_grids();

        trace!(
            width = frame.width,
            height = frame.height,
            grids = grids.len(),
            detection_ms = start.elapsed().as_millis(),
            "QR detection complete"
        );

        let mut last_error = None;
        for grid in grids {
            points.extend(grid.bounds.iter().map(|p| CandidatePoint {
                x: p.x as f32,
                y: p.y as f32,
            }));

            let mut payload = Vec::new();
            match grid.decode_to(&mut payload) {
                Ok(meta) => {
                    debug!(version = meta.version.0, ecc = meta.ecc_level, "Decoded QR code");
                    return DecodeOutcome::Success(hints.character_set.decode_bytes(&payload));
                }
                Err(e) => last_error = Some(e.to_string()),
            }
        }

        match last_error {
            Some(e) => DecodeOutcome::Error(e),
            None => DecodeOutcome::Empty,
        }
    }
}

/// Decode a symbol from an image file, outside any session
pub fn decode_image(
    decoder: &dyn BarcodeDecoder,
    path: &Path,
    hints: &DecodeHints,
) -> Result<DecodeOutcome, image::ImageError> {
    let luma = image::open(path)?.into_luma8();
    let (width, height) = luma.dimensions();
    let Some(frame) = FrameBuffer::new(width, height, luma.into_raw()) else {
        return Ok(DecodeOutcome::Error("image buffer too small".to_string()));
    };

    let mut points = Vec::new();
    let outcome = decoder.decode(&frame, hints, &mut points);
    debug!(path = %path.display(), ?outcome, points = points.len(), "Decoded image file");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charset_names() {
        assert_eq!(CharacterSet::from_name("utf-8"), Some(CharacterSet::Utf8));
        assert_eq!(CharacterSet::from_name("ISO_8859_1"), Some(CharacterSet::Iso8859_1));
        assert_eq!(CharacterSet::from_name("latin1"), Some(CharacterSet::Iso8859_1));
        assert_eq!(CharacterSet::from_name("EBCDIC"), None);
    }

    #[test]
    fn test_latin1_maps_every_byte() {
        let text = CharacterSet::Iso8859_1.decode_bytes(&[0x48, 0xE9]);
        assert_eq!(text, "H\u{e9}");
        // The same bytes are invalid UTF-8 and decode lossily
        assert_eq!(CharacterSet::Utf8.decode_bytes(&[0x48, 0xE9]), "H\u{fffd}");
    }

    #[test]
    fn test_blank_frame_is_empty() {
        let frame = FrameBuffer::new(64, 64, vec![255; 64 * 64]).unwrap();
        let mut points = Vec::new();
        let outcome = QrDecoder.decode(&frame, &DecodeHints::default(), &mut points);
        assert_eq!(outcome, DecodeOutcome::Empty);
        assert!(points.is_empty());
    }

    #[test]
    fn test_zero_sized_frame_is_error() {
        let frame = FrameBuffer::new(0, 0, Vec::new()).unwrap();
        let outcome = QrDecoder.decode(&frame, &DecodeHints::default(), &mut Vec::new());
        assert!(matches!(outcome, DecodeOutcome::Error(_)));
    }
}
