// SPDX-License-Identifier: MPL-2.0

//! V4L2 device discovery for the GStreamer backend

use super::super::types::{CameraFacing, CameraInfo, Size};
use tracing::{debug, info};
use v4l::framesize::FrameSizeEnum;
use v4l::prelude::*;
use v4l::video::Capture;

/// Resolutions tried against stepwise frame size ranges
const STEPWISE_CANDIDATES: [(u32, u32); 6] = [
    (3840, 2160),
    (1920, 1080),
    (1280, 720),
    (1280, 960),
    (800, 600),
    (640, 480),
];

/// `/dev/videoN` nodes sorted by N
fn video_nodes() -> Vec<(u32, String)> {
    let mut nodes: Vec<(u32, String)> = std::fs::read_dir("/dev")
        .into_iter()
        .flatten()
        .flatten()
        .filter_map(|e| {
            let name = e.file_name().to_str()?.to_string();
            let n = name.strip_prefix("video")?.parse::<u32>().ok()?;
            Some((n, format!("/dev/{}", name)))
        })
        .collect();
    nodes.sort();
    nodes
}

/// Enumerate V4L2 capture devices
///
/// Metadata and output nodes report no capture formats and are skipped.
/// V4L2 does not say where a camera is mounted, so every device is
/// reported as back-facing with no sensor rotation.
pub fn enumerate_v4l2_cameras() -> Vec<CameraInfo> {
    let mut cameras = Vec::new();

    for (_, path) in video_nodes() {
        let dev = match Device::with_path(&path) {
            Ok(d) => d,
            Err(e) => {
                debug!(path = %path, error = %e, "Cannot open video node");
                continue;
            }
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        let has_formats = dev.enum_formats().map(|f| !f.is_empty()).unwrap_or(false);
        if !has_formats {
            debug!(path = %path, card = %caps.card, "Skipping node without capture formats");
            continue;
        }

        info!(path = %path, card = %caps.card, driver = %caps.driver, "Found V4L2 camera");
        cameras.push(CameraInfo {
            index: cameras.len(),
            name: caps.card,
            path,
            facing: CameraFacing::Back,
            orientation: 0,
        });
    }

    cameras
}

/// All frame sizes the device offers in any pixel format, largest first
///
/// The pipeline converts to luminance, so the source format does not
/// restrict which sizes are usable.
pub fn supported_sizes(device_path: &str) -> Vec<Size> {
    let Ok(dev) = Device::with_path(device_path) else {
        return Vec::new();
    };

    let mut sizes = Vec::new();
    if let Ok(formats) = dev.enum_formats() {
        for fmt in formats {
            let Ok(frame_sizes) = dev.enum_framesizes(fmt.fourcc) else {
                continue;
            };
            for frame_size in frame_sizes {
                match frame_size.size {
                    FrameSizeEnum::Discrete(d) => sizes.push(Size::new(d.width, d.height)),
                    FrameSizeEnum::Stepwise(step) => {
                        sizes.extend(
                            STEPWISE_CANDIDATES
                                .iter()
                                .filter(|(w, h)| {
                                    (step.min_width..=step.max_width).contains(w)
                                        && (step.min_height..=step.max_height).contains(h)
                                })
                                .map(|&(w, h)| Size::new(w, h)),
                        );
                    }
                }
            }
        }
    }

    dedup_sizes(sizes)
}

fn dedup_sizes(mut sizes: Vec<Size>) -> Vec<Size> {
    sizes.sort_by_key(|s| std::cmp::Reverse((s.area(), s.width)));
    sizes.dedup();
    sizes
}
