// SPDX-License-Identifier: GPL-3.0-only

//! Camera that replays an image file
//!
//! Useful for scanning a saved picture through the full live pipeline
//! and for machines without a camera. The image is converted to
//! luminance once; the preview stream repeats it at about 30 fps.
//! Zoom is emulated by center-cropping before scaling.

use super::frame_loop::{FrameLoop, LoopAction};
use super::types::*;
use super::{CameraBackend, CameraHandle};
use crate::constants::timing;
use image::GrayImage;
use image::imageops::{self, FilterType};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info};

/// Zoom range advertised by the still image camera, in tenths
const ZOOM_RANGE: std::ops::RangeInclusive<u32> = 10..=40;

/// Backend exposing a single image file as a back-facing camera
pub struct StillImageBackend {
    path: PathBuf,
}

impl StillImageBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn camera_info(&self) -> CameraInfo {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        CameraInfo {
            index: 0,
            name,
            path: self.path.display().to_string(),
            facing: CameraFacing::Back,
            orientation: 0,
        }
    }
}

impl CameraBackend for StillImageBackend {
    fn name(&self) -> &'static str {
        "still-image"
    }

    fn enumerate(&self) -> Vec<CameraInfo> {
        if self.path.is_file() {
            vec![self.camera_info()]
        } else {
            Vec::new()
        }
    }

    fn open(&self, camera: &CameraInfo) -> BackendResult<Box<dyn CameraHandle>> {
        let source = load_luma(&self.path)?;
        info!(
            path = %self.path.display(),
            width = source.width(),
            height = source.height(),
            "Opened still image camera"
        );
        Ok(Box::new(StillImageCamera {
            info: camera.clone(),
            source,
            settings: CameraSettings::default(),
            current: Arc::new(Mutex::new(None)),
            producer: None,
        }))
    }
}

fn load_luma(path: &Path) -> BackendResult<GrayImage> {
    let img = image::open(path).map_err(|e| match e {
        image::ImageError::IoError(io) => BackendError::from(io),
        other => BackendError::FormatNotSupported(other.to_string()),
    })?;
    Ok(img.into_luma8())
}

type SharedFrame = Arc<Mutex<Option<FrameBuffer>>>;

struct StillImageCamera {
    info: CameraInfo,
    source: GrayImage,
    settings: CameraSettings,
    /// Frame for the current settings, read by the producer on every tick
    current: SharedFrame,
    producer: Option<FrameLoop>,
}

impl StillImageCamera {
    fn native_size(&self) -> Size {
        Size::new(self.source.width(), self.source.height())
    }

    /// Native size plus halvings down to roughly VGA
    fn advertised_sizes(&self) -> Vec<Size> {
        let mut sizes = vec![self.native_size()];
        let mut size = self.native_size();
        loop {
            let l = size.landscape();
            if l.width / 2 < 640 || l.height / 2 < 360 {
                break;
            }
            size = Size::new(size.width / 2, size.height / 2);
            sizes.push(size);
        }
        sizes
    }

    /// Pick the advertised size closest in area to a request
    fn nearest_supported(&self, requested: Size) -> Size {
        self.advertised_sizes()
            .into_iter()
            .min_by_key(|s| s.area().abs_diff(requested.area()))
            .unwrap_or_else(|| self.native_size())
    }

    fn render(&self) -> Option<FrameBuffer> {
        let size = self.settings.preview_size;
        if size.is_empty() {
            return None;
        }
        let zoom = self.settings.zoom_tenths.unwrap_or(10).max(10);
        let (sw, sh) = self.source.dimensions();
        let crop_w = (sw * 10 / zoom).max(1);
        let crop_h = (sh * 10 / zoom).max(1);
        let view = imageops::crop_imm(
            &self.source,
            (sw - crop_w) / 2,
            (sh - crop_h) / 2,
            crop_w,
            crop_h,
        );
        let scaled = imageops::resize(&view.to_image(), size.width, size.height, FilterType::Triangle);
        let (width, height) = scaled.dimensions();
        FrameBuffer::new(width, height, scaled.into_raw())
    }

    fn publish(&self) {
        let frame = self.render();
        debug!(
            size = %self.settings.preview_size,
            zoom = ?self.settings.zoom_tenths,
            "Rendered still image frame"
        );
        match self.current.lock() {
            Ok(mut guard) => *guard = frame,
            Err(poisoned) => *poisoned.into_inner() = frame,
        }
    }
}

impl CameraHandle for StillImageCamera {
    fn info(&self) -> &CameraInfo {
        &self.info
    }

    fn parameters(&self) -> BackendResult<CameraParameters> {
        let sizes = self.advertised_sizes();
        Ok(CameraParameters {
            preview_sizes: sizes.clone(),
            picture_sizes: sizes,
            zoom: ZoomCapabilities {
                supported: Some("true".to_string()),
                max_zoom: Some("4.0".to_string()),
                zoom_step: Some("0.5".to_string()),
                ..Default::default()
            },
            torch_supported: false,
        })
    }

    fn apply(&mut self, settings: &CameraSettings) -> BackendResult<CameraSettings> {
        let mut applied = *settings;
        applied.preview_size = self.nearest_supported(settings.preview_size);
        applied.picture_size = self.nearest_supported(settings.picture_size);
        applied.torch = false;
        applied.zoom_tenths = settings
            .zoom_tenths
            .map(|t| t.clamp(*ZOOM_RANGE.start(), *ZOOM_RANGE.end()));
        self.settings = applied;
        self.publish();
        Ok(applied)
    }

    fn start_preview(&mut self, sink: FrameSink) -> BackendResult<()> {
        if self.producer.is_some() {
            return Ok(());
        }
        if self.settings.preview_size.is_empty() {
            self.settings.preview_size = self.native_size();
            self.publish();
        }

        let current = Arc::clone(&self.current);
        self.producer = Some(FrameLoop::start(
            "still-image",
            timing::STILL_IMAGE_FRAME_INTERVAL,
            move || {
                let frame = match current.lock() {
                    Ok(guard) => guard.clone(),
                    Err(poisoned) => poisoned.into_inner().clone(),
                };
                if let Some(mut frame) = frame {
                    frame.captured_at = Instant::now();
                    sink(frame);
                }
                LoopAction::Continue
            },
        ));
        Ok(())
    }

    fn stop_preview(&mut self) {
        if let Some(mut producer) = self.producer.take() {
            producer.stop();
        }
    }

    fn is_previewing(&self) -> bool {
        self.producer.is_some()
    }

    fn set_torch(&mut self, _on: bool) -> BackendResult<()> {
        Err(BackendError::Unsupported("torch".to_string()))
    }

    fn set_zoom(&mut self, tenths: u32) -> BackendResult<()> {
        self.settings.zoom_tenths = Some(tenths.clamp(*ZOOM_RANGE.start(), *ZOOM_RANGE.end()));
        self.publish();
        Ok(())
    }

    fn release(&mut self) {
        self.stop_preview();
    }
}

impl Drop for StillImageCamera {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn write_test_image(dir: &Path) -> PathBuf {
        let path = dir.join("checker.png");
        let img = GrayImage::from_fn(1280, 960, |x, y| {
            image::Luma([if (x / 40 + y / 40) % 2 == 0 { 0 } else { 255 }])
        });
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_missing_file_enumerates_nothing() {
        let backend = StillImageBackend::new("/nonexistent/scan.png");
        assert!(backend.enumerate().is_empty());
    }

    #[test]
    fn test_apply_snaps_to_advertised_size() {
        let dir = tempfile::tempdir().unwrap();
        let backend = StillImageBackend::new(write_test_image(dir.path()));
        let info = backend.enumerate().remove(0);
        let mut camera = backend.open(&info).unwrap();

        let params = camera.parameters().unwrap();
        assert_eq!(params.preview_sizes, vec![Size::new(1280, 960), Size::new(640, 480)]);
        assert!(!params.torch_supported);

        let applied = camera
            .apply(&CameraSettings {
                preview_size: Size::new(700, 500),
                picture_size: Size::new(1280, 960),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(applied.preview_size, Size::new(640, 480));

        let zoomed = camera
            .apply(&CameraSettings {
                preview_size: Size::new(1280, 960),
                zoom_tenths: Some(1000),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(zoomed.zoom_tenths, Some(40));

        assert_eq!(
            camera.set_torch(true),
            Err(BackendError::Unsupported("torch".to_string()))
        );
    }

    #[test]
    fn test_preview_delivers_until_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let backend = StillImageBackend::new(write_test_image(dir.path()));
        let info = backend.enumerate().remove(0);
        let mut camera = backend.open(&info).unwrap();
        camera
            .apply(&CameraSettings {
                preview_size: Size::new(640, 480),
                ..Default::default()
            })
            .unwrap();

        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink_frames = Arc::clone(&frames);
        camera
            .start_preview(Arc::new(move |f: FrameBuffer| {
                sink_frames.lock().unwrap().push(f.size());
            }))
            .unwrap();
        std::thread::sleep(Duration::from_millis(120));
        camera.stop_preview();

        let delivered = frames.lock().unwrap().len();
        assert!(delivered >= 2, "expected a stream of frames, got {}", delivered);
        assert!(frames.lock().unwrap().iter().all(|s| *s == Size::new(640, 480)));

        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(frames.lock().unwrap().len(), delivered, "frame after stop");
    }
}
