// SPDX-License-Identifier: MPL-2.0

//! GStreamer preview pipeline delivering luminance frames

use super::super::types::*;
use crate::constants::{pipeline, timing};
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Build the launch description for a V4L2 device
///
/// Whatever the device produces is converted and scaled so that the
/// appsink always sees tightly sized GRAY8 frames of `size`.
pub fn launch_description(device_path: &str, size: Size) -> String {
    format!(
        "v4l2src device={} ! videoconvert ! videoscale ! \
         video/x-raw,format={},width={},height={} ! appsink name=sink",
        device_path,
        pipeline::OUTPUT_FORMAT,
        size.width,
        size.height
    )
}

/// Running capture pipeline
///
/// Frames are handed to the sink from the GStreamer streaming thread.
/// [`GrayPipeline::stop`] returns once the pipeline reached NULL, after
/// which the sink is never called again.
pub struct GrayPipeline {
    pipeline: gstreamer::Pipeline,
    appsink: AppSink,
    frames: Arc<AtomicU64>,
    stopped: bool,
}

impl GrayPipeline {
    pub fn start(device_path: &str, size: Size, sink: FrameSink) -> BackendResult<Self> {
        gstreamer::init().map_err(|e| BackendError::InitializationFailed(e.to_string()))?;

        let description = launch_description(device_path, size);
        info!(pipeline = %description, "Creating capture pipeline");

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| BackendError::InitializationFailed("Not a pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| BackendError::InitializationFailed("Failed to get appsink".to_string()))?
            .dynamic_cast::<AppSink>()
            .map_err(|_| {
                BackendError::InitializationFailed("Failed to cast appsink".to_string())
            })?;

        appsink.set_property("emit-signals", true);
        appsink.set_property("sync", false);
        appsink.set_property("max-buffers", pipeline::MAX_BUFFERS);
        appsink.set_property("drop", true);
        appsink.set_property("enable-last-sample", false);

        let frames = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&frames);
        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let frame_start = Instant::now();
                    let frame_num = counter.fetch_add(1, Ordering::Relaxed);

                    let sample = appsink.pull_sample().map_err(|_| gstreamer::FlowError::Eos)?;
                    let buffer = sample.buffer().ok_or(gstreamer::FlowError::Error)?;
                    if buffer.flags().contains(gstreamer::BufferFlags::CORRUPTED) {
                        debug!(frame = frame_num, "Skipping corrupted buffer");
                        return Ok(gstreamer::FlowSuccess::Ok);
                    }
                    let caps = sample.caps().ok_or(gstreamer::FlowError::Error)?;
                    let video_info = VideoInfo::from_caps(caps).map_err(|e| {
                        error!(frame = frame_num, error = ?e, "Failed to get video info");
                        gstreamer::FlowError::Error
                    })?;
                    let map = buffer.map_readable().map_err(|e| {
                        error!(frame = frame_num, error = ?e, "Failed to map buffer");
                        gstreamer::FlowError::Error
                    })?;

                    let stride = video_info.stride()[0] as usize;
                    let Some(mut frame) = FrameBuffer::from_strided(
                        video_info.width(),
                        video_info.height(),
                        stride,
                        map.as_slice(),
                    ) else {
                        warn!(frame = frame_num, stride, "Short buffer, frame dropped");
                        return Ok(gstreamer::FlowSuccess::Ok);
                    };
                    frame.captured_at = frame_start;
                    sink(frame);

                    if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
                        debug!(
                            frame = frame_num,
                            width = video_info.width(),
                            height = video_info.height(),
                            stride,
                            total_us = frame_start.elapsed().as_micros(),
                            "Frame delivered"
                        );
                    }

                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        let mut this = Self {
            pipeline,
            appsink,
            frames,
            stopped: false,
        };

        if let Err(e) = this.pipeline.set_state(gstreamer::State::Playing) {
            let reason = this.bus_error().unwrap_or_else(|| e.to_string());
            this.stop();
            return Err(classify_start_error(reason));
        }

        let (result, state, pending) = this
            .pipeline
            .state(gstreamer::ClockTime::from_seconds(timing::START_TIMEOUT_SECS));
        debug!(result = ?result, state = ?state, pending = ?pending, "Pipeline state");
        if result.is_err() {
            let reason = this
                .bus_error()
                .unwrap_or_else(|| "pipeline failed to reach PLAYING".to_string());
            this.stop();
            return Err(classify_start_error(reason));
        }
        if state != gstreamer::State::Playing {
            warn!("Pipeline is not in PLAYING state yet");
        }

        info!(device = %device_path, size = %size, "Capture pipeline running");
        Ok(this)
    }

    /// First error message posted on the bus, if any
    fn bus_error(&self) -> Option<String> {
        let bus = self.pipeline.bus()?;
        let msg = bus.pop_filtered(&[gstreamer::MessageType::Error])?;
        match msg.view() {
            gstreamer::MessageView::Error(err) => Some(err.error().to_string()),
            _ => None,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Stop and wait until the pipeline released the device
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        // Drop the sink closure before tearing down the pipeline
        self.appsink
            .set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());

        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!(error = %e, "Failed to stop pipeline");
        }
        let (result, state, _) = self
            .pipeline
            .state(gstreamer::ClockTime::from_seconds(timing::STOP_TIMEOUT_SECS));
        match result {
            Ok(_) => info!(state = ?state, frames = self.frame_count(), "Capture pipeline stopped"),
            Err(e) => debug!(error = ?e, state = ?state, "Pipeline state change had issues"),
        }
    }
}

impl Drop for GrayPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Map a pipeline start failure to a backend error
///
/// v4l2src reports an in-use device as a resource busy error string.
fn classify_start_error(reason: String) -> BackendError {
    let lower = reason.to_lowercase();
    if lower.contains("busy") {
        BackendError::Busy(reason)
    } else if lower.contains("no such") || lower.contains("cannot identify") {
        BackendError::DeviceNotFound(reason)
    } else {
        BackendError::InitializationFailed(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_description() {
        let desc = launch_description("/dev/video2", Size::new(1280, 720));
        assert!(desc.starts_with("v4l2src device=/dev/video2 !"));
        assert!(desc.contains("format=GRAY8,width=1280,height=720"));
        assert!(desc.ends_with("appsink name=sink"));
    }

    #[test]
    fn test_classify_start_error() {
        assert!(matches!(
            classify_start_error("Device '/dev/video0' is busy".to_string()),
            BackendError::Busy(_)
        ));
        assert!(matches!(
            classify_start_error("Cannot identify device '/dev/video9'.".to_string()),
            BackendError::DeviceNotFound(_)
        ));
        assert!(matches!(
            classify_start_error("not negotiated".to_string()),
            BackendError::InitializationFailed(_)
        ));
    }
}
