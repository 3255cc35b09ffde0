// SPDX-License-Identifier: GPL-3.0-only

//! Background frame decoding
//!
//! ```text
//! camera thread ──offer──▶ FrameMailbox ──next──▶ decode worker ──▶ DecodedFrame
//!                              ▲                        │
//!                              └──── re-request on ─────┘
//!                                    Empty / Error
//! ```
//!
//! One worker thread, at most one decode in flight, at most one frame
//! buffered. After a successful decode the worker stops asking for frames
//! until the owner calls [`DecodePipeline::request_decode`] again.

mod decoder;
mod mailbox;

pub use decoder::{
    BarcodeDecoder, CandidatePoint, CharacterSet, DecodeHints, DecodeOutcome, QrDecoder,
    decode_image,
};
pub use mailbox::{FrameMailbox, RequestToken};

use crate::backends::camera::types::{FrameBuffer, FrameSink, Rect};
use crate::errors::ScanError;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Receives candidate points found while decoding
pub type PointSink = Arc<dyn Fn(&[CandidatePoint]) + Send + Sync>;

/// Emitted once per successful decode
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub text: String,
    pub captured_at: Instant,
    /// The full frame the text came from, when snapshots are enabled
    pub snapshot: Option<FrameBuffer>,
}

/// Pipeline settings fixed at start
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineConfig {
    pub hints: DecodeHints,
    /// Only this part of each frame is decoded, in frame pixels
    pub region: Option<Rect>,
    pub keep_snapshot: bool,
}

pub struct DecodePipeline {
    mailbox: Arc<FrameMailbox>,
    region: Arc<Mutex<Option<Rect>>>,
    decodes: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl DecodePipeline {
    /// Spawn the worker
    ///
    /// Nothing is decoded until the first [`DecodePipeline::request_decode`].
    pub fn start(
        decoder: Arc<dyn BarcodeDecoder>,
        config: PipelineConfig,
        events: Sender<DecodedFrame>,
        points: Option<PointSink>,
    ) -> Self {
        let mailbox = Arc::new(FrameMailbox::new());
        let region = Arc::new(Mutex::new(config.region));
        let decodes = Arc::new(AtomicU64::new(0));

        info!(charset = %config.hints.character_set, region = ?config.region, "Starting decode pipeline");

        let worker = {
            let mailbox = Arc::clone(&mailbox);
            let region = Arc::clone(&region);
            let decodes = Arc::clone(&decodes);
            thread::spawn(move || {
                let worker = Worker {
                    decoder,
                    config,
                    mailbox,
                    region,
                    decodes,
                    events,
                    points,
                };
                worker.run();
            })
        };

        Self {
            mailbox,
            region,
            decodes,
            worker: Some(worker),
        }
    }

    /// Callback for the camera: hands frames to the worker without blocking
    pub fn frame_sink(&self) -> FrameSink {
        let mailbox = Arc::clone(&self.mailbox);
        Arc::new(move |frame| {
            mailbox.offer(frame);
        })
    }

    /// Ask the worker to decode the next frame
    ///
    /// Coalesced: returns false if a request is already outstanding.
    pub fn request_decode(&self) -> bool {
        let accepted = self.mailbox.request();
        trace!(accepted, "Decode requested");
        accepted
    }

    /// Restrict decoding to a region of each frame
    pub fn set_decode_region(&self, region: Option<Rect>) {
        match self.region.lock() {
            Ok(mut guard) => *guard = region,
            Err(poisoned) => *poisoned.into_inner() = region,
        }
    }

    /// Number of decoder invocations so far
    pub fn decode_count(&self) -> u64 {
        self.decodes.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Stop the worker and wait for it
    ///
    /// When this returns the worker thread has exited; it will not decode
    /// or emit anything else. Idempotent.
    pub fn quit(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        debug!("Stopping decode pipeline");
        self.mailbox.close();
        if let Err(e) = handle.join() {
            warn!("Decode worker panicked: {:?}", e);
        }
        info!(
            decodes = self.decode_count(),
            dropped = self.mailbox.dropped(),
            "Decode pipeline stopped"
        );
    }
}

impl Drop for DecodePipeline {
    fn drop(&mut self) {
        self.quit();
    }
}

struct Worker {
    decoder: Arc<dyn BarcodeDecoder>,
    config: PipelineConfig,
    mailbox: Arc<FrameMailbox>,
    region: Arc<Mutex<Option<Rect>>>,
    decodes: Arc<AtomicU64>,
    events: Sender<DecodedFrame>,
    points: Option<PointSink>,
}

impl Worker {
    fn run(self) {
        debug!("Decode worker started");

        while let Some(frame) = self.mailbox.next() {
            let region = match self.region.lock() {
                Ok(guard) => *guard,
                Err(poisoned) => *poisoned.into_inner(),
            };
            let started = Instant::now();
            let outcome = self.decode(&frame, region);
            let count = self.decodes.fetch_add(1, Ordering::SeqCst) + 1;

            trace!(
                count,
                width = frame.width,
                height = frame.height,
                elapsed_ms = started.elapsed().as_millis(),
                ?outcome,
                "Frame decoded"
            );

            match outcome {
                DecodeOutcome::Success(text) => {
                    self.mailbox.finish(false);
                    if self.mailbox.is_closed() {
                        break;
                    }
                    let event = DecodedFrame {
                        text,
                        captured_at: frame.captured_at,
                        snapshot: self.config.keep_snapshot.then_some(frame),
                    };
                    if self.events.send(event).is_err() {
                        debug!("Event receiver gone, stopping decode worker");
                        break;
                    }
                }
                DecodeOutcome::Empty => self.mailbox.finish(true),
                DecodeOutcome::Error(reason) => {
                    let error = ScanError::DecodeTransient(reason);
                    trace!(error = %error, "Frame dropped");
                    self.mailbox.finish(true);
                }
            }
        }

        debug!("Decode worker exiting");
    }

    fn decode(&self, frame: &FrameBuffer, region: Option<Rect>) -> DecodeOutcome {
        let cropped;
        let target = match region {
            Some(r) => {
                cropped = frame.crop(&r);
                &cropped
            }
            None => frame,
        };

        let mut points = Vec::new();
        let result = catch_unwind(AssertUnwindSafe(|| {
            self.decoder
                .decode(target, &self.config.hints, &mut points)
        }));
        let outcome = result.unwrap_or_else(|_| {
            warn!("Decoder panicked, treating frame as failed");
            DecodeOutcome::Error("decoder panicked".to_string())
        });

        if !points.is_empty()
            && let Some(sink) = &self.points
        {
            sink(&points);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    struct CountingDecoder {
        calls: AtomicUsize,
        outcome: DecodeOutcome,
    }

    impl BarcodeDecoder for CountingDecoder {
        fn decode(
            &self,
            frame: &FrameBuffer,
            _hints: &DecodeHints,
            points: &mut Vec<CandidatePoint>,
        ) -> DecodeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            points.push(CandidatePoint {
                x: frame.width as f32,
                y: frame.height as f32,
            });
            self.outcome.clone()
        }
    }

    fn frame() -> FrameBuffer {
        FrameBuffer::new(8, 8, vec![0; 64]).unwrap()
    }

    fn counting(outcome: DecodeOutcome) -> Arc<CountingDecoder> {
        Arc::new(CountingDecoder {
            calls: AtomicUsize::new(0),
            outcome,
        })
    }

    #[test]
    fn test_two_requests_one_decode() {
        let decoder = counting(DecodeOutcome::Success("x".into()));
        let (tx, rx) = mpsc::channel();
        let mut pipeline =
            DecodePipeline::start(decoder.clone(), PipelineConfig::default(), tx, None);

        assert!(pipeline.request_decode());
        assert!(!pipeline.request_decode());

        let sink = pipeline.frame_sink();
        sink(frame());
        rx.recv_timeout(Duration::from_secs(2)).unwrap();

        // Nobody re-armed, so later frames are not decoded
        sink(frame());
        sink(frame());
        thread::sleep(Duration::from_millis(50));
        pipeline.quit();

        assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_empty_outcome_rerequests() {
        let decoder = counting(DecodeOutcome::Empty);
        let (tx, _rx) = mpsc::channel();
        let mut pipeline =
            DecodePipeline::start(decoder.clone(), PipelineConfig::default(), tx, None);
        pipeline.request_decode();

        let sink = pipeline.frame_sink();
        for _ in 0..20 {
            sink(frame());
            thread::sleep(Duration::from_millis(5));
        }
        pipeline.quit();

        assert!(
            decoder.calls.load(Ordering::SeqCst) > 1,
            "empty outcomes should keep the pipeline asking for frames"
        );
    }

    #[test]
    fn test_error_outcome_is_silent_and_rerequests() {
        let decoder = counting(DecodeOutcome::Error("format".into()));
        let (tx, rx) = mpsc::channel();
        let mut pipeline =
            DecodePipeline::start(decoder.clone(), PipelineConfig::default(), tx, None);
        pipeline.request_decode();

        let sink = pipeline.frame_sink();
        for _ in 0..20 {
            sink(frame());
            thread::sleep(Duration::from_millis(5));
        }
        pipeline.quit();

        assert!(decoder.calls.load(Ordering::SeqCst) > 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_region_crop_and_points() {
        let decoder = counting(DecodeOutcome::Success("x".into()));
        let (tx, rx) = mpsc::channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let points: PointSink = Arc::new(move |p: &[CandidatePoint]| {
            sink_seen.lock().unwrap().extend_from_slice(p);
        });
        let config = PipelineConfig {
            region: Some(Rect::new(2, 2, 6, 5)),
            keep_snapshot: true,
            ..Default::default()
        };
        let mut pipeline = DecodePipeline::start(decoder, config, tx, Some(points));
        pipeline.request_decode();
        pipeline.frame_sink()(frame());

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        pipeline.quit();

        // The decoder saw the 4x3 crop, the snapshot is the whole frame
        assert_eq!(seen.lock().unwrap()[0], CandidatePoint { x: 4.0, y: 3.0 });
        assert_eq!(event.snapshot.map(|f| f.width), Some(8));
    }

    #[test]
    fn test_decoder_panic_is_contained() {
        struct Panicking;
        impl BarcodeDecoder for Panicking {
            fn decode(
                &self,
                _: &FrameBuffer,
                _: &DecodeHints,
                _: &mut Vec<CandidatePoint>,
            ) -> DecodeOutcome {
                panic!("boom");
            }
        }

        let (tx, rx) = mpsc::channel();
        let mut pipeline =
            DecodePipeline::start(Arc::new(Panicking), PipelineConfig::default(), tx, None);
        pipeline.request_decode();
        pipeline.frame_sink()(frame());
        thread::sleep(Duration::from_millis(50));

        assert_eq!(pipeline.mailbox.token(), RequestToken::Pending);
        pipeline.quit();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_quit_is_idempotent() {
        let (tx, _rx) = mpsc::channel();
        let mut pipeline =
            DecodePipeline::start(Arc::new(QrDecoder), PipelineConfig::default(), tx, None);
        pipeline.quit();
        pipeline.quit();
        assert!(!pipeline.is_running());
        assert!(!pipeline.request_decode());
    }
}
