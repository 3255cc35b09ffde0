// SPDX-License-Identifier: MPL-2.0

//! Shared fakes for integration tests
//!
//! The mock backend records what the session does to it and hands the
//! frame sink back to the test so frames can be pushed by hand.

#![allow(dead_code)]

use scanner::backends::camera::{
    BackendError, BackendResult, CameraBackend, CameraFacing, CameraHandle, CameraInfo,
    CameraParameters, CameraSettings, FrameBuffer, FrameSink, Size,
};
use scanner::pipelines::decode::{BarcodeDecoder, CandidatePoint, DecodeHints, DecodeOutcome};
use scanner::{CaptureSession, CloseReason, HostShell, ScanError, ScanPayload, Surface};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// What the mock device saw
#[derive(Default)]
pub struct DeviceLog {
    pub sink: Option<FrameSink>,
    pub opens: usize,
    pub releases: usize,
    pub applied: Vec<CameraSettings>,
    pub torch: bool,
    pub zoom: Option<u32>,
}

pub struct MockBackend {
    pub cameras: Vec<CameraInfo>,
    pub parameters: CameraParameters,
    pub fail_open: Option<BackendError>,
    pub log: Arc<Mutex<DeviceLog>>,
}

impl MockBackend {
    pub fn new(preview_sizes: Vec<Size>) -> Self {
        Self {
            cameras: vec![camera(0, CameraFacing::Back)],
            parameters: CameraParameters {
                picture_sizes: preview_sizes.clone(),
                preview_sizes,
                ..CameraParameters::default()
            },
            fail_open: None,
            log: Arc::default(),
        }
    }

    pub fn busy() -> Self {
        Self {
            fail_open: Some(BackendError::Busy("held by another process".to_string())),
            ..Self::new(vec![Size::new(640, 480)])
        }
    }

    /// Push a frame into the running preview; false if nothing is listening
    pub fn push(&self, frame: FrameBuffer) -> bool {
        let sink = self.log.lock().unwrap().sink.clone();
        match sink {
            Some(sink) => {
                sink(frame);
                true
            }
            None => false,
        }
    }

    pub fn previewing(&self) -> bool {
        self.log.lock().unwrap().sink.is_some()
    }
}

pub fn camera(index: usize, facing: CameraFacing) -> CameraInfo {
    CameraInfo {
        index,
        name: format!("Mock Camera {}", index),
        path: format!("/dev/video{}", index),
        facing,
        orientation: 90,
    }
}

impl CameraBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn enumerate(&self) -> Vec<CameraInfo> {
        self.cameras.clone()
    }

    fn open(&self, camera: &CameraInfo) -> BackendResult<Box<dyn CameraHandle>> {
        if let Some(e) = &self.fail_open {
            return Err(e.clone());
        }
        self.log.lock().unwrap().opens += 1;
        Ok(Box::new(MockHandle {
            info: camera.clone(),
            parameters: self.parameters.clone(),
            log: Arc::clone(&self.log),
            released: false,
        }))
    }
}

struct MockHandle {
    info: CameraInfo,
    parameters: CameraParameters,
    log: Arc<Mutex<DeviceLog>>,
    released: bool,
}

impl CameraHandle for MockHandle {
    fn info(&self) -> &CameraInfo {
        &self.info
    }

    fn parameters(&self) -> BackendResult<CameraParameters> {
        Ok(self.parameters.clone())
    }

    fn apply(&mut self, settings: &CameraSettings) -> BackendResult<CameraSettings> {
        let mut log = self.log.lock().unwrap();
        log.applied.push(*settings);
        log.torch = settings.torch;
        log.zoom = settings.zoom_tenths;
        Ok(*settings)
    }

    fn start_preview(&mut self, sink: FrameSink) -> BackendResult<()> {
        self.log.lock().unwrap().sink = Some(sink);
        Ok(())
    }

    fn stop_preview(&mut self) {
        self.log.lock().unwrap().sink = None;
    }

    fn is_previewing(&self) -> bool {
        self.log.lock().unwrap().sink.is_some()
    }

    fn set_torch(&mut self, on: bool) -> BackendResult<()> {
        self.log.lock().unwrap().torch = on;
        Ok(())
    }

    fn set_zoom(&mut self, tenths: u32) -> BackendResult<()> {
        self.log.lock().unwrap().zoom = Some(tenths);
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut log = self.log.lock().unwrap();
        log.sink = None;
        log.releases += 1;
    }
}

/// Decoder that answers from a script, then reports empty frames
#[derive(Default)]
pub struct ScriptedDecoder {
    script: Mutex<VecDeque<DecodeOutcome>>,
    calls: AtomicUsize,
}

impl ScriptedDecoder {
    pub fn new(outcomes: impl IntoIterator<Item = DecodeOutcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            calls: AtomicUsize::new(0),
        })
    }

    /// Never finds anything
    pub fn silent() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Succeeds `times` times with `text`
    pub fn always(text: &str, times: usize) -> Arc<Self> {
        Self::new((0..times).map(|_| DecodeOutcome::Success(text.to_string())))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BarcodeDecoder for ScriptedDecoder {
    fn decode(
        &self,
        _frame: &FrameBuffer,
        _hints: &DecodeHints,
        points: &mut Vec<CandidatePoint>,
    ) -> DecodeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        points.push(CandidatePoint { x: 1.0, y: 1.0 });
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(DecodeOutcome::Empty)
    }
}

/// Everything the session told its host
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    KeepScreenOn(bool),
    LockOrientation(i32),
    Geometry(Size),
    Result(String),
    Error(String),
    Closed(CloseReason),
}

pub struct RecordingShell {
    pub rotation: i32,
    pub events: Arc<Mutex<Vec<HostEvent>>>,
}

impl RecordingShell {
    pub fn new() -> (Self, Arc<Mutex<Vec<HostEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                rotation: 0,
                events: Arc::clone(&events),
            },
            events,
        )
    }
}

impl HostShell for RecordingShell {
    fn display_rotation(&self) -> i32 {
        self.rotation
    }

    fn set_keep_screen_on(&mut self, on: bool) {
        self.events.lock().unwrap().push(HostEvent::KeepScreenOn(on));
    }

    fn lock_orientation(&mut self, degrees: i32) {
        self.events
            .lock()
            .unwrap()
            .push(HostEvent::LockOrientation(degrees));
    }

    fn on_geometry(&mut self, geometry: &scanner::app::FramingGeometry) {
        self.events
            .lock()
            .unwrap()
            .push(HostEvent::Geometry(geometry.preview));
    }

    fn on_result(&mut self, payload: ScanPayload) {
        self.events
            .lock()
            .unwrap()
            .push(HostEvent::Result(payload.text));
    }

    fn on_error(&mut self, error: &ScanError) {
        self.events
            .lock()
            .unwrap()
            .push(HostEvent::Error(error.to_string()));
    }

    fn on_closed(&mut self, reason: CloseReason) {
        self.events.lock().unwrap().push(HostEvent::Closed(reason));
    }
}

pub fn results(events: &Mutex<Vec<HostEvent>>) -> Vec<String> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            HostEvent::Result(text) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

pub fn closed(events: &Mutex<Vec<HostEvent>>) -> Vec<CloseReason> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            HostEvent::Closed(reason) => Some(*reason),
            _ => None,
        })
        .collect()
}

pub fn gray_frame(size: Size) -> FrameBuffer {
    FrameBuffer::new(size.width, size.height, vec![128; size.area() as usize]).unwrap()
}

pub fn surface(width: u32, height: u32) -> Surface {
    Surface {
        id: 1,
        size: Size::new(width, height),
    }
}

/// Pump the session until `done` holds or two seconds pass
pub fn pump_until(session: &mut CaptureSession, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        session.pump_now();
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

/// Push frames and pump until `done` holds or two seconds pass
pub fn feed_until(
    session: &mut CaptureSession,
    backend: &MockBackend,
    frame_size: Size,
    mut done: impl FnMut() -> bool,
) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        backend.push(gray_frame(frame_size));
        session.pump_now();
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}
