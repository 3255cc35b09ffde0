// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for scanning
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Decoding an image file
//! - Scanning without a preview, printing every result

use scanner::backends::camera::CameraBackend;
use scanner::backends::camera::v4l2::{V4l2Backend, supported_sizes};
use scanner::config::ScanOptions;
use scanner::pipelines::decode::{CharacterSet, DecodeHints, DecodeOutcome, QrDecoder, decode_image};
use scanner::{CaptureSession, CloseReason, HostShell, ScanError, ScanPayload, Surface};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Surface size assumed when no screen is attached
const HEADLESS_SURFACE: scanner::Size = scanner::Size::new(1280, 720);

/// List all available cameras
pub fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    let cameras = V4l2Backend::new().enumerate();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for camera in &cameras {
        println!("  [{}] {} ({})", camera.index, camera.name, camera.path);

        // Show top 3 resolutions
        let sizes = supported_sizes(&camera.path);
        if !sizes.is_empty() {
            let size_strs: Vec<String> = sizes.iter().take(3).map(|s| s.to_string()).collect();
            println!("      Sizes: {}", size_strs.join(", "));
        }
        println!();
    }

    Ok(())
}

/// Decode a QR code from an image file and print its text
pub fn decode_file(
    path: &Path,
    charset: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let character_set = match charset.as_deref() {
        Some(name) => CharacterSet::from_name(name)
            .ok_or_else(|| format!("Unknown character set: {}", name))?,
        None => CharacterSet::default(),
    };
    let hints = DecodeHints { character_set };

    match decode_image(&QrDecoder, path, &hints)? {
        DecodeOutcome::Success(text) => {
            println!("{}", text);
            Ok(())
        }
        DecodeOutcome::Empty => Err(format!("No QR code found in {}", path.display()).into()),
        DecodeOutcome::Error(e) => Err(format!("Decode failed: {}", e).into()),
    }
}

/// Shell that prints results to stdout
struct PrintShell {
    save_dir: Option<PathBuf>,
    closed: Arc<Mutex<Option<CloseReason>>>,
    error: Arc<Mutex<Option<String>>>,
}

impl HostShell for PrintShell {
    fn display_rotation(&self) -> i32 {
        0
    }

    fn on_result(&mut self, payload: ScanPayload) {
        println!("{}", payload.text);
        if let Some(dir) = &self.save_dir {
            match payload.save_snapshot(dir) {
                Ok(Some(path)) => eprintln!("Frame saved: {}", path.display()),
                Ok(None) => {}
                Err(e) => eprintln!("Failed to save frame: {}", e),
            }
        }
    }

    fn on_error(&mut self, error: &ScanError) {
        if let Ok(mut slot) = self.error.lock() {
            *slot = Some(error.to_string());
        }
    }

    fn on_closed(&mut self, reason: CloseReason) {
        if let Ok(mut slot) = self.closed.lock() {
            *slot = Some(reason);
        }
    }
}

/// Scan until a result, Ctrl+C or `timeout`
pub fn scan_headless(
    backend: Arc<dyn CameraBackend>,
    options: ScanOptions,
    timeout: Option<Duration>,
    save_dir: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let closed = Arc::new(Mutex::new(None));
    let error = Arc::new(Mutex::new(None));
    let shell = PrintShell {
        save_dir,
        closed: Arc::clone(&closed),
        error: Arc::clone(&error),
    };
    let continuous = options.continuous;
    let mut session = CaptureSession::new(backend, Arc::new(QrDecoder), Box::new(shell), options);

    // Set up Ctrl+C handler
    let stop = Arc::new(AtomicBool::new(false));
    let stop_clone = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        stop_clone.store(true, Ordering::SeqCst);
    })?;

    session.surface_ready(Surface {
        id: 0,
        size: HEADLESS_SURFACE,
    });
    if continuous {
        eprintln!("Scanning... Press Ctrl+C to stop.");
    } else {
        eprintln!("Scanning...");
    }

    let start = Instant::now();
    let reason = loop {
        session.pump_now();
        if let Ok(slot) = closed.lock()
            && let Some(reason) = *slot
        {
            break reason;
        }
        if stop.load(Ordering::SeqCst) {
            session.cancel();
            break CloseReason::Cancelled;
        }
        if let Some(limit) = timeout
            && start.elapsed() >= limit
        {
            session.cancel();
            if session.delivered() == 0 {
                return Err(format!("No QR code found within {}s", limit.as_secs()).into());
            }
            break CloseReason::Cancelled;
        }
        std::thread::sleep(Duration::from_millis(20));
    };

    match reason {
        CloseReason::Fatal => {
            let message = error
                .lock()
                .ok()
                .and_then(|e| e.clone())
                .unwrap_or_else(|| "Camera unavailable".to_string());
            Err(message.into())
        }
        CloseReason::Inactive if session.delivered() == 0 => {
            Err("Session closed after inactivity".into())
        }
        _ => Ok(()),
    }
}
