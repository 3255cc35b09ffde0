// SPDX-License-Identifier: GPL-3.0-only

//! Terminal scanner host
//!
//! Renders the camera preview and the viewfinder overlay to the terminal
//! using Unicode half-block characters, one cell per two vertical pixels.
//! The terminal's pixel grid is the session's render surface.

use crate::app::framing::FramingGeometry;
use crate::app::session::{CaptureSession, CloseReason, HostShell, ScanPayload, Surface};
use crate::app::viewfinder::{
    CandidatePoints, OverlayTicker, ViewfinderOverlay, ViewfinderStyle,
};
use crate::backends::camera::{CameraBackend, FrameBuffer, Size};
use crate::config::ScanOptions;
use crate::constants::overlay::ANIMATION_DELAY;
use crate::errors::ScanError;
use crate::pipelines::decode::QrDecoder;

use crossterm::{
    event::{
        self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use image::RgbaImage;
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::io::{self, Write, stdout};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Rung on each result
const BELL: &[u8] = b"\x07";

/// What the shell saw, read by the draw loop
#[derive(Default)]
struct HostState {
    geometry: Option<FramingGeometry>,
    results: Vec<ScanPayload>,
    error: Option<String>,
    closed: Option<CloseReason>,
}

type SharedState = Arc<Mutex<HostState>>;

fn lock(state: &SharedState) -> std::sync::MutexGuard<'_, HostState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

struct TerminalShell {
    state: SharedState,
    beep: bool,
}

impl HostShell for TerminalShell {
    fn display_rotation(&self) -> i32 {
        0
    }

    fn on_geometry(&mut self, geometry: &FramingGeometry) {
        lock(&self.state).geometry = Some(*geometry);
    }

    fn on_result(&mut self, payload: ScanPayload) {
        lock(&self.state).results.push(payload);
        if self.beep {
            let mut out = stdout();
            if let Err(e) = out.write_all(BELL).and_then(|()| out.flush()) {
                debug!(error = %e, "Failed to ring bell");
            }
        }
    }

    fn on_error(&mut self, error: &ScanError) {
        lock(&self.state).error = Some(error.to_string());
    }

    fn on_closed(&mut self, reason: CloseReason) {
        let mut state = lock(&self.state);
        state.closed = Some(reason);
        state.geometry = None;
    }
}

/// Run an interactive scan in the terminal
///
/// Decoded payloads are printed after the terminal is restored.
pub fn run(
    backend: Arc<dyn CameraBackend>,
    options: ScanOptions,
    save_dir: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_time()
        .build()?;

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let backend_term = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend_term)?;

    let state: SharedState = Arc::default();
    let result = run_app(&mut terminal, runtime.handle(), backend, options, &state);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableFocusChange, LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result?;

    let state = lock(&state);
    for payload in &state.results {
        println!("{}", payload.text);
        if let Some(dir) = &save_dir {
            match payload.save_snapshot(dir) {
                Ok(Some(path)) => println!("Frame saved: {}", path.display()),
                Ok(None) => {}
                Err(e) => error!(error = %e, "Failed to save frame"),
            }
        }
    }
    if let Some(message) = &state.error {
        return Err(message.clone().into());
    }
    Ok(())
}

/// Surface size in pixels for a terminal area, reserving the status line
fn surface_size(columns: u16, rows: u16) -> Size {
    Size::new(columns as u32, rows.saturating_sub(1) as u32 * 2)
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    runtime: &tokio::runtime::Handle,
    backend: Arc<dyn CameraBackend>,
    options: ScanOptions,
    state: &SharedState,
) -> Result<(), Box<dyn std::error::Error>> {
    let latest: Arc<Mutex<Option<FrameBuffer>>> = Arc::default();
    let dirty = Arc::new(AtomicBool::new(true));

    let points = CandidatePoints::new();
    let mut overlay = ViewfinderOverlay::new(ViewfinderStyle::compact(), Arc::clone(&points));

    let tap_latest = Arc::clone(&latest);
    let tap_dirty = Arc::clone(&dirty);
    let mut session = CaptureSession::new(
        backend,
        Arc::new(QrDecoder),
        Box::new(TerminalShell {
            state: Arc::clone(state),
            beep: options.beep_on_result,
        }),
        options,
    )
    .with_point_sink(points.sink())
    .with_preview_tap(Arc::new(move |frame: &FrameBuffer| {
        if let Ok(mut slot) = tap_latest.lock() {
            *slot = Some(frame.clone());
        }
        tap_dirty.store(true, Ordering::Relaxed);
    }));

    let tick_dirty = Arc::clone(&dirty);
    let _ticker = OverlayTicker::attach(runtime, ANIMATION_DELAY, move || {
        tick_dirty.store(true, Ordering::Relaxed);
    });

    let area = terminal.size()?;
    session.surface_ready(Surface {
        id: 1,
        size: surface_size(area.width, area.height),
    });
    info!(state = %session.state(), "Terminal session started");

    let mut status = String::new();

    loop {
        session.pump_now();
        {
            let host = lock(state);
            overlay.set_geometry(host.geometry);
            if let Some(last) = host.results.last() {
                status = format!("Scanned: {}", last.text.replace('\n', " "));
            }
            if host.closed.is_some() {
                break;
            }
        }

        if dirty.swap(false, Ordering::Relaxed) {
            let frame = latest.lock().ok().and_then(|f| f.clone());
            terminal.draw(|f| {
                let area = f.area();
                let view_area = Rect {
                    x: area.x,
                    y: area.y,
                    width: area.width,
                    height: area.height.saturating_sub(1),
                };
                let surface = surface_size(area.width, area.height);
                let mut canvas = RgbaImage::new(surface.width, surface.height);
                if let (Some(frame), Some(geometry)) = (&frame, overlay.geometry()) {
                    paint_preview(&mut canvas, frame, geometry.transposed);
                }
                overlay.draw(&mut canvas, Instant::now());
                f.render_widget(&CanvasWidget { canvas: &canvas }, view_area);

                let status_area = Rect {
                    x: area.x,
                    y: area.height.saturating_sub(1),
                    width: area.width,
                    height: 1,
                };
                let message = build_status_message(&session, &status);
                f.render_widget(StatusBar { message: &message }, status_area);
            })?;
        }

        // Handle input with timeout for frame updates
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
                    {
                        session.cancel();
                        break;
                    }
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => {
                            session.cancel();
                            break;
                        }
                        KeyCode::Char('t') => {
                            if !session.toggle_torch() {
                                status = "Torch not available".to_string();
                            }
                        }
                        KeyCode::Char('+') | KeyCode::Char('=') => {
                            session.zoom(true);
                        }
                        KeyCode::Char('-') => {
                            session.zoom(false);
                        }
                        _ => {}
                    }
                    dirty.store(true, Ordering::Relaxed);
                }
                Event::Resize(columns, rows) => {
                    session.surface_changed(surface_size(columns, rows));
                    dirty.store(true, Ordering::Relaxed);
                }
                Event::FocusLost => session.pause(),
                Event::FocusGained => session.resume(),
                _ => {}
            }
        }
    }

    info!(state = %session.state(), delivered = session.delivered(), "Terminal session ended");
    Ok(())
}

fn build_status_message(session: &CaptureSession, status: &str) -> String {
    let mut msg = format!("[{}]", session.state());
    if let Some(zoom) = session.zoom_tenths() {
        msg.push_str(&format!(" {}.{}x", zoom / 10, zoom % 10));
    }
    if session.torch_enabled() {
        msg.push_str(" torch");
    }
    msg.push_str(" | 't' torch | '+'/'-' zoom | 'q' quit");
    if !status.is_empty() {
        msg.push_str(" | ");
        msg.push_str(status);
    }
    msg
}

/// Draw `frame` scaled to cover the canvas, centered
///
/// Matches the mapping the framing geometry assumes, so the overlay lines
/// up with what the decoder sees. `transposed` swaps frame axes when the
/// frame is oriented differently from the canvas.
fn paint_preview(canvas: &mut RgbaImage, frame: &FrameBuffer, transposed: bool) {
    let (cw, ch) = (canvas.width(), canvas.height());
    if cw == 0 || ch == 0 || frame.width == 0 || frame.height == 0 {
        return;
    }
    let oriented = if transposed {
        frame.size().transposed()
    } else {
        frame.size()
    };
    let scale = (oriented.width as f64 / cw as f64).min(oriented.height as f64 / ch as f64);
    let ox = oriented.width as f64 / 2.0 - cw as f64 * scale / 2.0;
    let oy = oriented.height as f64 / 2.0 - ch as f64 * scale / 2.0;

    for (x, y, pixel) in canvas.enumerate_pixels_mut() {
        let sx = ((ox + (x as f64 + 0.5) * scale) as u32).min(oriented.width - 1);
        let sy = ((oy + (y as f64 + 0.5) * scale) as u32).min(oriented.height - 1);
        let (fx, fy) = if transposed { (sy, sx) } else { (sx, sy) };
        let v = frame.luma(fx, fy);
        *pixel = image::Rgba([v, v, v, 255]);
    }
}

/// Widget that renders an RGBA canvas using half-block characters
struct CanvasWidget<'a> {
    canvas: &'a RgbaImage,
}

impl Widget for &CanvasWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let canvas = self.canvas;
        if canvas.width() == 0 || canvas.height() == 0 {
            let msg = "Waiting for camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        }

        // Upper half (▀) colored with fg, lower half with bg
        for ty in 0..area.height {
            for tx in 0..area.width {
                let (px, py) = (tx as u32, ty as u32 * 2);
                if px >= canvas.width() || py + 1 >= canvas.height() {
                    continue;
                }
                let top = canvas.get_pixel(px, py).0;
                let bottom = canvas.get_pixel(px, py + 1).0;
                if let Some(cell) = buf.cell_mut((area.x + tx, area.y + ty)) {
                    cell.set_char('▀');
                    cell.set_fg(Color::Rgb(top[0], top[1], top[2]));
                    cell.set_bg(Color::Rgb(bottom[0], bottom[1], bottom[2]));
                }
            }
        }
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            ratatui::style::Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_reserves_status_line() {
        assert_eq!(surface_size(120, 41), Size::new(120, 80));
        assert_eq!(surface_size(80, 0), Size::new(80, 0));
    }

    #[test]
    fn test_cover_preview_crops_center() {
        // Left half dark, right half bright; a square canvas sees the middle
        let data: Vec<u8> = (0..8 * 4).map(|i| if i % 8 < 4 { 0 } else { 200 }).collect();
        let frame = FrameBuffer::new(8, 4, data).unwrap();
        let mut canvas = RgbaImage::new(4, 4);
        paint_preview(&mut canvas, &frame, false);

        assert_eq!(canvas.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(3, 3).0, [200, 200, 200, 255]);
    }

    #[test]
    fn test_transposed_preview_swaps_axes() {
        // Top row bright in a landscape frame shows as left column
        let data: Vec<u8> = (0..8 * 4).map(|i| if i < 8 { 255 } else { 0 }).collect();
        let frame = FrameBuffer::new(8, 4, data).unwrap();
        let mut canvas = RgbaImage::new(4, 8);
        paint_preview(&mut canvas, &frame, true);

        assert_eq!(canvas.get_pixel(0, 5).0[0], 255);
        assert_eq!(canvas.get_pixel(3, 5).0[0], 0);
    }
}
