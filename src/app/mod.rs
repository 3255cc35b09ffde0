// SPDX-License-Identifier: MPL-2.0

//! Scanning session and everything the host draws
//!
//! # Architecture
//!
//! - `session`: [`CaptureSession`], the entry point for host shells
//! - `state`: lifecycle state machine driving the session
//! - `framing`: framing rect in screen and preview coordinates
//! - `inactivity`: idle session timeout
//! - `viewfinder`: overlay painter, candidate points and repaint ticker

pub mod framing;
pub mod inactivity;
pub mod session;
pub mod state;
pub mod viewfinder;

pub use framing::FramingGeometry;
pub use session::{CaptureSession, CloseReason, HostShell, PreviewTap, ScanPayload, Surface};
pub use state::{SessionState, Transition};
pub use viewfinder::{CandidatePoints, ViewfinderOverlay, ViewfinderStyle};
