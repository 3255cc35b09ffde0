// SPDX-License-Identifier: GPL-3.0-only

//! Capture session state machine
//!
//! [`SessionState::next`] is the only place that decides which state
//! follows which event. The session applies its side effects around it.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No surface yet
    #[default]
    Idle,
    /// Surface arrived, camera not yet asked to open
    SurfaceReady,
    /// Camera open in progress
    CameraOpening,
    /// Camera streaming, frames being decoded
    Previewing,
    /// Camera released until resume
    Paused,
    /// Terminal
    Closed,
}

/// Events that move the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    SurfaceArrived,
    OpenStarted,
    OpenSucceeded,
    OpenFailed,
    Decoded { continuous: bool },
    Pause,
    Resume { surface_valid: bool },
    SurfaceLost,
    Cancel,
    InactivityTimeout,
}

impl SessionState {
    /// The state after `transition`, or `None` if it is not legal here
    pub fn next(self, transition: Transition) -> Option<SessionState> {
        use SessionState::*;
        use Transition::*;

        match (self, transition) {
            (Closed, _) => None,

            (Idle, SurfaceArrived) => Some(SurfaceReady),
            (SurfaceReady, OpenStarted) => Some(CameraOpening),
            (CameraOpening, OpenSucceeded) => Some(Previewing),
            (CameraOpening, OpenFailed) => Some(Closed),

            (Previewing, Decoded { continuous: true }) => Some(Previewing),
            (Previewing, Decoded { continuous: false }) => Some(Closed),

            (Idle | SurfaceReady | CameraOpening | Previewing, Pause) => Some(Paused),
            // Resume with a live surface reopens the camera in place
            (Paused, Resume { surface_valid: true }) => Some(Previewing),
            (Paused, Resume { surface_valid: false }) => Some(Idle),
            (Paused, OpenFailed) => Some(Closed),

            (SurfaceReady | CameraOpening | Previewing, SurfaceLost) => Some(Idle),

            (_, Cancel) => Some(Closed),
            (Previewing, InactivityTimeout) => Some(Closed),

            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        *self == SessionState::Closed
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::SurfaceReady => "surface-ready",
            SessionState::CameraOpening => "camera-opening",
            SessionState::Previewing => "previewing",
            SessionState::Paused => "paused",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::SessionState::*;
    use super::Transition::*;
    use super::*;

    #[test]
    fn test_happy_path() {
        let s = Idle.next(SurfaceArrived).unwrap();
        let s = s.next(OpenStarted).unwrap();
        let s = s.next(OpenSucceeded).unwrap();
        assert_eq!(s, Previewing);
        assert_eq!(s.next(Decoded { continuous: false }), Some(Closed));
        assert_eq!(s.next(Decoded { continuous: true }), Some(Previewing));
    }

    #[test]
    fn test_open_failure_is_terminal() {
        assert_eq!(CameraOpening.next(OpenFailed), Some(Closed));
        assert_eq!(Closed.next(SurfaceArrived), None);
        assert_eq!(Closed.next(Cancel), None);
    }

    #[test]
    fn test_pause_resume() {
        assert_eq!(Previewing.next(Pause), Some(Paused));
        assert_eq!(Paused.next(Resume { surface_valid: true }), Some(Previewing));
        assert_eq!(Paused.next(Resume { surface_valid: false }), Some(Idle));
        assert_eq!(Previewing.next(Resume { surface_valid: true }), None);
    }

    #[test]
    fn test_surface_loss_returns_to_idle() {
        assert_eq!(Previewing.next(SurfaceLost), Some(Idle));
        assert_eq!(Paused.next(SurfaceLost), None);
    }

    #[test]
    fn test_decode_outside_preview_is_ignored() {
        assert_eq!(Paused.next(Decoded { continuous: false }), None);
        assert_eq!(Idle.next(Decoded { continuous: true }), None);
    }
}
