// SPDX-License-Identifier: GPL-3.0-only

//! Single-slot frame handoff between the camera thread and the decode worker
//!
//! The slot holds at most one frame and one request token. Camera
//! callbacks overwrite the slot (most recent frame wins) and only when a
//! decode has been requested, so memory stays bounded no matter how far
//! decoding falls behind. The lock is only held for slot swaps.

use crate::backends::camera::types::FrameBuffer;
use std::sync::{Condvar, Mutex, MutexGuard};

/// State of the "decode next frame" token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestToken {
    /// Nobody asked for a frame
    Idle,
    /// A frame is wanted; the next one offered is kept
    Pending,
    /// The worker holds a frame and is decoding it
    Decoding,
}

struct Slot {
    frame: Option<FrameBuffer>,
    token: RequestToken,
    closed: bool,
    dropped: u64,
}

pub struct FrameMailbox {
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl Default for FrameMailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameMailbox {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                frame: None,
                token: RequestToken::Idle,
                closed: false,
                dropped: 0,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // A panic while holding the lock cannot leave the slot inconsistent
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ask for the next frame
    ///
    /// Returns false when a request is already outstanding (pending or
    /// being decoded); the call is then coalesced into that one.
    pub fn request(&self) -> bool {
        let mut slot = self.lock();
        if slot.closed || slot.token != RequestToken::Idle {
            return false;
        }
        slot.token = RequestToken::Pending;
        true
    }

    /// Offer a frame from the camera thread
    ///
    /// Kept only if a request is pending, replacing any older frame.
    /// Returns whether the frame was kept.
    pub fn offer(&self, frame: FrameBuffer) -> bool {
        let mut slot = self.lock();
        if slot.closed || slot.token != RequestToken::Pending {
            slot.dropped += 1;
            return false;
        }
        if slot.frame.replace(frame).is_some() {
            slot.dropped += 1;
        }
        drop(slot);
        self.ready.notify_one();
        true
    }

    /// Block until a requested frame is available or the mailbox closes
    ///
    /// Moves the token to [`RequestToken::Decoding`]; the caller must
    /// follow up with [`FrameMailbox::finish`].
    pub fn next(&self) -> Option<FrameBuffer> {
        let mut slot = self.lock();
        loop {
            if slot.closed {
                return None;
            }
            if slot.token == RequestToken::Pending
                && let Some(frame) = slot.frame.take()
            {
                slot.token = RequestToken::Decoding;
                return Some(frame);
            }
            slot = self
                .ready
                .wait(slot)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// End a decode; `rearm` immediately requests the next frame
    pub fn finish(&self, rearm: bool) {
        let mut slot = self.lock();
        if slot.token == RequestToken::Decoding {
            slot.token = if rearm {
                RequestToken::Pending
            } else {
                RequestToken::Idle
            };
        }
    }

    /// Wake the worker and refuse all further frames and requests
    pub fn close(&self) {
        let mut slot = self.lock();
        slot.closed = true;
        slot.frame = None;
        drop(slot);
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn token(&self) -> RequestToken {
        self.lock().token
    }

    /// Frames discarded because nobody wanted them or a newer one arrived
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn frame(value: u8) -> FrameBuffer {
        FrameBuffer::new(2, 2, vec![value; 4]).unwrap()
    }

    #[test]
    fn test_frames_dropped_without_request() {
        let mailbox = FrameMailbox::new();
        assert!(!mailbox.offer(frame(1)));
        assert_eq!(mailbox.dropped(), 1);
        assert_eq!(mailbox.token(), RequestToken::Idle);
    }

    #[test]
    fn test_requests_coalesce() {
        let mailbox = FrameMailbox::new();
        assert!(mailbox.request());
        assert!(!mailbox.request(), "second request must be coalesced");
        assert_eq!(mailbox.token(), RequestToken::Pending);
    }

    #[test]
    fn test_most_recent_frame_wins() {
        let mailbox = FrameMailbox::new();
        mailbox.request();
        assert!(mailbox.offer(frame(1)));
        assert!(mailbox.offer(frame(2)));
        let got = mailbox.next().unwrap();
        assert_eq!(got.data[0], 2);
        assert_eq!(mailbox.token(), RequestToken::Decoding);
        assert_eq!(mailbox.dropped(), 1);

        // No request outstanding while decoding
        assert!(!mailbox.offer(frame(3)));
        mailbox.finish(false);
        assert_eq!(mailbox.token(), RequestToken::Idle);
    }

    #[test]
    fn test_finish_with_rearm() {
        let mailbox = FrameMailbox::new();
        mailbox.request();
        mailbox.offer(frame(1));
        mailbox.next();
        mailbox.finish(true);
        assert_eq!(mailbox.token(), RequestToken::Pending);
    }

    #[test]
    fn test_close_wakes_waiting_worker() {
        let mailbox = Arc::new(FrameMailbox::new());
        let worker = {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || mailbox.next())
        };
        thread::sleep(Duration::from_millis(20));
        mailbox.close();
        assert!(worker.join().unwrap().is_none());
        assert!(!mailbox.request());
    }
}
