// SPDX-License-Identifier: MPL-2.0

//! Background processing pipelines
//!
//! # Pipeline Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Camera Frame │ ──▶ │  Decode Pipeline  │ ──▶ │ DecodedFrame │
//! │   (GRAY8)    │     │  - framing crop   │     │   (text)     │
//! │              │     │  - QR decode      │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! The live preview never waits on decoding: frames that arrive while the
//! worker is busy replace each other in a single slot.
//!
//! # Modules
//!
//! - [`decode`]: frame mailbox, decode worker and the barcode decoder

pub mod decode;
