//! Pipeline stages for PDF-to-deck conversion.
//!
//! Each submodule implements one transformation step; the
//! [`crate::controller`] sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ analyze ──▶ reconcile ──▶ assemble
//! (bytes)   (pdfium)   (vision)     (pure)       (.pptx)
//!              └─ encode (JPEG / base64)
//! ```
//!
//! 1. [`input`]     read a path or URL into memory and check it is a PDF
//! 2. [`render`]    rasterise every page in order; `spawn_blocking` because
//!    pdfium is synchronous
//! 3. [`encode`]    JPEG for the deck, base64 attachments for the model
//! 4. [`analyze`]   the only network call; returns untrusted JSON
//! 5. [`reconcile`] turns that JSON into exactly one complete slide per page
//! 6. [`assemble`]  contain-fit layout, file naming and the atomic write

pub mod analyze;
pub mod assemble;
pub mod encode;
pub mod input;
pub mod reconcile;
pub mod render;
