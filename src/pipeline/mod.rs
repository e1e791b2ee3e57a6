//! Pipeline stages for turning one PDF page into one page record.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own. pdfium stays behind the [`pdf`] seam (its page helpers live in
//! [`render`] and [`extract`]); everything else works on plain bytes and
//! strings.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌── text gate fires ──▶ render ─────────┐
//! extract ──▶ classify                               ├─▶ page ──▶ overlap ──▶ assemble
//!  (text)     └── otherwise ──▶ extract (images) ────┘   (VLM)    (tail)      (record)
//! ```
//!
//! 1. [`source`]   discover PDFs and check their magic bytes
//! 2. [`pdf`]      the document seam; pdfium behind a trait
//! 3. [`extract`]  native text and size-filtered embedded images
//! 4. [`classify`] pick a processing mode
//! 5. [`render`]   rasterise HYBRID and VISION_FULL pages
//! 6. [`encode`]   PNG encoding and base64 wrapping for the interpreter
//! 7. [`page`]     snapshot on the pdfium thread, resolve on the async side
//! 8. [`overlap`]  carry the previous page's text tail
//! 9. [`assemble`] build the final content and record

pub mod assemble;
pub mod classify;
pub mod encode;
pub mod extract;
pub mod overlap;
pub mod page;
pub mod pdf;
pub mod render;
pub mod source;
