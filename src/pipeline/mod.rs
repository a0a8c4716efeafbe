//! Pipeline stages for document field extraction.
//!
//! Each submodule implements exactly one step so each is testable on its own
//! and the rendering backend or model can be swapped without touching the
//! others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ llm ──▶ parse
//! (URL)     (pdfium)   (base64)   (VLM)   (JSON / scan)
//!              │
//!              └──────▶ cleanup (always, once)
//! ```
//!
//! 1. [`input`]  : validate the URL and download the document
//! 2. [`render`] : write one PNG per page under a request-unique prefix
//! 3. [`encode`] : read each PNG back and base64-wrap it
//! 4. [`llm`]    : one model call carrying every page in order
//! 5. [`parse`]  : tolerant recovery of the two fields from the answer
//! 6. [`cleanup`]: the janitor that deletes every page image

pub mod cleanup;
pub mod encode;
pub mod input;
pub mod llm;
pub mod parse;
pub mod render;
