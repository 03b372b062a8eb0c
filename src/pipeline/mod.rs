//! Pipeline stages around the LaTeX text processing.
//!
//! Each submodule wraps one external concern so the generator can be driven
//! with fakes in tests.
//!
//! ## Data Flow
//!
//! ```text
//! discover ──▶ archive ──▶ (latex) ──▶ compile ──▶ render
//! (corpus)     (unpack)    (fragments)  (pdflatex)  (pdfium → PNG)
//! ```
//!
//! 1. [`discover`] — classify corpus entries and list `.tex` sources
//! 2. [`archive`]  — unpack `.tar`, `.tar.gz`, `.tgz` and `.gz` sources
//! 3. [`compile`]  — run the TeX engine with a timeout
//! 4. [`render`]   — rasterise the single-page PDF; runs in `spawn_blocking`
//!    because pdfium is blocking

pub mod archive;
pub mod compile;
pub mod discover;
pub mod render;
