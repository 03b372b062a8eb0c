//! Error types for the latex2image library.
//!
//! Failures fall into two groups:
//!
//! * [`Latex2ImageError`] — **Fatal**: the run cannot proceed at all
//!   (input directory missing, output directory not writable, pdfium library
//!   unavailable, invalid configuration). Returned as `Err` from
//!   [`crate::generate::Generator::run`].
//!
//! * Everything else is **non-fatal** and scoped to one unit of work:
//!   [`FragmentError`] for a single table fragment that failed to compile or
//!   render, [`PreambleError`] for a document with no body,
//!   [`ResolveWarning`] for an `\input` that could not be expanded, and
//!   [`ArchiveError`] for a paper source that could not be unpacked. The
//!   generator logs these and moves on to the next sibling.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the latex2image library.
#[derive(Debug, Error)]
pub enum Latex2ImageError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The corpus path does not exist.
    #[error("Input not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// The corpus path exists but could not be listed.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create a split directory or the work directory.
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium for your platform, or set PDFIUM_LIB_PATH=/path/to/libpdfium\n\
to point at an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal failure for a single table fragment.
///
/// Every variant maps to the `RenderFailed` outcome: the fragment is skipped,
/// its intermediate files are removed and no dataset record is written.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FragmentError {
    /// The standalone `.tex` source could not be written.
    #[error("failed to write '{path}': {detail}")]
    WriteFailed { path: PathBuf, detail: String },

    /// The compiler could not be started or exited without producing a PDF.
    #[error("compilation failed: {detail}")]
    CompileFailed { detail: String },

    /// The compiler did not finish within the configured timeout.
    #[error("compilation timed out after {secs}s")]
    CompileTimeout { secs: u64 },

    /// The compiler exited but the expected PDF is missing.
    #[error("compiler produced no PDF at '{path}'")]
    MissingPdf { path: PathBuf },

    /// The PDF has more than one page (the table overflowed the page).
    #[error("PDF contains {pages} pages, expected exactly one")]
    MultiPage { pages: usize },

    /// pdfium failed to open or render the PDF.
    #[error("rasterisation failed: {detail}")]
    RasterizeFailed { detail: String },

    /// The rendered bitmap is below the minimum size.
    #[error("image size too small: {width}x{height} (minimum required: {min_width}x{min_height})")]
    ImageTooSmall {
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
    },

    /// The PNG could not be written.
    #[error("failed to save image '{path}': {detail}")]
    SaveFailed { path: PathBuf, detail: String },

    /// The dataset record could not be appended.
    #[error("failed to append record to '{path}': {detail}")]
    RecordFailed { path: PathBuf, detail: String },
}

impl FragmentError {
    /// The fragment never produced a PDF.
    pub fn is_compile_failure(&self) -> bool {
        matches!(
            self,
            FragmentError::WriteFailed { .. }
                | FragmentError::CompileFailed { .. }
                | FragmentError::CompileTimeout { .. }
                | FragmentError::MissingPdf { .. }
        )
    }
}

/// Preamble resolution failed for a whole document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreambleError {
    /// No line-anchored `\begin{document}` marker; the file is not a main
    /// document (typically a section pulled in with `\input`).
    #[error("not found \\begin{{document}}")]
    NoDocumentBody,
}

/// A recoverable problem met while expanding `\input` directives.
///
/// Resolution always completes; warnings describe the directives that were
/// left unexpanded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveWarning {
    /// The referenced file could not be read; the directive is kept as-is.
    #[error("cannot load included file '{path}': {detail}")]
    IncludeUnavailable { path: PathBuf, detail: String },

    /// Expanding this include would exceed the recursion bound.
    #[error("maximum include depth {max_depth} exceeded at '{path}'")]
    MaxDepthExceeded { path: PathBuf, max_depth: usize },
}

/// A paper source archive could not be unpacked.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Reading the archive or writing an entry failed.
    #[error("Archive I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file extension is not a recognised archive type.
    #[error("Unsupported archive format: '{path}'")]
    UnsupportedFormat { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_failures_are_classified() {
        assert!(FragmentError::CompileTimeout { secs: 5 }.is_compile_failure());
        assert!(FragmentError::MissingPdf { path: "a.pdf".into() }.is_compile_failure());
        assert!(!FragmentError::MultiPage { pages: 2 }.is_compile_failure());
        assert!(!FragmentError::RasterizeFailed { detail: String::new() }.is_compile_failure());
    }

    #[test]
    fn image_too_small_display() {
        let e = FragmentError::ImageTooSmall {
            width: 80,
            height: 120,
            min_width: 100,
            min_height: 100,
        };
        let msg = e.to_string();
        assert!(msg.contains("80x120"), "got: {msg}");
        assert!(msg.contains("100x100"), "got: {msg}");
    }

    #[test]
    fn no_document_body_display() {
        assert_eq!(
            PreambleError::NoDocumentBody.to_string(),
            "not found \\begin{document}"
        );
    }

    #[test]
    fn compile_timeout_display() {
        let e = FragmentError::CompileTimeout { secs: 5 };
        assert!(e.to_string().contains("5s"));
    }

    #[test]
    fn fragment_error_serialises() {
        let e = FragmentError::MultiPage { pages: 2 };
        let json = serde_json::to_string(&e).expect("serialise");
        assert!(json.contains("MultiPage"));
    }

    #[test]
    fn max_depth_display() {
        let e = ResolveWarning::MaxDepthExceeded {
            path: PathBuf::from("e.tex"),
            max_depth: 3,
        };
        assert!(e.to_string().contains("depth 3"));
    }
}
