//! Progress-callback trait for generation events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GeneratorConfigBuilder::progress_callback`] to receive
//! events as the generator walks documents and fragments.
//!
//! # Example
//!
//! ```rust
//! use latex2image::{GenerationProgressCallback, GeneratorConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     rendered: AtomicUsize,
//! }
//!
//! impl GenerationProgressCallback for CountingCallback {
//!     fn on_fragment_rendered(&self, split: &str, file_name: &str) {
//!         let n = self.rendered.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("[{split}] #{n} {file_name}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { rendered: AtomicUsize::new(0) });
//!
//! let config = GeneratorConfig::builder()
//!     .progress_callback(counter as Arc<dyn GenerationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the generator as it processes documents and fragments.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called before the fragments of a source file are processed.
    ///
    /// # Arguments
    /// * `path`      — the `.tex` file
    /// * `fragments` — number of table fragments found in it
    fn on_document_start(&self, path: &Path, fragments: usize) {
        let _ = (path, fragments);
    }

    /// Called when a fragment has been rendered and recorded.
    fn on_fragment_rendered(&self, split: &str, file_name: &str) {
        let _ = (split, file_name);
    }

    /// Called when a fragment is rejected or fails to render.
    ///
    /// # Arguments
    /// * `reason` — human-readable reason
    fn on_fragment_skipped(&self, split: &str, reason: &str) {
        let _ = (split, reason);
    }

    /// Called once when a split reaches its quota.
    fn on_split_full(&self, split: &str, count: usize) {
        let _ = (split, count);
    }

    /// Called once at the end of the run.
    ///
    /// # Arguments
    /// * `rendered` — records written across all splits
    /// * `skipped`  — fragments rejected or failed
    fn on_generation_complete(&self, rendered: usize, skipped: usize) {
        let _ = (rendered, skipped);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GeneratorConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;
