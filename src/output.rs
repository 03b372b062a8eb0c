//! Run summary returned by the generator.

use serde::Serialize;
use std::collections::BTreeMap;

/// Counters for one generation run.
///
/// Serialisable so the CLI can print it as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationStats {
    /// Paper sources (archives or directories) visited.
    pub papers: usize,
    /// `.tex` files whose fragments were processed.
    pub documents: usize,
    /// `.tex` files skipped: unreadable, or no preamble could be found.
    pub skipped_documents: usize,
    /// Fragments examined.
    pub fragments: usize,
    /// Fragments written to the dataset.
    pub rendered: usize,
    /// Fragments using a parameterised command.
    pub rejected: usize,
    /// Fragments that failed to compile, rasterise or save.
    pub failed: usize,
    /// Records written per split.
    pub per_split: BTreeMap<String, usize>,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
}

impl GenerationStats {
    /// Fragments that produced no record.
    pub fn skipped(&self) -> usize {
        self.rejected + self.failed
    }
}
