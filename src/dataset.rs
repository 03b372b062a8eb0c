//! Dataset records: the per-split `metadata.jsonl` log and split counters.
//!
//! Each split directory holds its PNG images plus one `metadata.jsonl` file
//! with a JSON object per line:
//!
//! ```text
//! {"file_name":"2003.00001_main_table_0.png","ground_truth":"\\begin{tabular}..."}
//! ```
//!
//! Records are appended and never rewritten during generation. Only
//! [`validate_metadata`] rewrites the file, to prune dangling records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the per-split record log.
pub const METADATA_FILE: &str = "metadata.jsonl";

/// One dataset record: an image and its LaTeX transcription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Image file name, relative to the split directory.
    pub file_name: String,
    pub ground_truth: String,
}

/// Append one record to `split_dir/metadata.jsonl`, creating the file on
/// first use.
pub fn append_record(split_dir: &Path, record: &Metadata) -> io::Result<()> {
    let mut line = serde_json::to_string(record).map_err(io::Error::other)?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(split_dir.join(METADATA_FILE))?;
    file.write_all(line.as_bytes())?;
    debug!("Appended record {}", record.file_name);
    Ok(())
}

/// Read every parseable record of a metadata log.
pub fn read_records(path: &Path) -> io::Result<Vec<Metadata>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .filter_map(|line| serde_json::from_str(line.trim()).ok())
        .collect())
}

/// Accepted-record count per split name.
///
/// A split that has never been touched counts as zero. Counts only grow
/// within a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SplitCounters {
    counts: BTreeMap<String, usize>,
}

impl SplitCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, split: &str) -> usize {
        self.counts.get(split).copied().unwrap_or(0)
    }

    /// Increment and return the new count.
    pub fn increment(&mut self, split: &str) -> usize {
        let count = self.counts.entry(split.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn is_full(&self, split: &str, quota: usize) -> bool {
        self.get(split) >= quota
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Outcome of [`validate_metadata`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub path: PathBuf,
    /// Records whose image exists.
    pub kept: usize,
    /// Records whose image is missing, or that have no `file_name`.
    pub pruned: usize,
    /// Lines that are not valid JSON records.
    pub invalid: usize,
}

/// Rewrite a metadata log keeping only records whose image file exists next
/// to it. Blank lines are dropped silently.
pub fn validate_metadata(path: &Path) -> io::Result<ValidationReport> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let text = std::fs::read_to_string(path)?;

    let mut report = ValidationReport {
        path: path.to_path_buf(),
        ..Default::default()
    };
    let mut valid = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: Metadata = match serde_json::from_str(trimmed) {
            Ok(record) => record,
            Err(e) => {
                warn!("Invalid JSON line in {}: {}", path.display(), e);
                report.invalid += 1;
                continue;
            }
        };
        if record.file_name.is_empty() {
            warn!("Record without file_name in {}", path.display());
            report.pruned += 1;
            continue;
        }
        let image = dir.join(&record.file_name);
        if image.is_file() {
            valid.push_str(line);
            valid.push('\n');
            report.kept += 1;
        } else {
            warn!("Image does not exist: {}", image.display());
            report.pruned += 1;
        }
    }

    std::fs::write(path, valid)?;
    info!(
        "{}: kept {} records, pruned {}, {} invalid lines",
        path.display(),
        report.kept,
        report.pruned,
        report.invalid
    );
    Ok(report)
}
