//! Configuration types for dataset generation.
//!
//! All generation behaviour is controlled through [`GeneratorConfig`], built
//! via its [`GeneratorConfigBuilder`]. Callers set only the knobs they care
//! about and rely on the defaults below for the rest.

use crate::error::Latex2ImageError;
use crate::progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub use crate::latex::label::LabelFormat;

/// One dataset partition and the number of records it may hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitQuota {
    pub name: String,
    pub quota: usize,
}

impl SplitQuota {
    pub fn new(name: impl Into<String>, quota: usize) -> Self {
        Self {
            name: name.into(),
            quota,
        }
    }
}

impl std::str::FromStr for SplitQuota {
    type Err = String;

    /// Parse `name=quota`, e.g. `train=10000`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, quota) = s
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=QUOTA, got '{s}'"))?;
        let quota = quota
            .trim()
            .parse()
            .map_err(|e| format!("invalid quota in '{s}': {e}"))?;
        Ok(Self::new(name.trim(), quota))
    }
}

/// Configuration for a generation run.
///
/// Built via [`GeneratorConfig::builder()`] or using
/// [`GeneratorConfig::default()`].
///
/// # Example
/// ```rust
/// use latex2image::{GeneratorConfig, SplitQuota};
///
/// let config = GeneratorConfig::builder()
///     .splits(vec![SplitQuota::new("train", 50), SplitQuota::new("test", 10)])
///     .render_dpi(200)
///     .build()
///     .unwrap();
/// assert_eq!(config.splits.len(), 2);
/// ```
#[derive(Clone)]
pub struct GeneratorConfig {
    /// Splits filled in order. Default: train 10 000, validation 1 000,
    /// test 1 000.
    ///
    /// A quota of 0 is allowed and skips the split.
    pub splits: Vec<SplitQuota>,

    /// TeX engine invoked for each fragment. Default: `pdflatex`.
    pub compiler: String,

    /// Per-fragment compile timeout in seconds. Default: 5.
    ///
    /// Tables that pull in heavy packages or loop on an error in
    /// non-stop mode are abandoned after this.
    pub compile_timeout_secs: u64,

    /// Rasterisation DPI. Range: 72–600. Default: 300.
    pub render_dpi: u32,

    /// Rendered images narrower than this are discarded. Default: 100.
    pub min_image_width: u32,

    /// Rendered images shorter than this are discarded. Default: 100.
    pub min_image_height: u32,

    /// Keep `.tex`, `.pdf`, `.log` and `.aux` next to each image. Default: false.
    pub keep_intermediates: bool,

    /// Encoding of the `ground_truth` field. Default: [`LabelFormat::Raw`].
    pub label_format: LabelFormat,

    /// Where archives are unpacked. Default: a temporary directory removed
    /// at the end of the run.
    pub work_dir: Option<PathBuf>,

    /// Receives per-document and per-fragment events.
    pub progress_callback: ProgressCallback,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            splits: vec![
                SplitQuota::new("train", 10_000),
                SplitQuota::new("validation", 1_000),
                SplitQuota::new("test", 1_000),
            ],
            compiler: "pdflatex".to_string(),
            compile_timeout_secs: 5,
            render_dpi: 300,
            min_image_width: 100,
            min_image_height: 100,
            keep_intermediates: false,
            label_format: LabelFormat::default(),
            work_dir: None,
            progress_callback: Arc::new(NoopProgressCallback),
        }
    }
}

impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("splits", &self.splits)
            .field("compiler", &self.compiler)
            .field("compile_timeout_secs", &self.compile_timeout_secs)
            .field("render_dpi", &self.render_dpi)
            .field("min_image_width", &self.min_image_width)
            .field("min_image_height", &self.min_image_height)
            .field("keep_intermediates", &self.keep_intermediates)
            .field("label_format", &self.label_format)
            .field("work_dir", &self.work_dir)
            .field("progress_callback", &"<dyn GenerationProgressCallback>")
            .finish()
    }
}

impl GeneratorConfig {
    /// Create a new builder for `GeneratorConfig`.
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder {
            config: Self::default(),
        }
    }

    /// Sum of all split quotas.
    pub fn total_quota(&self) -> usize {
        self.splits.iter().map(|s| s.quota).sum()
    }
}

/// Builder for [`GeneratorConfig`].
#[derive(Debug)]
pub struct GeneratorConfigBuilder {
    config: GeneratorConfig,
}

impl GeneratorConfigBuilder {
    pub fn splits(mut self, splits: Vec<SplitQuota>) -> Self {
        self.config.splits = splits;
        self
    }

    pub fn compiler(mut self, program: impl Into<String>) -> Self {
        self.config.compiler = program.into();
        self
    }

    pub fn compile_timeout_secs(mut self, secs: u64) -> Self {
        self.config.compile_timeout_secs = secs;
        self
    }

    pub fn render_dpi(mut self, dpi: u32) -> Self {
        self.config.render_dpi = dpi;
        self
    }

    pub fn min_image_size(mut self, width: u32, height: u32) -> Self {
        self.config.min_image_width = width;
        self.config.min_image_height = height;
        self
    }

    pub fn keep_intermediates(mut self, v: bool) -> Self {
        self.config.keep_intermediates = v;
        self
    }

    pub fn label_format(mut self, format: LabelFormat) -> Self {
        self.config.label_format = format;
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn GenerationProgressCallback>) -> Self {
        self.config.progress_callback = cb;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GeneratorConfig, Latex2ImageError> {
        let c = &self.config;
        if c.splits.is_empty() {
            return Err(Latex2ImageError::InvalidConfig(
                "At least one split is required".into(),
            ));
        }
        let mut seen = HashSet::new();
        for split in &c.splits {
            if split.name.trim().is_empty() {
                return Err(Latex2ImageError::InvalidConfig(
                    "Split names must not be empty".into(),
                ));
            }
            if !seen.insert(split.name.as_str()) {
                return Err(Latex2ImageError::InvalidConfig(format!(
                    "Duplicate split name '{}'",
                    split.name
                )));
            }
        }
        if c.compiler.trim().is_empty() {
            return Err(Latex2ImageError::InvalidConfig(
                "Compiler program must not be empty".into(),
            ));
        }
        if c.compile_timeout_secs == 0 {
            return Err(Latex2ImageError::InvalidConfig(
                "Compile timeout must be ≥ 1 second".into(),
            ));
        }
        if c.render_dpi < 72 || c.render_dpi > 600 {
            return Err(Latex2ImageError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.render_dpi
            )));
        }
        Ok(self.config)
    }
}
