//! # latex2image
//!
//! Build image → LaTeX table-recognition datasets from arXiv paper sources.
//!
//! Every `tabular` found inside a `table` environment is compiled on its own
//! as a `standalone` document, rasterised to PNG and paired with its LaTeX
//! source in a per-split `metadata.jsonl` log.
//!
//! ## Pipeline Overview
//!
//! ```text
//! corpus
//!  │
//!  ├─ 1. Unpack    arXiv bulk tarballs and per-paper .gz sources
//!  ├─ 2. Preamble  \def / \newcommand lines, \input expanded (depth ≤ 3)
//!  ├─ 3. Extract   first tabular of every table environment
//!  ├─ 4. Build     reject parameterised commands, inline plain macros
//!  ├─ 5. Compile   pdflatex -interaction=nonstopmode (timeout)
//!  ├─ 6. Render    pdfium, exactly one page, minimum size
//!  └─ 7. Record    PNG + {file_name, ground_truth} line per split
//! ```
//!
//! Steps 2–4 are pure text processing in [`latex`] and usable on their own:
//!
//! ```rust
//! use latex2image::latex::{build_document, extract_tables, resolve_with, BuildOutcome};
//! use latex2image::latex::preamble::FsLoader;
//! use std::path::Path;
//!
//! let doc = "\\documentclass{article}\n\\newcommand{\\x}{Y}\n\\begin{document}\n\
//!            \\begin{table}\\begin{tabular}{c}\\x\\end{tabular}\\end{table}\n\\end{document}";
//! let preamble = resolve_with(doc, Path::new("."), &FsLoader).unwrap();
//! let tables = extract_tables(doc);
//! let BuildOutcome::Built(standalone) = build_document(&preamble.text, &tables[0]) else {
//!     panic!("rejected");
//! };
//! assert!(standalone.contains("\\begin{tabular}{c}Y\\end{tabular}"));
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use latex2image::{generate, GeneratorConfig, SplitQuota};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GeneratorConfig::builder()
//!         .splits(vec![SplitQuota::new("train", 1000), SplitQuota::new("test", 100)])
//!         .build()?;
//!     let stats = generate("arxiv/", "output/", config).await?;
//!     eprintln!("{} tables rendered, {} skipped", stats.rendered, stats.skipped());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `latex2image` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! latex2image = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod dataset;
pub mod error;
pub mod generate;
pub mod latex;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GeneratorConfig, GeneratorConfigBuilder, LabelFormat, SplitQuota};
pub use dataset::{validate_metadata, Metadata, SplitCounters, ValidationReport, METADATA_FILE};
pub use error::{ArchiveError, FragmentError, Latex2ImageError, PreambleError, ResolveWarning};
pub use generate::{generate, FragmentOutcome, Generator, SplitStatus};
pub use latex::SourceDocument;
pub use output::GenerationStats;
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
