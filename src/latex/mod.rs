//! LaTeX text processing: preamble resolution, table extraction, fragment
//! assembly and label normalisation.
//!
//! Everything in this module is pure text work apart from
//! [`SourceDocument::load`] and the default include loader; nothing here
//! spawns processes or renders images.

pub mod document;
pub mod label;
pub mod macros;
pub mod preamble;
pub mod scan;
pub mod tables;

pub use document::{build_document, BuildOutcome, FragmentBuilder};
pub use label::{normalize_ground_truth, to_tagged, LabelFormat};
pub use macros::{MacroEntry, MacroKind, MacroStore};
pub use preamble::{resolve, resolve_with, IncludeLoader, ResolvedPreamble, MAX_INCLUDE_DEPTH};
pub use tables::{extract_tables, TableFragments};

use crate::error::Latex2ImageError;
use std::path::{Path, PathBuf};

/// A `.tex` file loaded into memory.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub text: String,
}

impl SourceDocument {
    /// Read a source file. Invalid UTF-8 is replaced rather than rejected;
    /// arXiv sources in legacy encodings are common.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Latex2ImageError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| Latex2ImageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_text(path, String::from_utf8_lossy(&bytes).into_owned()))
    }

    pub fn from_text(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    /// Directory that relative `\input` paths are resolved against.
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// `{parent}_{stem}`: the prefix shared by every artefact produced from
    /// this document.
    pub fn base_name(&self) -> String {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match self
            .path
            .parent()
            .and_then(Path::file_name)
            .map(|p| p.to_string_lossy())
        {
            Some(parent) => format!("{parent}_{stem}"),
            None => stem,
        }
    }

    pub fn resolve_preamble(&self) -> Result<ResolvedPreamble, crate::error::PreambleError> {
        resolve(&self.text, self.base_dir())
    }

    pub fn tables(&self) -> TableFragments<'_> {
        TableFragments::new(&self.text)
    }
}
