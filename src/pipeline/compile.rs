//! TeX compilation of standalone fragment documents.
//!
//! The compiler runs in non-stop mode so a broken table never waits for
//! terminal input. Its exit status is not trusted: TeX engines often exit
//! non-zero after recoverable errors and still write a usable PDF, so the
//! success signal is the PDF existing afterwards.

use crate::error::FragmentError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Turns a `.tex` file into a PDF.
#[allow(async_fn_in_trait)]
pub trait TexCompiler {
    /// Compile `tex_path`, writing output into `output_dir`.
    ///
    /// Returns the path of the produced PDF.
    async fn compile(&self, tex_path: &Path, output_dir: &Path) -> Result<PathBuf, FragmentError>;
}

/// A `pdflatex`-compatible engine invoked as a child process.
#[derive(Debug, Clone)]
pub struct PdfLatex {
    program: String,
    timeout: Duration,
}

impl PdfLatex {
    pub fn new(program: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            program: program.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for PdfLatex {
    fn default() -> Self {
        Self::new("pdflatex", 5)
    }
}

impl TexCompiler for PdfLatex {
    async fn compile(&self, tex_path: &Path, output_dir: &Path) -> Result<PathBuf, FragmentError> {
        let pdf_path = pdf_path_for(tex_path, output_dir);

        let mut cmd = Command::new(&self.program);
        cmd.arg("-interaction=nonstopmode")
            .arg(format!("-output-directory={}", output_dir.display()))
            .arg(tex_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let status = match tokio::time::timeout(self.timeout, cmd.status()).await {
            Err(_) => {
                return Err(FragmentError::CompileTimeout {
                    secs: self.timeout.as_secs(),
                })
            }
            Ok(Err(e)) => {
                return Err(FragmentError::CompileFailed {
                    detail: format!("cannot run '{}': {}", self.program, e),
                })
            }
            Ok(Ok(status)) => status,
        };
        debug!("{} exited with {} for {}", self.program, status, tex_path.display());

        if pdf_path.is_file() {
            Ok(pdf_path)
        } else if status.success() {
            Err(FragmentError::MissingPdf { path: pdf_path })
        } else {
            Err(FragmentError::CompileFailed {
                detail: format!("{} exited with {}", self.program, status),
            })
        }
    }
}

/// `output_dir/<stem>.pdf` for a given source file.
pub fn pdf_path_for(tex_path: &Path, output_dir: &Path) -> PathBuf {
    let stem = tex_path.file_stem().unwrap_or_default().to_string_lossy();
    output_dir.join(format!("{stem}.pdf"))
}

/// Remove `base.<ext>` for each extension, ignoring files that do not exist.
///
/// `base` must carry an extension (normally `.tex`); it is swapped, not
/// appended to.
pub fn remove_artifacts(base: &Path, extensions: &[&str]) {
    for ext in extensions {
        let path = base.with_extension(ext);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => debug!("Could not remove {}: {}", path.display(), e),
        }
    }
}
