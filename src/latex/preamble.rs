//! Preamble resolution: reduce a document header to the `\def` /
//! `\newcommand` lines a standalone table needs.
//!
//! ## Steps
//!
//! 1. Cut the header region: everything before the first line-anchored
//!    `\begin{document}`.
//! 2. Keep only `\input`, `\newcommand` and `\def` lines, in order.
//! 3. Expand `\input{name}` recursively (relative to the including file,
//!    `.tex` appended when the name has no extension), applying step 2 to
//!    each included file. Inclusion depth is capped at [`MAX_INCLUDE_DEPTH`].
//! 4. Keep only `\newcommand` and `\def` lines.
//!
//! Package and environment declarations never survive: they belong to the
//! full paper, not to an isolated fragment.
//!
//! Missing include files and depth breaches do not fail resolution. The
//! directive text is left in place (and later dropped by step 4) and a
//! [`ResolveWarning`] is recorded.

use super::scan::strip_control_word;
use crate::error::{PreambleError, ResolveWarning};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Maximum nesting of `\input` files below the main document.
pub const MAX_INCLUDE_DEPTH: usize = 3;

/// Extension appended to `\input{name}` when `name` has none.
pub const DEFAULT_SOURCE_EXTENSION: &str = "tex";

const INPUT: &str = r"\input";
const NEWCOMMAND: &str = r"\newcommand";
const DEF: &str = r"\def";

static RE_BEGIN_DOCUMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*\\begin\{document\}").unwrap());

/// Reads included files. Swappable so resolution can be tested in memory.
pub trait IncludeLoader {
    fn load(&self, path: &Path) -> std::io::Result<String>;
}

/// Loads includes from the file system, decoding invalid UTF-8 lossily.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

impl IncludeLoader for FsLoader {
    fn load(&self, path: &Path) -> std::io::Result<String> {
        let bytes = std::fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Result of resolving one document's preamble.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPreamble {
    /// Final `\def` / `\newcommand` lines, trimmed. May be empty.
    pub text: String,
    /// Directive text after include expansion, before the final narrowing.
    /// Unexpanded `\input` lines are still visible here.
    pub expanded: String,
    /// Includes that could not be expanded.
    pub warnings: Vec<ResolveWarning>,
}

/// Text before the first line-anchored `\begin{document}`.
pub fn header_region(document: &str) -> Result<&str, PreambleError> {
    RE_BEGIN_DOCUMENT
        .find(document)
        .map(|m| &document[..m.start()])
        .ok_or(PreambleError::NoDocumentBody)
}

/// Whether the document has a body marker at all.
pub fn has_document_body(document: &str) -> bool {
    RE_BEGIN_DOCUMENT.is_match(document)
}

/// Resolve a document's preamble, reading includes from disk.
///
/// `base_dir` is the directory of the document; relative `\input` paths are
/// resolved against it.
pub fn resolve(document: &str, base_dir: &Path) -> Result<ResolvedPreamble, PreambleError> {
    resolve_with(document, base_dir, &FsLoader)
}

/// Resolve a document's preamble with a custom include loader.
pub fn resolve_with<L: IncludeLoader + ?Sized>(
    document: &str,
    base_dir: &Path,
    loader: &L,
) -> Result<ResolvedPreamble, PreambleError> {
    let header = header_region(document)?;
    let directives = keep_lines(header, &[INPUT, NEWCOMMAND, DEF]);

    let mut warnings = Vec::new();
    let expanded = expand_includes(&directives, base_dir, 0, loader, &mut warnings);
    let text = keep_lines(&expanded, &[NEWCOMMAND, DEF]).trim().to_string();

    debug!(
        "Resolved preamble: {} definition lines, {} warnings",
        text.lines().count(),
        warnings.len()
    );

    Ok(ResolvedPreamble {
        text,
        expanded,
        warnings,
    })
}

/// Lines whose first token (after leading whitespace) is one of `keywords`,
/// joined with `\n` in their original order.
pub fn keep_lines(text: &str, keywords: &[&str]) -> String {
    text.lines()
        .map(str::trim_start)
        .filter(|line| keywords.iter().any(|kw| strip_control_word(line, kw).is_some()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Replace every `\input{name}` in `text` with the directive lines of the
/// referenced file, recursively.
///
/// `depth` is the nesting level of `text` itself: 0 for the main document.
fn expand_includes<L: IncludeLoader + ?Sized>(
    text: &str,
    base_dir: &Path,
    depth: usize,
    loader: &L,
    warnings: &mut Vec<ResolveWarning>,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some((before, name, directive, after)) = next_input(rest) {
        out.push_str(before);
        let path = include_path(base_dir, name);

        if depth >= MAX_INCLUDE_DEPTH {
            warn!(
                "Maximum include depth {} reached, leaving {} unexpanded",
                MAX_INCLUDE_DEPTH, directive
            );
            warnings.push(ResolveWarning::MaxDepthExceeded {
                path,
                max_depth: MAX_INCLUDE_DEPTH,
            });
            out.push_str(directive);
        } else {
            match loader.load(&path) {
                Ok(content) => {
                    debug!("Expanding {} (depth {})", path.display(), depth + 1);
                    let directives = keep_lines(&content, &[INPUT, NEWCOMMAND, DEF]);
                    let child_base = path.parent().unwrap_or(base_dir);
                    out.push_str(&expand_includes(
                        &directives,
                        child_base,
                        depth + 1,
                        loader,
                        warnings,
                    ));
                }
                Err(e) => {
                    warn!("Cannot load included file {}: {}", path.display(), e);
                    warnings.push(ResolveWarning::IncludeUnavailable {
                        path,
                        detail: e.to_string(),
                    });
                    out.push_str(directive);
                }
            }
        }

        rest = after;
    }

    out.push_str(rest);
    out
}

/// Find the next `\input{name}` in `text`.
///
/// Returns `(before, name, whole_directive, after)`. Directives without a
/// braced, non-empty name are passed over as plain text.
fn next_input(text: &str) -> Option<(&str, &str, &str, &str)> {
    let mut cursor = 0;
    while let Some(offset) = text[cursor..].find(r"\input{") {
        let start = cursor + offset;
        let name_start = start + r"\input{".len();
        match text[name_start..].find('}') {
            Some(len) if len > 0 => {
                let end = name_start + len + 1;
                return Some((
                    &text[..start],
                    &text[name_start..name_start + len],
                    &text[start..end],
                    &text[end..],
                ));
            }
            Some(_) => cursor = name_start,
            None => return None,
        }
    }
    None
}

/// `base_dir/name`, with the default extension added when `name` has none.
pub fn include_path(base_dir: &Path, name: &str) -> PathBuf {
    let mut path = base_dir.join(name.trim());
    if path.extension().is_none() {
        path.set_extension(DEFAULT_SOURCE_EXTENSION);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io;

    /// In-memory file system for include tests.
    #[derive(Default)]
    struct MemLoader(HashMap<PathBuf, String>);

    impl MemLoader {
        fn with(mut self, path: &str, content: &str) -> Self {
            self.0.insert(PathBuf::from(path), content.to_string());
            self
        }
    }

    impl IncludeLoader for MemLoader {
        fn load(&self, path: &Path) -> io::Result<String> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "missing"))
        }
    }

    #[test]
    fn no_document_body() {
        let doc = "\\documentclass{article}\n\\def\\a{1}\n";
        assert_eq!(
            resolve_with(doc, Path::new("/p"), &MemLoader::default()),
            Err(PreambleError::NoDocumentBody)
        );
    }

    #[test]
    fn begin_document_must_start_a_line() {
        let doc = "\\def\\a{1} \\begin{document}\n";
        assert_eq!(header_region(doc), Err(PreambleError::NoDocumentBody));
        assert!(has_document_body("  \\begin{document}"));
    }

    #[test]
    fn keeps_only_definitions_in_order() {
        let doc = "\\documentclass{article}\n\
                   \\usepackage{booktabs}\n\
                   \\newcommand{\\x}{Y}\n\
                   \\definecolor{red}{rgb}{1,0,0}\n\
                   \x20 \\def\\z{Z}\n\
                   \\begin{document}\n\
                   \\def\\after{no}\n";
        let resolved = resolve_with(doc, Path::new("/p"), &MemLoader::default()).unwrap();
        assert_eq!(resolved.text, "\\newcommand{\\x}{Y}\n\\def\\z{Z}");
        assert!(resolved.warnings.is_empty());
    }

    #[test]
    fn empty_preamble_is_valid() {
        let doc = "\\documentclass{article}\n\\begin{document}\nhi\n\\end{document}";
        let resolved = resolve_with(doc, Path::new("/p"), &MemLoader::default()).unwrap();
        assert_eq!(resolved.text, "");
    }

    #[test]
    fn expands_relative_include_with_default_extension() {
        let loader = MemLoader::default()
            .with("/p/macros.tex", "\\usepackage{x}\n\\def\\m{M}\n\\input{sub/more}")
            .with("/p/sub/more.tex", "\\newcommand{\\n}{N}");
        let doc = "\\input{macros}\n\\begin{document}\n";
        let resolved = resolve_with(doc, Path::new("/p"), &loader).unwrap();
        assert_eq!(resolved.text, "\\def\\m{M}\n\\newcommand{\\n}{N}");
    }

    #[test]
    fn missing_include_is_left_in_place() {
        let doc = "\\input{gone}\n\\def\\a{1}\n\\begin{document}\n";
        let resolved = resolve_with(doc, Path::new("/p"), &MemLoader::default()).unwrap();
        assert!(resolved.expanded.contains("\\input{gone}"));
        assert_eq!(resolved.text, "\\def\\a{1}");
        assert!(matches!(
            resolved.warnings.as_slice(),
            [ResolveWarning::IncludeUnavailable { path, .. }] if path == Path::new("/p/gone.tex")
        ));
    }

    #[test]
    fn include_chain_stops_at_max_depth() {
        let loader = MemLoader::default()
            .with("/p/b.tex", "\\def\\b{B}\n\\input{c}")
            .with("/p/c.tex", "\\def\\c{C}\n\\input{d}")
            .with("/p/d.tex", "\\def\\d{D}\n\\input{e}")
            .with("/p/e.tex", "\\def\\e{E}");
        let doc = "\\def\\a{A}\n\\input{b}\n\\begin{document}\n";
        let resolved = resolve_with(doc, Path::new("/p"), &loader).unwrap();

        assert_eq!(resolved.text, "\\def\\a{A}\n\\def\\b{B}\n\\def\\c{C}\n\\def\\d{D}");
        assert!(resolved.expanded.contains("\\input{e}"));
        assert!(!resolved.expanded.contains("\\def\\e{E}"));
        assert_eq!(
            resolved.warnings,
            vec![ResolveWarning::MaxDepthExceeded {
                path: PathBuf::from("/p/e.tex"),
                max_depth: MAX_INCLUDE_DEPTH,
            }]
        );
    }

    #[test]
    fn self_include_terminates() {
        let loader = MemLoader::default().with("/p/loop.tex", "\\def\\l{L}\n\\input{loop}");
        let doc = "\\input{loop}\n\\begin{document}\n";
        let resolved = resolve_with(doc, Path::new("/p"), &loader).unwrap();
        assert_eq!(resolved.text.lines().count(), MAX_INCLUDE_DEPTH);
        assert_eq!(resolved.warnings.len(), 1);
    }

    #[test]
    fn include_with_extension_is_kept() {
        assert_eq!(
            include_path(Path::new("/p"), "defs.sty"),
            PathBuf::from("/p/defs.sty")
        );
        assert_eq!(include_path(Path::new("/p"), "defs"), PathBuf::from("/p/defs.tex"));
    }

    #[test]
    fn next_input_skips_empty_name() {
        assert_eq!(next_input(r"\input{}x"), None);
        assert_eq!(
            next_input(r"a\input{b}c"),
            Some(("a", "b", r"\input{b}", "c"))
        );
    }
}
