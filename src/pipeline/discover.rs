//! Corpus discovery: which inputs hold papers, and which files are sources.

use super::archive::{arxiv_year_index, ArchiveKind};
use std::io;
use std::path::{Path, PathBuf};

/// Extension of LaTeX sources.
pub const TEX_EXTENSION: &str = "tex";

/// One top-level entry of the corpus directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorpusEntry {
    /// `arXiv_src_YYMM_NNN.tar`: many compressed papers.
    Bulk { path: PathBuf, year_index: String },
    /// A single compressed paper (`.gz`, `.tar.gz`, `.tgz`, `.tar`).
    Paper { path: PathBuf },
    /// An already extracted paper directory.
    Directory { path: PathBuf },
}

impl CorpusEntry {
    pub fn path(&self) -> &Path {
        match self {
            CorpusEntry::Bulk { path, .. }
            | CorpusEntry::Paper { path }
            | CorpusEntry::Directory { path } => path,
        }
    }
}

/// Classify one path, or `None` when it is neither a directory nor an
/// archive.
pub fn classify(path: &Path) -> Option<CorpusEntry> {
    if path.is_dir() {
        return Some(CorpusEntry::Directory {
            path: path.to_path_buf(),
        });
    }
    let kind = ArchiveKind::detect(path)?;
    let name = path.file_name()?.to_string_lossy();
    if kind == ArchiveKind::Tar && name.starts_with("arXiv_src_") {
        if let Some(year_index) = arxiv_year_index(&name) {
            return Some(CorpusEntry::Bulk {
                path: path.to_path_buf(),
                year_index,
            });
        }
    }
    Some(CorpusEntry::Paper {
        path: path.to_path_buf(),
    })
}

/// Top-level corpus entries of `root`, sorted by path.
///
/// A `root` that is itself an archive yields just that archive. Loose
/// `.tex` files directly under `root` make `root` a paper directory.
pub fn corpus_entries(root: &Path) -> io::Result<Vec<CorpusEntry>> {
    if !root.is_dir() {
        return Ok(classify(root).into_iter().collect());
    }

    let mut children = Vec::new();
    let mut has_loose_sources = false;
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if is_tex(&path) {
            has_loose_sources = true;
        }
        children.push(path);
    }

    if has_loose_sources {
        return Ok(vec![CorpusEntry::Directory {
            path: root.to_path_buf(),
        }]);
    }

    children.sort();
    Ok(children.iter().filter_map(|p| classify(p)).collect())
}

/// All `.tex` files below `root`, recursively, sorted by path.
pub fn find_tex_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk(root, &mut |path| {
        if is_tex(path) {
            files.push(path.to_path_buf());
        }
    })?;
    files.sort();
    Ok(files)
}

/// Every archive below `root`, recursively, sorted by path.
pub fn find_archives(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk(root, &mut |path| {
        if ArchiveKind::detect(path).is_some() {
            files.push(path.to_path_buf());
        }
    })?;
    files.sort();
    Ok(files)
}

fn is_tex(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(TEX_EXTENSION))
}

fn walk(dir: &Path, visit: &mut dyn FnMut(&Path)) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            walk(&path, visit)?;
        } else {
            visit(&path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn finds_tex_files_sorted_and_recursive() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.tex"));
        touch(&dir.path().join("a/z.tex"));
        touch(&dir.path().join("a/fig.png"));
        touch(&dir.path().join("UPPER.TEX"));

        let files = find_tex_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("UPPER.TEX"),
                PathBuf::from("a/z.tex"),
                PathBuf::from("b.tex"),
            ]
        );
    }

    #[test]
    fn classifies_corpus_entries() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("arXiv_src_2003_026.tar"));
        touch(&dir.path().join("2003.00001.gz"));
        touch(&dir.path().join("notes.txt"));
        std::fs::create_dir(dir.path().join("paper")).unwrap();

        let entries = corpus_entries(dir.path()).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(matches!(&entries[0], CorpusEntry::Paper { .. }));
        assert!(
            matches!(&entries[1], CorpusEntry::Bulk { year_index, .. } if year_index == "2003_026")
        );
        assert!(matches!(&entries[2], CorpusEntry::Directory { .. }));
    }

    #[test]
    fn loose_sources_make_root_a_paper() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("main.tex"));
        touch(&dir.path().join("old.tar.gz"));

        let entries = corpus_entries(dir.path()).unwrap();
        assert_eq!(
            entries,
            vec![CorpusEntry::Directory {
                path: dir.path().to_path_buf()
            }]
        );
    }

    #[test]
    fn archive_root_is_a_single_entry() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("2003.00001.tar.gz");
        touch(&archive);
        assert_eq!(
            corpus_entries(&archive).unwrap(),
            vec![CorpusEntry::Paper { path: archive }]
        );
    }
}
