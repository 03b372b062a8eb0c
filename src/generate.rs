//! Dataset generation: walk papers, extract table fragments, render them and
//! record the results into quota-bounded splits.
//!
//! ## Flow
//!
//! ```text
//! corpus entry ──▶ unpack ──▶ paper dir ──▶ .tex files ──▶ fragments
//!  (tar / gz / dir)  (flate2+tar)         (preamble)     (build → compile
//!                                                          → rasterise → record)
//! ```
//!
//! Splits are filled in configuration order. Before each fragment the
//! current split's counter is checked against its quota; once it is reached
//! the rest of that document is dropped and the next document goes to the
//! next split. The run stops when every split is full or the corpus is
//! exhausted.
//!
//! Everything below the run level is non-fatal: a broken archive, an
//! unreadable file or a fragment that fails to compile is logged and skipped.

use crate::config::{GeneratorConfig, SplitQuota};
use crate::dataset::{append_record, Metadata, SplitCounters};
use crate::error::{FragmentError, Latex2ImageError, PreambleError};
use crate::latex::{BuildOutcome, FragmentBuilder, SourceDocument};
use crate::output::GenerationStats;
use crate::pipeline::archive::{self, archive_stem};
use crate::pipeline::compile::{remove_artifacts, PdfLatex, TexCompiler};
use crate::pipeline::discover::{corpus_entries, find_archives, find_tex_files, CorpusEntry};
use crate::pipeline::render::{self, check_size, save_png, PdfiumRasterizer, Rasterizer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Files removed after each fragment unless intermediates are kept.
const INTERMEDIATE_EXTENSIONS: &[&str] = &["tex", "pdf", "log", "aux"];

/// Terminal state of one fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentOutcome {
    /// Image saved and record appended.
    Rendered { file_name: String },
    /// The fragment uses a parameterised command.
    Rejected { command: String },
    /// Compilation, rasterisation or saving failed.
    RenderFailed(FragmentError),
}

/// Whether generation can continue after a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitStatus {
    /// The current split still has room.
    Open,
    /// The current split filled up; the document was cut short.
    SplitFull,
    /// Every split is full.
    Exhausted,
}

/// Drives generation for one output directory.
///
/// `C` compiles `.tex` to PDF and `R` rasterises the PDF. Production code
/// uses [`Generator::new`]; tests inject fakes via
/// [`Generator::with_collaborators`].
pub struct Generator<C, R: ?Sized> {
    config: GeneratorConfig,
    output_dir: PathBuf,
    compiler: C,
    rasterizer: Arc<R>,
    counters: SplitCounters,
    split_index: usize,
    stats: GenerationStats,
}

impl Generator<PdfLatex, PdfiumRasterizer> {
    /// Generator using the configured TeX engine and pdfium.
    ///
    /// # Errors
    /// [`Latex2ImageError::PdfiumBindingFailed`] when pdfium cannot be loaded.
    pub fn new(
        config: GeneratorConfig,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, Latex2ImageError> {
        let compiler = PdfLatex::new(config.compiler.clone(), config.compile_timeout_secs);
        let rasterizer = Arc::new(PdfiumRasterizer::bind(config.render_dpi)?);
        Ok(Self::with_collaborators(config, output_dir, compiler, rasterizer))
    }
}

impl<C: TexCompiler, R: Rasterizer + ?Sized + 'static> Generator<C, R> {
    pub fn with_collaborators(
        config: GeneratorConfig,
        output_dir: impl Into<PathBuf>,
        compiler: C,
        rasterizer: Arc<R>,
    ) -> Self {
        Self {
            config,
            output_dir: output_dir.into(),
            compiler,
            rasterizer,
            counters: SplitCounters::new(),
            split_index: 0,
            stats: GenerationStats::default(),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn counters(&self) -> &SplitCounters {
        &self.counters
    }

    pub fn stats(&self) -> &GenerationStats {
        &self.stats
    }

    pub fn split_dir(&self, split: &str) -> PathBuf {
        self.output_dir.join(split)
    }

    /// Create every split directory.
    pub fn prepare_output_dirs(&self) -> Result<(), Latex2ImageError> {
        for split in &self.config.splits {
            let dir = self.split_dir(&split.name);
            std::fs::create_dir_all(&dir)
                .map_err(|source| Latex2ImageError::CreateDirFailed { path: dir, source })?;
        }
        Ok(())
    }

    /// Process a whole corpus: a directory of bulk tarballs, per-paper
    /// archives or extracted paper directories, or a single archive.
    ///
    /// # Errors
    /// Only run-level problems are fatal: the input does not exist, the
    /// output or work directory cannot be created, or the corpus directory
    /// cannot be listed.
    pub async fn run(&mut self, input: &Path) -> Result<GenerationStats, Latex2ImageError> {
        let start = Instant::now();
        if !input.exists() {
            return Err(Latex2ImageError::InputNotFound {
                path: input.to_path_buf(),
            });
        }
        self.prepare_output_dirs()?;

        // The guard keeps a temporary work dir alive until the run ends.
        let (_guard, work_root) = match &self.config.work_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|source| {
                    Latex2ImageError::CreateDirFailed {
                        path: dir.clone(),
                        source,
                    }
                })?;
                (None, dir.clone())
            }
            None => {
                let tmp = TempDir::new().map_err(|source| Latex2ImageError::CreateDirFailed {
                    path: std::env::temp_dir(),
                    source,
                })?;
                let root = tmp.path().to_path_buf();
                (Some(tmp), root)
            }
        };

        let entries = corpus_entries(input).map_err(|source| Latex2ImageError::Io {
            path: input.to_path_buf(),
            source,
        })?;
        info!(
            "Generating from {} corpus entries in {} (quota {})",
            entries.len(),
            input.display(),
            self.config.total_quota()
        );

        for entry in entries {
            let status = match entry {
                CorpusEntry::Directory { path } => self.process_paper(&path).await,
                CorpusEntry::Paper { path } => self.process_archive(&path, &work_root).await?,
                CorpusEntry::Bulk { path, year_index } => {
                    self.process_bulk(&path, &work_root.join(year_index)).await?
                }
            };
            if status == SplitStatus::Exhausted {
                info!("All splits are full, stopping");
                break;
            }
        }
        // Report a split that filled on the very last fragment.
        let _ = self.open_split();

        self.stats.per_split = self
            .counters
            .iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        self.stats.duration_ms = start.elapsed().as_millis() as u64;
        self.config
            .progress_callback
            .on_generation_complete(self.stats.rendered, self.stats.skipped());
        info!(
            "Generation complete: {} rendered, {} rejected, {} failed in {}ms",
            self.stats.rendered, self.stats.rejected, self.stats.failed, self.stats.duration_ms
        );
        Ok(self.stats.clone())
    }

    /// Unpack a bulk tarball into `dest` and process every paper archive in
    /// it. `dest` is removed afterwards.
    pub async fn process_bulk(
        &mut self,
        bulk: &Path,
        dest: &Path,
    ) -> Result<SplitStatus, Latex2ImageError> {
        info!("Unpacking {}", bulk.display());
        let mut status = SplitStatus::Open;
        match unpack_blocking(bulk, dest).await? {
            Ok(_) => match find_archives(dest) {
                Ok(papers) => {
                    for paper in papers {
                        status = self.process_archive(&paper, dest).await?;
                        if status == SplitStatus::Exhausted {
                            break;
                        }
                    }
                }
                Err(e) => warn!("Cannot list {}: {}", dest.display(), e),
            },
            Err(e) => warn!("Skipping {}: {}", bulk.display(), e),
        }
        remove_dir(dest);
        Ok(status)
    }

    /// Unpack one paper archive into `work/<stem>/` and process it. The
    /// extracted directory is removed afterwards.
    pub async fn process_archive(
        &mut self,
        archive: &Path,
        work: &Path,
    ) -> Result<SplitStatus, Latex2ImageError> {
        let dest = work.join(archive_stem(archive));
        let status = match unpack_blocking(archive, &dest).await? {
            Ok(_) => self.process_paper(&dest).await,
            Err(e) => {
                warn!("Skipping {}: {}", archive.display(), e);
                SplitStatus::Open
            }
        };
        remove_dir(&dest);
        Ok(status)
    }

    /// Process every `.tex` file of an extracted paper.
    ///
    /// Files without their own `\begin{document}` (sections pulled in with
    /// `\input`) borrow the preamble of the first file that resolves.
    pub async fn process_paper(&mut self, paper_dir: &Path) -> SplitStatus {
        self.stats.papers += 1;
        let files = match find_tex_files(paper_dir) {
            Ok(files) => files,
            Err(e) => {
                warn!("Cannot list {}: {}", paper_dir.display(), e);
                return SplitStatus::Open;
            }
        };
        debug!("{}: {} source files", paper_dir.display(), files.len());

        let mut documents = Vec::with_capacity(files.len());
        for path in files {
            match SourceDocument::load(&path) {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    warn!("{}", e);
                    self.stats.skipped_documents += 1;
                }
            }
        }

        let preambles: Vec<Option<String>> = documents
            .iter()
            .map(|doc| match doc.resolve_preamble() {
                Ok(resolved) => Some(resolved.text),
                Err(PreambleError::NoDocumentBody) => None,
            })
            .collect();
        let fallback = preambles.iter().flatten().next().cloned();

        for (doc, own) in documents.iter().zip(preambles) {
            let Some(preamble) = own.or_else(|| fallback.clone()) else {
                info!("{}: {}, skipping", doc.path.display(), PreambleError::NoDocumentBody);
                self.stats.skipped_documents += 1;
                continue;
            };
            if self.process_document(doc, &preamble).await == SplitStatus::Exhausted {
                return SplitStatus::Exhausted;
            }
        }
        SplitStatus::Open
    }

    /// Process the table fragments of one document against `preamble`.
    pub async fn process_document(&mut self, doc: &SourceDocument, preamble: &str) -> SplitStatus {
        let fragments: Vec<&str> = doc.tables().collect();
        self.stats.documents += 1;
        self.config
            .progress_callback
            .on_document_start(&doc.path, fragments.len());
        if fragments.is_empty() {
            debug!("{}: no tables", doc.path.display());
            return SplitStatus::Open;
        }

        let Some(split) = self.open_split() else {
            return SplitStatus::Exhausted;
        };
        info!(
            "{}: {} tables → split '{}'",
            doc.path.display(),
            fragments.len(),
            split.name
        );

        let builder = FragmentBuilder::new(preamble);
        for (index, fragment) in fragments.iter().enumerate() {
            if self.counters.is_full(&split.name, split.quota) {
                info!(
                    "Split '{}' reached its quota of {}, dropping {} remaining tables of {}",
                    split.name,
                    split.quota,
                    fragments.len() - index,
                    doc.path.display()
                );
                return SplitStatus::SplitFull;
            }

            self.stats.fragments += 1;
            let outcome = self
                .process_fragment(&builder, doc, index, fragment, &split.name)
                .await;
            let cb = &self.config.progress_callback;
            match outcome {
                FragmentOutcome::Rendered { file_name } => {
                    self.stats.rendered += 1;
                    cb.on_fragment_rendered(&split.name, &file_name);
                }
                FragmentOutcome::Rejected { command } => {
                    self.stats.rejected += 1;
                    cb.on_fragment_skipped(&split.name, &format!("contains command {command}"));
                }
                FragmentOutcome::RenderFailed(e) => {
                    self.stats.failed += 1;
                    cb.on_fragment_skipped(&split.name, &e.to_string());
                }
            }
        }
        SplitStatus::Open
    }

    /// Build, compile, rasterise and record one fragment into `split`.
    ///
    /// Does not check the quota; callers do.
    pub async fn process_fragment(
        &mut self,
        builder: &FragmentBuilder,
        doc: &SourceDocument,
        index: usize,
        fragment: &str,
        split: &str,
    ) -> FragmentOutcome {
        let fragment = fragment.replace('\t', "");
        let source = match builder.build(&fragment) {
            BuildOutcome::Built(source) => source,
            BuildOutcome::Rejected { command } => {
                info!("Table {} of {} contains command {}, skipping", index, doc.path.display(), command);
                return FragmentOutcome::Rejected { command };
            }
        };

        let split_dir = self.split_dir(split);
        let stem = format!("{}_table_{}", doc.base_name(), index);
        let tex_path = split_dir.join(format!("{stem}.tex"));
        let file_name = format!("{stem}.png");
        let image_path = split_dir.join(&file_name);

        let rendered = self
            .render_fragment(&source, &tex_path, &split_dir, &image_path)
            .await;
        // Debug mode keeps intermediates only for fragments that compiled.
        let compile_failed = matches!(&rendered, Err(e) if e.is_compile_failure());
        if !self.config.keep_intermediates || compile_failed {
            remove_artifacts(&tex_path, INTERMEDIATE_EXTENSIONS);
        }
        if let Err(e) = rendered {
            info!("Table {} of {}: {}", index, doc.path.display(), e);
            return FragmentOutcome::RenderFailed(e);
        }

        let record = Metadata {
            file_name: file_name.clone(),
            ground_truth: self.config.label_format.render(&fragment),
        };
        if let Err(e) = append_record(&split_dir, &record) {
            let _ = std::fs::remove_file(&image_path);
            let err = FragmentError::RecordFailed {
                path: split_dir,
                detail: e.to_string(),
            };
            warn!("{}", err);
            return FragmentOutcome::RenderFailed(err);
        }

        let count = self.counters.increment(split);
        debug!("[{}] #{} {}", split, count, file_name);
        FragmentOutcome::Rendered { file_name }
    }

    async fn render_fragment(
        &self,
        source: &str,
        tex_path: &Path,
        split_dir: &Path,
        image_path: &Path,
    ) -> Result<(), FragmentError> {
        tokio::fs::write(tex_path, source)
            .await
            .map_err(|e| FragmentError::WriteFailed {
                path: tex_path.to_path_buf(),
                detail: e.to_string(),
            })?;

        let pdf_path = self.compiler.compile(tex_path, split_dir).await?;
        let image = render::rasterize(Arc::clone(&self.rasterizer), pdf_path).await?;
        check_size(&image, self.config.min_image_width, self.config.min_image_height)?;
        save_png(&image, image_path)
    }

    /// The first split with room, advancing past full ones.
    fn open_split(&mut self) -> Option<SplitQuota> {
        while let Some(split) = self.config.splits.get(self.split_index) {
            let count = self.counters.get(&split.name);
            if count < split.quota {
                return Some(split.clone());
            }
            info!("Split '{}' is full ({} records)", split.name, count);
            self.config.progress_callback.on_split_full(&split.name, count);
            self.split_index += 1;
        }
        None
    }
}

/// Generate a dataset from `input` into `output_dir` with the default
/// TeX engine and pdfium.
///
/// # Example
/// ```rust,no_run
/// use latex2image::{generate, GeneratorConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = GeneratorConfig::default();
///     let stats = generate("corpus/", "output/", config).await?;
///     println!("{} tables rendered", stats.rendered);
///     Ok(())
/// }
/// ```
pub async fn generate(
    input: impl AsRef<Path>,
    output_dir: impl Into<PathBuf>,
    config: GeneratorConfig,
) -> Result<GenerationStats, Latex2ImageError> {
    let mut generator = Generator::new(config, output_dir)?;
    generator.run(input.as_ref()).await
}

async fn unpack_blocking(
    archive: &Path,
    dest: &Path,
) -> Result<Result<Vec<PathBuf>, crate::error::ArchiveError>, Latex2ImageError> {
    let (archive, dest) = (archive.to_path_buf(), dest.to_path_buf());
    tokio::task::spawn_blocking(move || archive::unpack(&archive, &dest))
        .await
        .map_err(|e| Latex2ImageError::Internal(format!("Unpack task panicked: {}", e)))
}

fn remove_dir(dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(dir) {
        debug!("Could not remove {}: {}", dir.display(), e);
    }
}
