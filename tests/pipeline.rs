//! Generator integration tests with in-process fakes for the TeX engine and
//! the rasteriser, so they run without pdflatex or pdfium.
//!
//! The fake compiler copies the `.tex` source into the "PDF"; the fake
//! rasteriser reads it back and picks an outcome from marker words:
//!
//! | Marker   | Outcome                          |
//! |----------|----------------------------------|
//! | `BROKEN` | compile failure                  |
//! | `TINY`   | 40×20 image (below minimum size) |
//! | `LONG`   | two-page PDF                     |
//! | other    | 240×120 image                    |

use flate2::write::GzEncoder;
use flate2::Compression;
use image::DynamicImage;
use latex2image::dataset::read_records;
use latex2image::pipeline::compile::{pdf_path_for, TexCompiler};
use latex2image::pipeline::render::Rasterizer;
use latex2image::{
    FragmentError, GenerationProgressCallback, Generator, GeneratorConfig, LabelFormat,
    Latex2ImageError, Metadata, SplitQuota, METADATA_FILE,
};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Fakes ────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct FakeCompiler {
    sources: Arc<Mutex<Vec<String>>>,
}

impl TexCompiler for FakeCompiler {
    async fn compile(&self, tex_path: &Path, output_dir: &Path) -> Result<PathBuf, FragmentError> {
        let source = std::fs::read_to_string(tex_path).expect("tex written before compile");
        self.sources.lock().unwrap().push(source.clone());
        std::fs::write(tex_path.with_extension("log"), "log").unwrap();
        if source.contains("BROKEN") {
            return Err(FragmentError::CompileFailed {
                detail: "! Undefined control sequence.".into(),
            });
        }
        let pdf = pdf_path_for(tex_path, output_dir);
        std::fs::write(&pdf, &source).unwrap();
        Ok(pdf)
    }
}

struct FakeRasterizer;

impl Rasterizer for FakeRasterizer {
    fn rasterize(&self, pdf_path: &Path) -> Result<DynamicImage, FragmentError> {
        let source =
            std::fs::read_to_string(pdf_path).map_err(|e| FragmentError::RasterizeFailed {
                detail: e.to_string(),
            })?;
        if source.contains("TINY") {
            Ok(DynamicImage::new_rgb8(40, 20))
        } else if source.contains("LONG") {
            Err(FragmentError::MultiPage { pages: 2 })
        } else {
            Ok(DynamicImage::new_rgb8(240, 120))
        }
    }
}

#[derive(Default)]
struct CountingCallback {
    documents: AtomicUsize,
    rendered: AtomicUsize,
    skipped: AtomicUsize,
    full: Mutex<Vec<(String, usize)>>,
    complete: Mutex<Option<(usize, usize)>>,
}

impl GenerationProgressCallback for CountingCallback {
    fn on_document_start(&self, _path: &Path, _fragments: usize) {
        self.documents.fetch_add(1, Ordering::SeqCst);
    }
    fn on_fragment_rendered(&self, _split: &str, _file_name: &str) {
        self.rendered.fetch_add(1, Ordering::SeqCst);
    }
    fn on_fragment_skipped(&self, _split: &str, _reason: &str) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }
    fn on_split_full(&self, split: &str, count: usize) {
        self.full.lock().unwrap().push((split.to_string(), count));
    }
    fn on_generation_complete(&self, rendered: usize, skipped: usize) {
        *self.complete.lock().unwrap() = Some((rendered, skipped));
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn table(row: &str) -> String {
    format!("\\begin{{table}}\n\\begin{{tabular}}{{cc}}\n{row} \\\\\n\\end{{tabular}}\n\\end{{table}}\n")
}

fn document(preamble: &str, rows: &[&str]) -> String {
    let tables: String = rows.iter().map(|r| table(r)).collect();
    format!("\\documentclass{{article}}\n{preamble}\n\\begin{{document}}\n{tables}\\end{{document}}\n")
}

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn config(splits: &[(&str, usize)]) -> latex2image::GeneratorConfigBuilder {
    GeneratorConfig::builder().splits(
        splits
            .iter()
            .map(|(name, quota)| SplitQuota::new(*name, *quota))
            .collect(),
    )
}

fn generator(
    config: GeneratorConfig,
    output: &Path,
) -> (Generator<FakeCompiler, FakeRasterizer>, FakeCompiler) {
    let compiler = FakeCompiler::default();
    let generator =
        Generator::with_collaborators(config, output, compiler.clone(), Arc::new(FakeRasterizer));
    (generator, compiler)
}

fn records(output: &Path, split: &str) -> Vec<Metadata> {
    let log = output.join(split).join(METADATA_FILE);
    if log.exists() {
        read_records(&log).unwrap()
    } else {
        Vec::new()
    }
}

fn file_names(output: &Path, split: &str) -> Vec<String> {
    records(output, split).into_iter().map(|r| r.file_name).collect()
}

fn dir_listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn splits_fill_in_order_and_stop_at_quota() {
    let tmp = tempfile::tempdir().unwrap();
    let corpus = tmp.path().join("corpus");
    write(&corpus.join("paper/a.tex"), &document("", &["a0 & 1", "a1 & 2", "a2 & 3"]));
    write(&corpus.join("paper/b.tex"), &document("", &["b0 & 1", "b1 & 2"]));
    let output = tmp.path().join("out");

    let cb = Arc::new(CountingCallback::default());
    let config = config(&[("train", 2), ("test", 1)])
        .progress_callback(cb.clone())
        .build()
        .unwrap();
    let (mut generator, _) = generator(config, &output);
    let stats = generator.run(&corpus).await.unwrap();

    assert_eq!(
        file_names(&output, "train"),
        vec!["paper_a_table_0.png", "paper_a_table_1.png"]
    );
    assert_eq!(file_names(&output, "test"), vec!["paper_b_table_0.png"]);
    assert!(output.join("train/paper_a_table_1.png").is_file());
    assert!(!output.join("train/paper_a_table_2.png").exists());

    assert_eq!(stats.rendered, 3);
    assert_eq!(stats.fragments, 3);
    assert_eq!(stats.per_split.get("train"), Some(&2));
    assert_eq!(stats.per_split.get("test"), Some(&1));
    assert_eq!(generator.counters().total(), 3);

    assert_eq!(cb.documents.load(Ordering::SeqCst), 2);
    assert_eq!(cb.rendered.load(Ordering::SeqCst), 3);
    assert_eq!(
        *cb.full.lock().unwrap(),
        vec![("train".to_string(), 2), ("test".to_string(), 1)]
    );
    assert_eq!(*cb.complete.lock().unwrap(), Some((3, 0)));
}

#[tokio::test]
async fn zero_quota_split_is_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let corpus = tmp.path().join("corpus");
    write(&corpus.join("p/main.tex"), &document("", &["x & y"]));
    let output = tmp.path().join("out");

    let (mut generator, _) = generator(config(&[("skip", 0), ("train", 5)]).build().unwrap(), &output);
    generator.run(&corpus).await.unwrap();

    assert!(output.join("skip").is_dir());
    assert!(records(&output, "skip").is_empty());
    assert_eq!(file_names(&output, "train"), vec!["p_main_table_0.png"]);
}

#[tokio::test]
async fn commands_reject_and_macros_substitute() {
    let tmp = tempfile::tempdir().unwrap();
    let corpus = tmp.path().join("corpus");
    let preamble = "\\newcommand{\\cmd}[1]{#1}\n\\def\\R{Real}";
    write(
        &corpus.join("p/main.tex"),
        &document(preamble, &["\\cmd{a} & b", "\\R & d"]),
    );
    let output = tmp.path().join("out");

    let (mut generator, compiler) = generator(config(&[("train", 10)]).build().unwrap(), &output);
    let stats = generator.run(&corpus).await.unwrap();

    assert_eq!((stats.rendered, stats.rejected, stats.failed), (1, 1, 0));
    let recs = records(&output, "train");
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].file_name, "p_main_table_1.png");
    // Label keeps the macro; the compiled source has it inlined.
    assert_eq!(
        recs[0].ground_truth,
        "\\begin{tabular}{cc}\n\\R & d \\\\\n\\end{tabular}"
    );
    let sources = compiler.sources.lock().unwrap();
    assert_eq!(sources.len(), 1);
    assert!(sources[0].starts_with("\\documentclass{standalone}\n"));
    assert!(sources[0].contains("Real & d"));
    assert!(sources[0].contains("\\def\\R{Real}"));
}

#[tokio::test]
async fn render_failures_are_skipped_and_cleaned_up() {
    let tmp = tempfile::tempdir().unwrap();
    let corpus = tmp.path().join("corpus");
    write(
        &corpus.join("p/main.tex"),
        &document("", &["TINY & 1", "BROKEN & 2", "LONG & 3", "ok & 4"]),
    );
    let output = tmp.path().join("out");

    let cb = Arc::new(CountingCallback::default());
    let config = config(&[("train", 10)])
        .progress_callback(cb.clone())
        .build()
        .unwrap();
    let (mut generator, _) = generator(config, &output);
    let stats = generator.run(&corpus).await.unwrap();

    assert_eq!((stats.rendered, stats.failed), (1, 3));
    assert_eq!(cb.skipped.load(Ordering::SeqCst), 3);
    assert_eq!(
        dir_listing(&output.join("train")),
        vec!["metadata.jsonl", "p_main_table_3.png"]
    );
}

#[tokio::test]
async fn keep_intermediates_leaves_sources() {
    let tmp = tempfile::tempdir().unwrap();
    let corpus = tmp.path().join("corpus");
    write(&corpus.join("p/main.tex"), &document("", &["x & y"]));
    let output = tmp.path().join("out");

    let config = config(&[("train", 1)]).keep_intermediates(true).build().unwrap();
    let (mut generator, _) = generator(config, &output);
    generator.run(&corpus).await.unwrap();

    assert_eq!(
        dir_listing(&output.join("train")),
        vec![
            "metadata.jsonl",
            "p_main_table_0.log",
            "p_main_table_0.pdf",
            "p_main_table_0.png",
            "p_main_table_0.tex",
        ]
    );
}

#[tokio::test]
async fn keep_intermediates_still_drops_failed_compiles() {
    let tmp = tempfile::tempdir().unwrap();
    let corpus = tmp.path().join("corpus");
    write(
        &corpus.join("p/main.tex"),
        &document("", &["BROKEN & 1", "TINY & 2"]),
    );
    let output = tmp.path().join("out");

    let config = config(&[("train", 5)]).keep_intermediates(true).build().unwrap();
    let (mut generator, _) = generator(config, &output);
    let stats = generator.run(&corpus).await.unwrap();

    assert_eq!(stats.failed, 2);
    // The rasterise-stage failure keeps its sources; the compile failure does not.
    assert_eq!(
        dir_listing(&output.join("train")),
        vec![
            "p_main_table_1.log",
            "p_main_table_1.pdf",
            "p_main_table_1.tex",
        ]
    );
}

#[tokio::test]
async fn section_files_borrow_main_preamble() {
    let tmp = tempfile::tempdir().unwrap();
    let corpus = tmp.path().join("corpus");
    write(
        &corpus.join("p/main.tex"),
        "\\documentclass{article}\n\\def\\x{Y}\n\\begin{document}\n\\input{sec}\n\\end{document}\n",
    );
    write(&corpus.join("p/sec.tex"), &table("\\x\t& z"));
    let output = tmp.path().join("out");

    let (mut generator, compiler) = generator(config(&[("train", 5)]).build().unwrap(), &output);
    let stats = generator.run(&corpus).await.unwrap();

    assert_eq!(stats.documents, 2);
    assert_eq!(stats.skipped_documents, 0);
    let recs = records(&output, "train");
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].file_name, "p_sec_table_0.png");
    assert_eq!(recs[0].ground_truth, "\\begin{tabular}{cc}\n\\x& z \\\\\n\\end{tabular}");
    assert!(compiler.sources.lock().unwrap()[0].contains("Y& z"));
}

#[tokio::test]
async fn paper_without_main_file_is_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let corpus = tmp.path().join("corpus");
    write(&corpus.join("p/sec.tex"), &table("a & b"));
    let output = tmp.path().join("out");

    let (mut generator, _) = generator(config(&[("train", 5)]).build().unwrap(), &output);
    let stats = generator.run(&corpus).await.unwrap();

    assert_eq!(stats.skipped_documents, 1);
    assert_eq!(stats.rendered, 0);
}

#[tokio::test]
async fn tagged_labels() {
    let tmp = tempfile::tempdir().unwrap();
    let corpus = tmp.path().join("corpus");
    write(&corpus.join("p/main.tex"), &document("", &["a & b"]));
    let output = tmp.path().join("out");

    let config = config(&[("train", 5)])
        .label_format(LabelFormat::Tagged)
        .build()
        .unwrap();
    let (mut generator, _) = generator(config, &output);
    generator.run(&corpus).await.unwrap();

    assert_eq!(
        records(&output, "train")[0].ground_truth,
        "<s_table><s_column_type>cc</s_column_type>\
         <s_row><s_column>a</s_column><s_column>b</s_column></s_row></s_table>"
    );
}

fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, content.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

#[tokio::test]
async fn per_paper_archive_is_unpacked_and_removed() {
    let tmp = tempfile::tempdir().unwrap();
    let corpus = tmp.path().join("corpus");
    std::fs::create_dir_all(&corpus).unwrap();
    std::fs::write(
        corpus.join("2003.00001.tar.gz"),
        tar_gz(&[("main.tex", document("", &["x & y"]).as_str())]),
    )
    .unwrap();
    let output = tmp.path().join("out");
    let work = tmp.path().join("work");

    let config = config(&[("train", 5)]).work_dir(&work).build().unwrap();
    let (mut generator, _) = generator(config, &output);
    let stats = generator.run(&corpus).await.unwrap();

    assert_eq!(stats.papers, 1);
    assert_eq!(file_names(&output, "train"), vec!["2003.00001_main_table_0.png"]);
    assert!(!work.join("2003.00001").exists());
}

#[tokio::test]
async fn bulk_tarball_with_single_file_papers() {
    let tmp = tempfile::tempdir().unwrap();
    let corpus = tmp.path().join("corpus");
    std::fs::create_dir_all(&corpus).unwrap();

    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    gz.write_all(document("", &["x & y"]).as_bytes()).unwrap();
    let paper = gz.finish().unwrap();

    let mut bulk = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(paper.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    bulk.append_data(&mut header, "2003/2003.00002.gz", paper.as_slice())
        .unwrap();
    std::fs::write(corpus.join("arXiv_src_2003_026.tar"), bulk.into_inner().unwrap()).unwrap();
    let output = tmp.path().join("out");

    let (mut generator, _) = generator(config(&[("train", 5)]).build().unwrap(), &output);
    let stats = generator.run(&corpus).await.unwrap();

    assert_eq!(stats.papers, 1);
    assert_eq!(
        file_names(&output, "train"),
        vec!["2003.00002_2003.00002_table_0.png"]
    );
}

#[tokio::test]
async fn missing_input_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut generator, _) = generator(
        config(&[("train", 1)]).build().unwrap(),
        &tmp.path().join("out"),
    );
    let err = generator
        .run(&tmp.path().join("does-not-exist"))
        .await
        .unwrap_err();
    assert!(matches!(err, Latex2ImageError::InputNotFound { .. }));
}
