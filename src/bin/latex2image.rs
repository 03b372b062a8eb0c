//! CLI binary for latex2image.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GeneratorConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use latex2image::latex::{BuildOutcome, FragmentBuilder, SourceDocument};
use latex2image::{
    generate, validate_metadata, GenerationProgressCallback, GeneratorConfig, LabelFormat,
    ProgressCallback, SplitQuota, METADATA_FILE,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the total quota, with a log line
/// per split that fills up.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new(total_quota: usize) -> Arc<Self> {
        let bar = ProgressBar::new(total_quota as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>6}/{len} tables  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Generating");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_document_start(&self, path: &Path, fragments: usize) {
        if fragments > 0 {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.bar.set_message(dim(&format!("{name} ({fragments} tables)")));
        }
    }

    fn on_fragment_rendered(&self, _split: &str, _file_name: &str) {
        self.bar.inc(1);
    }

    fn on_split_full(&self, split: &str, count: usize) {
        self.bar.println(format!(
            "  {} split {} full ({} records)",
            green("✓"),
            bold(split),
            count
        ));
    }

    fn on_generation_complete(&self, rendered: usize, skipped: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} tables rendered  {}",
            if rendered > 0 { green("✔") } else { red("✘") },
            bold(&rendered.to_string()),
            dim(&format!("({skipped} skipped)")),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Default splits (train 10000 / validation 1000 / test 1000)
  latex2image generate arxiv/ -o output/

  # Custom splits, tagged labels, keep .tex/.pdf/.log/.aux for debugging
  latex2image generate arxiv/ -o output/ --split train=500 --split test=50 \
      --label-format tagged --keep-intermediates

  # Show the preamble and tables of one file and the documents built from them
  latex2image extract paper/main.tex --build

  # Drop records whose image file is missing
  latex2image check output/train/metadata.jsonl

CORPUS LAYOUT:
  A directory of arXiv bulk tarballs (arXiv_src_YYMM_NNN.tar), of per-paper
  .gz / .tar.gz sources, of extracted paper directories, or a single paper
  directory or archive.

ENVIRONMENT VARIABLES:
  RUST_LOG                Override log filter (e.g. latex2image=debug)
  PDFIUM_LIB_PATH         Path to a libpdfium shared library
  LATEX2IMAGE_*           Any generate flag, e.g. LATEX2IMAGE_COMPILER=xelatex
"#;

/// Build image → LaTeX table datasets from arXiv sources.
#[derive(Parser, Debug)]
#[command(
    name = "latex2image",
    version,
    about = "Build image → LaTeX table datasets from arXiv sources",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "LATEX2IMAGE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "LATEX2IMAGE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render every table of a corpus into dataset splits.
    Generate(GenerateArgs),

    /// Print the resolved preamble and table fragments of one .tex file.
    Extract {
        /// The .tex file.
        file: PathBuf,

        /// Also print the standalone document built for each fragment.
        #[arg(long)]
        build: bool,
    },

    /// Prune metadata records whose image no longer exists.
    Check {
        /// metadata.jsonl files or split directories.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    /// Corpus directory or archive.
    input: PathBuf,

    /// Output directory; one subdirectory per split.
    #[arg(short, long, env = "LATEX2IMAGE_OUTPUT", default_value = "output")]
    output: PathBuf,

    /// Split and quota as NAME=COUNT; repeat for several splits, filled in order.
    #[arg(long = "split", env = "LATEX2IMAGE_SPLITS", value_delimiter = ',')]
    splits: Vec<SplitQuota>,

    /// TeX engine.
    #[arg(long, env = "LATEX2IMAGE_COMPILER", default_value = "pdflatex")]
    compiler: String,

    /// Per-table compile timeout in seconds.
    #[arg(long, env = "LATEX2IMAGE_TIMEOUT", default_value_t = 5)]
    timeout: u64,

    /// Rendering DPI (72–600).
    #[arg(long, env = "LATEX2IMAGE_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Minimum image width and height in pixels.
    #[arg(long, env = "LATEX2IMAGE_MIN_SIZE", default_value_t = 100)]
    min_size: u32,

    /// Ground-truth encoding: raw or tagged.
    #[arg(long, env = "LATEX2IMAGE_LABEL_FORMAT", default_value = "raw")]
    label_format: LabelFormat,

    /// Keep .tex, .pdf, .log and .aux next to each image.
    #[arg(long, env = "LATEX2IMAGE_KEEP_INTERMEDIATES")]
    keep_intermediates: bool,

    /// Unpack archives here instead of a temporary directory.
    #[arg(long, env = "LATEX2IMAGE_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Print run statistics as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "LATEX2IMAGE_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides the feedback that matters.
    let show_progress = match &cli.command {
        Command::Generate(args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Generate(args) => run_generate(args, show_progress, cli.quiet).await,
        Command::Extract { file, build } => run_extract(&file, build),
        Command::Check { paths } => run_check(&paths, cli.quiet),
    }
}

async fn run_generate(args: GenerateArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let mut builder = GeneratorConfig::builder()
        .compiler(&args.compiler)
        .compile_timeout_secs(args.timeout)
        .render_dpi(args.dpi)
        .min_image_size(args.min_size, args.min_size)
        .label_format(args.label_format)
        .keep_intermediates(args.keep_intermediates);
    if !args.splits.is_empty() {
        builder = builder.splits(args.splits.clone());
    }
    if let Some(dir) = &args.work_dir {
        builder = builder.work_dir(dir);
    }

    // The bar needs the total quota, which is only known once the splits
    // are settled.
    let config = builder.build().context("Invalid configuration")?;
    let config = if show_progress {
        let cb = CliProgressCallback::new(config.total_quota());
        GeneratorConfig {
            progress_callback: cb as ProgressCallback,
            ..config
        }
    } else {
        config
    };

    let stats = generate(&args.input, &args.output, config)
        .await
        .context("Generation failed")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?
        );
    } else if !quiet {
        for (split, count) in &stats.per_split {
            eprintln!(
                "   {:<12} {:>6} records  →  {}",
                split,
                count,
                dim(&args.output.join(split).display().to_string())
            );
        }
        eprintln!(
            "   {} papers, {} documents, {} tables: {} rejected, {} failed  —  {}ms",
            stats.papers,
            stats.documents,
            stats.fragments,
            stats.rejected,
            stats.failed,
            stats.duration_ms
        );
    }
    Ok(())
}

fn run_extract(file: &Path, build: bool) -> Result<()> {
    let doc = SourceDocument::load(file).context("Failed to read source")?;
    let resolved = doc
        .resolve_preamble()
        .with_context(|| format!("{}", file.display()))?;

    println!("{}", cyan("% ── preamble ──"));
    println!("{}", resolved.text);
    for warning in &resolved.warnings {
        eprintln!("{} {}", red("⚠"), warning);
    }

    let builder = FragmentBuilder::new(&resolved.text);
    for (i, fragment) in doc.tables().enumerate() {
        println!("{}", cyan(&format!("% ── table {i} ──")));
        println!("{fragment}");
        if build {
            match builder.build(&fragment.replace('\t', "")) {
                BuildOutcome::Built(source) => {
                    println!("{}", cyan(&format!("% ── table {i}: standalone ──")));
                    println!("{source}");
                }
                BuildOutcome::Rejected { command } => {
                    println!("{}", red(&format!("% rejected: contains command {command}")));
                }
            }
        }
    }
    Ok(())
}

fn run_check(paths: &[PathBuf], quiet: bool) -> Result<()> {
    for path in paths {
        let log = if path.is_dir() {
            path.join(METADATA_FILE)
        } else {
            path.clone()
        };
        let report = validate_metadata(&log)
            .with_context(|| format!("Failed to validate {}", log.display()))?;
        if !quiet {
            eprintln!(
                "{} {}  kept {}  pruned {}  invalid {}",
                if report.pruned + report.invalid == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                bold(&log.display().to_string()),
                report.kept,
                report.pruned,
                report.invalid
            );
        }
    }
    Ok(())
}
