//! CLI binary for pdf-recode.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, writes the artefacts and prints a summary.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_recode::{
    base_name, inspect, read_pdf, CancellationToken, ConversionConfig, ConversionOutput,
    ConversionPipeline, ConversionProgressCallback, DecoderBackend, ErrorPolicy, OutputMode,
    ProgressCallback, QualityPreset,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

fn human_bytes(n: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{n} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

const TICKS: [&str; 11] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    page_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    /// The bar starts as a spinner; `on_job_start` sets its length.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }

    fn page_elapsed(&self) -> f64 {
        self.page_started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn abandon(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_job_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut t) = self.page_started.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, encoded_len: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{:>9}", human_bytes(encoded_len))),
            dim(&format!("{:.1}s", self.page_elapsed())),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{:.1}s", self.page_elapsed())),
        ));
        self.bar.inc(1);
    }

    fn on_job_complete(&self, total_pages: usize, success_count: usize) {
        let skipped = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if skipped == 0 {
            eprintln!(
                "{} {} pages processed",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages processed  ({} skipped)",
                cyan("⚠"),
                bold(&success_count.to_string()),
                total_pages,
                red(&skipped.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One JPEG per page into ./out (report_1.jpg, report_2.jpg, …)
  pdf-recode images report.pdf --out-dir out

  # Same, packed as report_images.zip
  pdf-recode images report.pdf --zip

  # Rebuild as an image-only PDF at low quality
  pdf-recode --quality low compress report.pdf -o small.pdf

  # Page count and sizes
  pdf-recode inspect report.pdf

QUALITY PRESETS:
  low      0.50   smallest files
  medium   0.75   default
  high     0.92   near-lossless look

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH       Path to libpdfium (file or directory)
  PDF_RECODE_PASSWORD   Password for encrypted PDFs
  RUST_LOG              Log filter, overrides -v/-q
"#;

/// Rasterise PDF pages to JPEG, or rebuild a PDF from JPEG pages.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-recode",
    version,
    about = "Rasterise PDF pages to JPEG, or rebuild a smaller image-only PDF",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    opts: GlobalOpts,
}

#[derive(Args, Debug)]
struct GlobalOpts {
    /// Render scale over 72 DPI (0.25–8). Default: 2.0 for images, 1.5 for compress.
    #[arg(long, global = true, env = "PDF_RECODE_SCALE")]
    scale: Option<f32>,

    /// Quality preset: low, medium, high.
    #[arg(long, global = true, env = "PDF_RECODE_QUALITY")]
    quality: Option<QualityPreset>,

    /// Exact quality factor in 0.0–1.0; overrides --quality.
    #[arg(long, global = true)]
    quality_factor: Option<f32>,

    /// Rendering backend: auto, pdfium, native.
    #[arg(long, global = true, env = "PDF_RECODE_BACKEND", default_value = "auto")]
    backend: DecoderBackend,

    /// PDF user password for encrypted documents.
    #[arg(long, global = true, env = "PDF_RECODE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Skip pages that fail instead of aborting.
    #[arg(long, global = true)]
    lenient: bool,

    /// Print a JSON report on stdout.
    #[arg(long, global = true)]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF_RECODE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF_RECODE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export one JPEG per page.
    Images {
        /// Input PDF file.
        input: PathBuf,

        /// Directory for the images.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Pack the images into `{name}_images.zip`.
        #[arg(long)]
        zip: bool,

        /// Convert but write nothing (for timing and size checks).
        #[arg(long)]
        no_files: bool,
    },
    /// Rebuild the PDF from JPEG pages.
    Compress {
        /// Input PDF file.
        input: PathBuf,

        /// Output PDF. Default: `{name}-compressed.pdf` next to the input.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print page count and page sizes without rendering.
    Inspect {
        /// Input PDF file.
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let opts = &cli.opts;

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters, so library INFO
    // logs are hidden while it is shown.
    let show_progress = !opts.quiet && !opts.json && !matches!(cli.command, Command::Inspect { .. });
    let filter = if opts.verbose {
        "debug"
    } else if opts.quiet || show_progress {
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

    match &cli.command {
        Command::Inspect { input } => run_inspect(input, opts).await,
        Command::Images {
            input,
            out_dir,
            zip,
            no_files,
        } => {
            let output = run_job(input, OutputMode::ExtractImages, opts, show_progress).await?;
            let written = if *no_files {
                Vec::new()
            } else {
                output
                    .write_to_dir(out_dir, &base_name(input), *zip)
                    .await
                    .context("Failed to write images")?
            };
            report(&output, &written, opts)
        }
        Command::Compress { input, output: out } => {
            let output = run_job(input, OutputMode::Compress, opts, show_progress).await?;
            let written = match out {
                Some(target) => {
                    output
                        .write_pdf_to(target)
                        .await
                        .with_context(|| format!("Failed to write {}", target.display()))?;
                    vec![target.clone()]
                }
                None => {
                    let dir = input.parent().map(Path::to_path_buf).unwrap_or_default();
                    output
                        .write_to_dir(&dir, &base_name(input), false)
                        .await
                        .context("Failed to write PDF")?
                }
            };
            report(&output, &written, opts)
        }
    }
}

/// Map CLI args to `ConversionConfig`.
fn build_config(
    mode: OutputMode,
    opts: &GlobalOpts,
    progress: Option<ProgressCallback>,
) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .mode(mode)
        .backend(opts.backend)
        .error_policy(if opts.lenient {
            ErrorPolicy::SkipPage
        } else {
            ErrorPolicy::FailFast
        });

    if let Some(scale) = opts.scale {
        builder = builder.scale(scale);
    }
    if let Some(preset) = opts.quality {
        builder = builder.quality_preset(preset);
    }
    if let Some(factor) = opts.quality_factor {
        builder = builder.quality(factor);
    }
    if let Some(ref pwd) = opts.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn run_job(
    input: &Path,
    mode: OutputMode,
    opts: &GlobalOpts,
    show_progress: bool,
) -> Result<ConversionOutput> {
    let bar = show_progress.then(CliProgressCallback::new_dynamic);
    let progress_cb = bar
        .clone()
        .map(|cb| cb as Arc<dyn ConversionProgressCallback>);
    let config = build_config(mode, opts, progress_cb)?;

    let bytes = read_pdf(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let pipeline = ConversionPipeline::from_config(&config).context("No rendering backend")?;

    // Ctrl-C stops the job at the next page boundary.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let result = pipeline.run(&bytes, &config, &cancel).await;
    if result.is_err() {
        if let Some(bar) = &bar {
            bar.abandon();
        }
    }
    result.with_context(|| format!("Conversion of {} failed", input.display()))
}

async fn run_inspect(input: &Path, opts: &GlobalOpts) -> Result<()> {
    let config = build_config(OutputMode::default(), opts, None)?;
    let bytes = read_pdf(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let info = inspect(&bytes, &config).context("Failed to inspect PDF")?;

    if opts.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&info).context("Failed to serialize document info")?
        );
        return Ok(());
    }

    println!("File:         {}", input.display());
    println!("Size:         {}", human_bytes(info.input_bytes));
    println!("Pages:        {}", info.page_count);
    println!("Backend:      {}", info.backend);
    for (i, page) in info.pages.iter().enumerate() {
        println!(
            "  {:>4}  {:>7.1} × {:<7.1} pt",
            i + 1,
            page.width_pt,
            page.height_pt
        );
    }
    Ok(())
}

/// Print the result summary (or the JSON report).
fn report(output: &ConversionOutput, written: &[PathBuf], opts: &GlobalOpts) -> Result<()> {
    let stats = &output.stats;

    if opts.json {
        let report = serde_json::json!({
            "stats": stats,
            "sizeReductionPercent": stats.size_reduction_percent(),
            "skipped": output.skipped,
            "files": written,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
        return Ok(());
    }
    if opts.quiet {
        return Ok(());
    }

    eprintln!(
        "{}  {}/{} pages  {}ms  {} → {}  ({:+.1}%)",
        if stats.skipped_pages == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.processed_pages,
        stats.total_pages,
        stats.total_duration_ms,
        human_bytes(stats.input_bytes),
        human_bytes(stats.output_bytes),
        -stats.size_reduction_percent(),
    );
    for path in written {
        eprintln!("   {}", bold(&path.display().to_string()));
    }
    for skipped in &output.skipped {
        eprintln!("   {} {}", red("✗"), dim(&skipped.to_string()));
    }
    Ok(())
}
