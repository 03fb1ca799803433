//! # pdf-recode
//!
//! Rasterise PDF pages and re-encode them as JPEG: either one image per page
//! (optionally zipped) or a new, smaller PDF whose pages are full-bleed JPEGs.
//!
//! Scanned documents and image-heavy PDFs are often much larger than they
//! need to be. Re-rendering every page at a chosen resolution and quality
//! gives a predictable file size at the cost of the text layer, which is
//! exactly the trade-off of a "compress PDF" tool.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Decode    open with pdfium or the native lopdf renderer
//!  ├─ 2. Render    one page at a time onto a white RGB surface
//!  ├─ 3. Encode    baseline JPEG on the blocking pool
//!  └─ 4. Output    page images (+ ZIP) or an assembled image-only PDF
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_recode::{convert_file, ConversionConfig, OutputMode, QualityPreset};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .mode(OutputMode::Compress)
//!         .quality_preset(QualityPreset::Low)
//!         .build()?;
//!     let output = convert_file("scan.pdf", &config).await?;
//!     output.write_to_dir("out".as_ref(), "scan", false).await?;
//!     eprintln!("{:.1}% smaller", output.stats.size_reduction_percent());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-recode` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-recode = { version = "0.1", default-features = false }
//! ```
//!
//! ## Backends
//!
//! | Backend | Needs | Draws |
//! |---------|-------|-------|
//! | `pdfium` | libpdfium at runtime (`PDFIUM_LIB_PATH`, `./`, or system path) | everything a viewer draws |
//! | `native` | nothing | vector paths, fills, clipping, images, forms; no text |
//!
//! `DecoderBackend::Auto` (the default) uses pdfium when it can be bound.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod job;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, DecoderBackend, ErrorPolicy, OutputMode,
    QualityFactor, QualityPreset,
};
pub use convert::{
    convert, convert_file, convert_sync, convert_with_cancel, inspect, ConversionPipeline,
};
pub use error::{
    ArchiveError, AssemblyError, DecodeError, EncodeError, ErrorKind, PageError, RecodeError,
    RenderError,
};
pub use job::{ConversionJob, JobState};
pub use output::{
    Artifact, ConversionOutput, ConversionStats, DocumentInfo, EncodedImage, OutputPdf,
};
pub use pipeline::archive::{archive_file_name, build_archive, ArchiveBuilder};
pub use pipeline::assemble::PdfPageAssembler;
pub use pipeline::decode::{PageSize, PdfDecoder, RenderedPage, SourceDocument};
pub use pipeline::encode::encode_page;
pub use pipeline::input::{base_name, read_pdf};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use tokio_util::sync::CancellationToken;
