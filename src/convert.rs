//! Conversion entry points and the page-by-page pipeline driver.
//!
//! A job opens the document once, then for each page renders, yields,
//! encodes on the blocking pool and hands the JPEG to the output sink (the
//! image list or the PDF assembler). Only one page is in flight at a time,
//! so peak memory is one raster surface plus the accumulated JPEGs.
//!
//! The futures returned here are not `Send`: the opened document stays on
//! the task that drives the job, because pdfium handles are tied to the
//! thread that created them. Drive them with `block_on`, a `LocalSet`, or
//! [`convert_sync`].

use crate::config::{ConversionConfig, DecoderBackend, ErrorPolicy, OutputMode};
use crate::error::{PageError, RecodeError};
use crate::job::ConversionJob;
use crate::output::{Artifact, ConversionOutput, ConversionStats, DocumentInfo, EncodedImage};
use crate::pipeline::assemble::PdfPageAssembler;
use crate::pipeline::decode::{PdfDecoder, SourceDocument};
use crate::pipeline::encode::encode_page;
use crate::pipeline::input;
use crate::pipeline::native::NativeDecoder;
use crate::pipeline::pdfium::PdfiumDecoder;
use crate::progress::ProgressReporter;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs conversion jobs against one decoder backend.
#[derive(Clone)]
pub struct ConversionPipeline {
    decoder: Arc<dyn PdfDecoder>,
}

impl std::fmt::Debug for ConversionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionPipeline")
            .field("decoder", &self.decoder.name())
            .finish()
    }
}

impl ConversionPipeline {
    pub fn new(decoder: Arc<dyn PdfDecoder>) -> Self {
        Self { decoder }
    }

    /// Pick a decoder for `backend`.
    ///
    /// `Auto` prefers pdfium and falls back to the native renderer when the
    /// library cannot be bound.
    pub fn for_backend(backend: DecoderBackend, max_pixel_edge: u32) -> Result<Self, RecodeError> {
        let decoder: Arc<dyn PdfDecoder> = match backend {
            DecoderBackend::Native => Arc::new(NativeDecoder::new(max_pixel_edge)),
            DecoderBackend::Pdfium => Arc::new(
                PdfiumDecoder::probe(max_pixel_edge).map_err(RecodeError::BackendUnavailable)?,
            ),
            DecoderBackend::Auto => match PdfiumDecoder::probe(max_pixel_edge) {
                Ok(pdfium) => Arc::new(pdfium),
                Err(reason) => {
                    warn!("{reason}; falling back to the native renderer (text is not drawn)");
                    Arc::new(NativeDecoder::new(max_pixel_edge))
                }
            },
        };
        debug!("Using {} decoder", decoder.name());
        Ok(Self { decoder })
    }

    pub fn from_config(config: &ConversionConfig) -> Result<Self, RecodeError> {
        Self::for_backend(config.backend, config.max_pixel_edge)
    }

    pub fn decoder_name(&self) -> &'static str {
        self.decoder.name()
    }

    /// Run one job over `bytes`.
    ///
    /// # Errors
    /// Any decode error, or, under [`ErrorPolicy::FailFast`], the first page
    /// failure. [`RecodeError::Cancelled`] when `cancel` fires before the job
    /// finished; no output is produced and no progress follows.
    pub async fn run(
        &self,
        bytes: &[u8],
        config: &ConversionConfig,
        cancel: &CancellationToken,
    ) -> Result<ConversionOutput, RecodeError> {
        let total_start = Instant::now();
        let mut job = ConversionJob::new(config.mode, config.quality, config.effective_scale());
        let mut reporter = ProgressReporter::new(config.progress_callback.clone());
        info!(
            "Starting {} job: {} bytes, scale {}, quality {}, {} backend",
            job.mode,
            bytes.len(),
            job.scale,
            job.quality,
            self.decoder.name()
        );

        job.start()?;
        let result = self
            .drive(&mut job, &mut reporter, bytes, config, cancel, total_start)
            .await;

        match &result {
            Ok(output) => info!(
                "Job complete: {}/{} pages, {} → {} bytes, {}ms",
                output.stats.processed_pages,
                output.stats.total_pages,
                output.stats.input_bytes,
                output.stats.output_bytes,
                output.stats.total_duration_ms
            ),
            Err(e) if e.is_cancelled() => info!("{e}"),
            Err(e) => {
                job.fail();
                warn!("Job failed in state {}: {}", job.state(), e);
            }
        }
        result
    }

    async fn drive(
        &self,
        job: &mut ConversionJob,
        reporter: &mut ProgressReporter,
        bytes: &[u8],
        config: &ConversionConfig,
        cancel: &CancellationToken,
        total_start: Instant,
    ) -> Result<ConversionOutput, RecodeError> {
        if cancel.is_cancelled() {
            job.cancel()?;
            return Err(RecodeError::Cancelled {
                completed_pages: 0,
                total_pages: 0,
            });
        }

        let doc = self.decoder.open(bytes, config.password.as_deref())?;
        let total = doc.page_count();
        job.opened(total);
        reporter.job_start(total);

        let mut sink = PageSink::new(job.mode);
        let mut render_ms = 0u64;
        let mut encode_ms = 0u64;

        for index in 0..total {
            if cancel.is_cancelled() {
                return Err(cancelled(job));
            }
            job.begin_page(index)?;
            let page_num = index + 1;
            reporter.page_start(page_num, total);

            let outcome = self
                .process_page(doc.as_ref(), index, job, &mut render_ms, &mut encode_ms)
                .await?;
            let skipped = match outcome {
                Ok((width_pt, height_pt, image)) => {
                    let len = image.len();
                    sink.push(width_pt, height_pt, image)?;
                    reporter.page_complete(page_num, total, len);
                    None
                }
                Err(page_error) => {
                    if config.error_policy == ErrorPolicy::FailFast {
                        return Err(page_error.into_fatal());
                    }
                    warn!("Skipping page {}: {}", page_num, page_error.0);
                    reporter.page_error(page_num, total, &page_error.0.to_string());
                    Some(page_error.0)
                }
            };

            let fraction = job.finish_page(skipped);
            // 1.0 is only reported once the output exists.
            if fraction < 1.0 && !cancel.is_cancelled() {
                reporter.progress(fraction);
            }
        }

        if cancel.is_cancelled() {
            return Err(cancelled(job));
        }
        if total > 0 && job.skipped().len() == total {
            return Err(RecodeError::AllPagesFailed {
                total,
                first_error: job.skipped()[0].to_string(),
            });
        }
        drop(doc);

        job.finalize()?;
        let artifact = sink.finish()?;
        job.done()?;
        reporter.progress(1.0);

        let processed = total - job.skipped().len();
        reporter.job_complete(total, processed);

        let output_bytes = match &artifact {
            Artifact::Images(images) => images.iter().map(EncodedImage::len).sum(),
            Artifact::Pdf(pdf) => pdf.bytes.len(),
        };
        let stats = ConversionStats {
            mode: job.mode,
            backend: self.decoder.name().to_string(),
            total_pages: total,
            processed_pages: processed,
            skipped_pages: job.skipped().len(),
            scale: job.scale,
            quality: job.quality.value(),
            input_bytes: bytes.len(),
            output_bytes,
            render_duration_ms: render_ms,
            encode_duration_ms: encode_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        Ok(ConversionOutput {
            artifact,
            stats,
            skipped: job.take_skipped(),
        })
    }

    /// Render and encode one page.
    ///
    /// The outer `Result` is a job-level failure (the blocking task died);
    /// the inner one is the page's own outcome, which the error policy
    /// decides about.
    async fn process_page(
        &self,
        doc: &dyn SourceDocument,
        index: usize,
        job: &ConversionJob,
        render_ms: &mut u64,
        encode_ms: &mut u64,
    ) -> Result<Result<(f32, f32, EncodedImage), FailedPage>, RecodeError> {
        let page_num = index + 1;

        let render_start = Instant::now();
        let rendered = doc.render_page(index, job.scale);
        *render_ms += render_start.elapsed().as_millis() as u64;
        tokio::task::yield_now().await;

        let page = match rendered {
            Ok(page) => page,
            Err(e) => {
                return Ok(Err(FailedPage(
                    PageError::RenderFailed {
                        page: page_num,
                        detail: e.to_string(),
                    },
                    e.into(),
                )))
            }
        };
        let (width_pt, height_pt) = (page.size.width_pt, page.size.height_pt);

        let quality = job.quality;
        let encode_start = Instant::now();
        let encoded = tokio::task::spawn_blocking(move || encode_page(&page, quality))
            .await
            .map_err(|e| RecodeError::Internal(format!("Encode task panicked: {}", e)))?;
        *encode_ms += encode_start.elapsed().as_millis() as u64;

        Ok(match encoded {
            Ok(image) => {
                debug!("Page {} done: {} bytes", page_num, image.len());
                Ok((width_pt, height_pt, image))
            }
            Err(e) => Err(FailedPage(
                PageError::EncodeFailed {
                    page: page_num,
                    detail: e.to_string(),
                },
                e.into(),
            )),
        })
    }
}

/// A page failure in both shapes: recorded (skip-page) and fatal (fail-fast).
struct FailedPage(PageError, RecodeError);

impl FailedPage {
    fn into_fatal(self) -> RecodeError {
        self.1
    }
}

fn cancelled(job: &mut ConversionJob) -> RecodeError {
    let err = RecodeError::Cancelled {
        completed_pages: job.pages_done(),
        total_pages: job.page_count(),
    };
    if let Err(e) = job.cancel() {
        return e;
    }
    err
}

/// Where finished pages go.
enum PageSink {
    Images(Vec<EncodedImage>),
    Pdf(PdfPageAssembler),
}

impl PageSink {
    fn new(mode: OutputMode) -> Self {
        match mode {
            OutputMode::ExtractImages => PageSink::Images(Vec::new()),
            OutputMode::Compress => PageSink::Pdf(PdfPageAssembler::new()),
        }
    }

    fn push(&mut self, width_pt: f32, height_pt: f32, image: EncodedImage) -> Result<(), RecodeError> {
        match self {
            PageSink::Images(images) => images.push(image),
            PageSink::Pdf(assembler) => assembler.add_page(width_pt, height_pt, &image.bytes)?,
        }
        Ok(())
    }

    fn finish(self) -> Result<Artifact, RecodeError> {
        Ok(match self {
            PageSink::Images(images) => Artifact::Images(images),
            PageSink::Pdf(assembler) => Artifact::Pdf(assembler.finalize()?),
        })
    }
}

// ── Convenience entry points ─────────────────────────────────────────────

/// Convert a PDF buffer according to `config`.
///
/// This is the primary entry point for the library.
///
/// # Example
/// ```rust,no_run
/// use pdf_recode::{convert, ConversionConfig, OutputMode};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("scan.pdf")?;
/// let config = ConversionConfig::builder().mode(OutputMode::Compress).build()?;
/// let output = convert(&bytes, &config).await?;
/// println!("{:.1}% smaller", output.stats.size_reduction_percent());
/// # Ok(())
/// # }
/// ```
pub async fn convert(bytes: &[u8], config: &ConversionConfig) -> Result<ConversionOutput, RecodeError> {
    convert_with_cancel(bytes, config, &CancellationToken::new()).await
}

/// [`convert`] with an external cancellation token.
pub async fn convert_with_cancel(
    bytes: &[u8],
    config: &ConversionConfig,
    cancel: &CancellationToken,
) -> Result<ConversionOutput, RecodeError> {
    ConversionPipeline::from_config(config)?
        .run(bytes, config, cancel)
        .await
}

/// Read a local PDF file and convert it.
pub async fn convert_file(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, RecodeError> {
    let bytes = input::read_pdf(path.as_ref()).await?;
    convert(&bytes, config).await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(bytes: &[u8], config: &ConversionConfig) -> Result<ConversionOutput, RecodeError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| RecodeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(bytes, config))
}

/// Page count and page sizes without rendering anything.
pub fn inspect(bytes: &[u8], config: &ConversionConfig) -> Result<DocumentInfo, RecodeError> {
    let pipeline = ConversionPipeline::from_config(config)?;
    let doc = pipeline.decoder.open(bytes, config.password.as_deref())?;
    let pages = (0..doc.page_count())
        .map(|i| doc.page_size(i))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DocumentInfo {
        backend: pipeline.decoder_name().to_string(),
        page_count: pages.len(),
        pages,
        input_bytes: bytes.len(),
    })
}
