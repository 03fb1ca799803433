//! End-to-end tests of the conversion pipeline on generated PDFs.
//!
//! Everything here runs on the native backend so no libpdfium is needed.
//! The pdfium variants at the bottom skip themselves when the library
//! cannot be bound.
//!
//! Run with:
//!   cargo test --test pipeline -- --nocapture

mod common;

use common::{build_pdf, letter_pdf, Page};
use pdf_recode::{
    build_archive, convert, convert_file, convert_with_cancel, inspect, ArchiveError,
    CancellationToken, ConversionConfig, ConversionPipeline, ConversionProgressCallback,
    DecodeError, DecoderBackend, ErrorKind, ErrorPolicy, OutputMode, QualityPreset, RecodeError,
};
use std::io::Read;
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn native() -> pdf_recode::ConversionConfigBuilder {
    ConversionConfig::builder().backend(DecoderBackend::Native)
}

/// Records every callback in order.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
    fractions: Mutex<Vec<f32>>,
    /// Cancel this token once the given page completes.
    cancel_after: Option<(usize, CancellationToken)>,
}

impl Recorder {
    fn cancelling_after(page: usize, token: CancellationToken) -> Self {
        Self {
            cancel_after: Some((page, token)),
            ..Default::default()
        }
    }

    fn fractions(&self) -> Vec<f32> {
        self.fractions.lock().unwrap().clone()
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ConversionProgressCallback for Recorder {
    fn on_job_start(&self, total_pages: usize) {
        self.events.lock().unwrap().push(format!("start {total_pages}"));
    }

    fn on_page_complete(&self, page_num: usize, _total: usize, encoded_len: usize) {
        assert!(encoded_len > 0);
        self.events.lock().unwrap().push(format!("page {page_num}"));
        if let Some((page, token)) = &self.cancel_after {
            if *page == page_num {
                token.cancel();
            }
        }
    }

    fn on_page_error(&self, page_num: usize, _total: usize, _error: &str) {
        self.events.lock().unwrap().push(format!("skip {page_num}"));
    }

    fn on_progress(&self, fraction: f32) {
        self.fractions.lock().unwrap().push(fraction);
    }

    fn on_job_complete(&self, total_pages: usize, success_count: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {success_count}/{total_pages}"));
    }
}

fn assert_monotonic(fractions: &[f32]) {
    for pair in fractions.windows(2) {
        assert!(pair[0] <= pair[1], "progress went backwards: {fractions:?}");
    }
}

// ── Extract images ───────────────────────────────────────────────────────────

#[tokio::test]
async fn three_letter_pages_at_scale_two() {
    let config = native().scale(2.0).build().unwrap();
    let output = convert(&letter_pdf(3), &config).await.unwrap();

    let images = output.images();
    assert_eq!(images.len(), 3);
    for (i, img) in images.iter().enumerate() {
        assert_eq!(img.page_index, i);
        assert_eq!((img.pixel_width, img.pixel_height), (1224, 1584));

        let decoded = image::load_from_memory(&img.bytes).expect("valid JPEG");
        assert_eq!((decoded.width(), decoded.height()), (1224, 1584));
    }
    assert_eq!(images[1].file_name("report"), "report_2.jpg");
    assert_eq!(output.stats.processed_pages, 3);
    assert!(output.skipped.is_empty());
}

#[tokio::test]
async fn higher_quality_gives_larger_images() {
    let bytes = letter_pdf(1);
    let low = convert(&bytes, &native().scale(1.0).quality(0.3).build().unwrap())
        .await
        .unwrap();
    let high = convert(&bytes, &native().scale(1.0).quality(0.95).build().unwrap())
        .await
        .unwrap();
    assert!(low.images()[0].len() <= high.images()[0].len());
}

#[tokio::test]
async fn images_zip_round_trip() {
    let config = native().scale(0.5).build().unwrap();
    let output = convert(&letter_pdf(2), &config).await.unwrap();
    let zip_bytes = output.zip_images("scan").unwrap();

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();
    assert_eq!(archive.len(), 2);
    let mut first = archive.by_name("scan_1.jpg").unwrap();
    let mut data = Vec::new();
    first.read_to_end(&mut data).unwrap();
    assert_eq!(data, output.images()[0].bytes);
}

#[test]
fn archive_rejects_duplicate_names() {
    let err = build_archive([("a.jpg", vec![1u8]), ("a.jpg", vec![2u8])]).unwrap_err();
    assert!(matches!(err, ArchiveError::DuplicateEntry { .. }));
}

// ── Compress ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn compress_keeps_page_count_and_sizes() {
    let bytes = build_pdf(&[
        Page::letter("0 g 0 0 100 100 re f"),
        Page::sized(842.0, 595.0),
        Page::sized(300.0, 300.0),
    ]);
    let config = native()
        .mode(OutputMode::Compress)
        .quality_preset(QualityPreset::Low)
        .build()
        .unwrap();
    let output = convert(&bytes, &config).await.unwrap();
    let pdf = output.pdf().expect("compress mode yields a PDF");
    assert_eq!(pdf.page_count, 3);

    let doc = lopdf::Document::load_mem(&pdf.bytes).unwrap();
    let pages: Vec<_> = doc.get_pages().into_values().collect();
    assert_eq!(pages.len(), 3);
    for (page_id, (w, h)) in pages.iter().zip([(612.0, 792.0), (842.0, 595.0), (300.0, 300.0)]) {
        let dict = doc.get_dictionary(*page_id).unwrap();
        let media_box: Vec<f32> = dict
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_float().unwrap())
            .collect();
        assert_eq!(media_box, vec![0.0, 0.0, w, h]);

        let xobjects = dict
            .get(b"Resources")
            .and_then(|r| r.as_dict())
            .and_then(|r| r.get(b"XObject"))
            .and_then(|x| x.as_dict())
            .unwrap();
        assert_eq!(xobjects.len(), 1, "exactly one image per page");
    }

    // Re-reading the compressed PDF gives the same geometry.
    let reread = convert(&pdf.bytes, &native().scale(1.0).build().unwrap())
        .await
        .unwrap();
    let sizes: Vec<(u32, u32)> = reread
        .images()
        .iter()
        .map(|i| (i.pixel_width, i.pixel_height))
        .collect();
    assert_eq!(sizes, vec![(612, 792), (842, 595), (300, 300)]);
}

#[tokio::test]
async fn zero_page_document() {
    let bytes = build_pdf(&[]);
    let recorder = Arc::new(Recorder::default());
    let config = native()
        .mode(OutputMode::Compress)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let output = convert(&bytes, &config).await.unwrap();
    assert_eq!(output.pdf().map(|p| p.page_count), Some(0));
    assert_eq!(recorder.fractions(), vec![1.0]);

    let images = convert(&bytes, &native().build().unwrap()).await.unwrap();
    assert!(images.images().is_empty());
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn corrupt_input_fails_without_progress() {
    let recorder = Arc::new(Recorder::default());
    let config = native().progress_callback(recorder.clone()).build().unwrap();

    for bytes in [&b"%PD"[..], &b""[..], &b"<html>not a pdf</html>"[..]] {
        let err = convert(bytes, &config).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode, "got {err}");
    }
    assert!(recorder.fractions().is_empty());
    assert!(recorder.events().is_empty());
}

#[tokio::test]
async fn truncated_header_is_not_a_pdf() {
    let err = convert(b"%PD", &native().build().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, RecodeError::Decode(DecodeError::NotAPdf { .. })));
}

#[tokio::test]
async fn broken_page_fails_fast_by_default() {
    let bytes = build_pdf(&[Page::letter(""), Page::dangling_contents(), Page::letter("")]);
    let err = convert(&bytes, &native().scale(0.5).build().unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Render);
}

#[tokio::test]
async fn lenient_mode_skips_broken_page() {
    let bytes = build_pdf(&[Page::letter(""), Page::dangling_contents(), Page::letter("")]);
    let recorder = Arc::new(Recorder::default());
    let config = native()
        .scale(0.5)
        .error_policy(ErrorPolicy::SkipPage)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let output = convert(&bytes, &config).await.unwrap();

    let pages: Vec<usize> = output.images().iter().map(|i| i.page_index).collect();
    assert_eq!(pages, vec![0, 2]);
    assert_eq!(output.skipped.len(), 1);
    assert_eq!(output.skipped[0].page(), 2);
    assert_eq!(
        recorder.events(),
        vec!["start 3", "page 1", "skip 2", "page 3", "done 2/3"]
    );
}

// ── Progress & cancellation ──────────────────────────────────────────────────

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_one() {
    let recorder = Arc::new(Recorder::default());
    let config = native()
        .scale(0.5)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    convert(&letter_pdf(4), &config).await.unwrap();

    let fractions = recorder.fractions();
    assert_monotonic(&fractions);
    assert_eq!(fractions, vec![0.25, 0.5, 0.75, 1.0]);
    assert_eq!(recorder.events().last().map(String::as_str), Some("done 4/4"));
}

#[tokio::test]
async fn cancel_after_page_two_of_five() {
    let token = CancellationToken::new();
    let recorder = Arc::new(Recorder::cancelling_after(2, token.clone()));
    let config = native()
        .scale(0.5)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let err = convert_with_cancel(&letter_pdf(5), &config, &token)
        .await
        .unwrap_err();
    match err {
        RecodeError::Cancelled {
            completed_pages,
            total_pages,
        } => {
            assert_eq!(completed_pages, 2);
            assert_eq!(total_pages, 5);
        }
        other => panic!("expected Cancelled, got {other:?}"),
    }

    let fractions = recorder.fractions();
    assert_eq!(fractions, vec![0.2], "no progress after cancellation");
    assert!(!recorder.events().iter().any(|e| e.starts_with("done")));
}

// ── Decoder behaviour ────────────────────────────────────────────────────────

#[tokio::test]
async fn decoding_twice_gives_identical_pixels() {
    let bytes = letter_pdf(1);
    let pipeline = ConversionPipeline::for_backend(DecoderBackend::Native, 10_000).unwrap();
    let config = native().scale(0.5).quality(1.0).build().unwrap();

    let a = pipeline.run(&bytes, &config, &CancellationToken::new()).await.unwrap();
    let b = pipeline.run(&bytes, &config, &CancellationToken::new()).await.unwrap();
    assert_eq!(a.images()[0].bytes, b.images()[0].bytes);
}

#[test]
fn inspect_reports_page_sizes() {
    let bytes = build_pdf(&[Page::sized(100.0, 200.0), Page::sized(595.0, 842.0)]);
    let info = inspect(&bytes, &native().build().unwrap()).unwrap();
    assert_eq!(info.page_count, 2);
    assert_eq!((info.pages[0].width_pt, info.pages[0].height_pt), (100.0, 200.0));
    assert_eq!((info.pages[1].width_pt, info.pages[1].height_pt), (595.0, 842.0));
}

#[tokio::test]
async fn convert_file_and_write_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("Quarterly.PDF");
    std::fs::write(&input, letter_pdf(2)).unwrap();

    let config = native()
        .mode(OutputMode::Compress)
        .scale(0.5)
        .build()
        .unwrap();
    let output = convert_file(&input, &config).await.unwrap();
    let base = pdf_recode::base_name(&input);
    assert_eq!(base, "Quarterly");

    let out_dir = dir.path().join("out");
    let written = output.write_to_dir(&out_dir, &base, false).await.unwrap();
    assert_eq!(written, vec![out_dir.join("Quarterly-compressed.pdf")]);
    assert!(std::fs::read(&written[0]).unwrap().starts_with(b"%PDF-"));
}

#[tokio::test]
async fn missing_input_file() {
    let err = convert_file("/no/such/file.pdf", &native().build().unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

// ── pdfium (skipped when the library is unavailable) ─────────────────────────

fn pdfium_pipeline() -> Option<ConversionPipeline> {
    match ConversionPipeline::for_backend(DecoderBackend::Pdfium, 10_000) {
        Ok(p) => Some(p),
        Err(e) => {
            println!("SKIP: {e}");
            None
        }
    }
}

#[tokio::test]
async fn pdfium_matches_native_dimensions() {
    let Some(pipeline) = pdfium_pipeline() else {
        return;
    };
    let config = ConversionConfig::builder()
        .backend(DecoderBackend::Pdfium)
        .scale(2.0)
        .build()
        .unwrap();
    let output = pipeline
        .run(&letter_pdf(3), &config, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(output.images().len(), 3);
    for img in output.images() {
        assert_eq!((img.pixel_width, img.pixel_height), (1224, 1584));
    }
}
