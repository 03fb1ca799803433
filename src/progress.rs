//! Progress-callback trait for per-page job events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline processes each page.
//!
//! Progress is the only observable side effect of a running job. The
//! fraction passed to [`ConversionProgressCallback::on_progress`] never
//! decreases, and reaches `1.0` only once the job's output is ready. After a
//! cancellation or a fatal error no further events are delivered.
//!
//! # Example
//!
//! ```rust
//! use pdf_recode::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, Mutex};
//!
//! struct Recorder {
//!     fractions: Mutex<Vec<f32>>,
//! }
//!
//! impl ConversionProgressCallback for Recorder {
//!     fn on_progress(&self, fraction: f32) {
//!         self.fractions.lock().unwrap().push(fraction);
//!     }
//! }
//!
//! let recorder = Arc::new(Recorder { fractions: Mutex::new(Vec::new()) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(recorder as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Pages are processed one at a time, but the callback
/// may be invoked from whichever runtime thread is driving the job, hence
/// `Send + Sync`.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after the document opened, before any page is rendered.
    fn on_job_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page is rendered. `page_num` is 1-indexed.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page has been rendered and encoded.
    ///
    /// `encoded_len` is the byte length of the page's JPEG.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, encoded_len: usize) {
        let _ = (page_num, total_pages, encoded_len);
    }

    /// Called when a page is skipped under the skip-page error policy.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Fraction of the job completed, in `[0.0, 1.0]`, non-decreasing.
    fn on_progress(&self, fraction: f32) {
        let _ = fraction;
    }

    /// Called once when the output is ready.
    fn on_job_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Forwards events to an optional callback and keeps the fraction monotonic.
pub(crate) struct ProgressReporter {
    callback: Option<ProgressCallback>,
    last: f32,
}

impl ProgressReporter {
    pub(crate) fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            last: 0.0,
        }
    }

    pub(crate) fn job_start(&self, total_pages: usize) {
        if let Some(cb) = &self.callback {
            cb.on_job_start(total_pages);
        }
    }

    pub(crate) fn page_start(&self, page_num: usize, total_pages: usize) {
        if let Some(cb) = &self.callback {
            cb.on_page_start(page_num, total_pages);
        }
    }

    pub(crate) fn page_complete(&self, page_num: usize, total_pages: usize, encoded_len: usize) {
        if let Some(cb) = &self.callback {
            cb.on_page_complete(page_num, total_pages, encoded_len);
        }
    }

    pub(crate) fn page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        if let Some(cb) = &self.callback {
            cb.on_page_error(page_num, total_pages, error);
        }
    }

    /// Report `fraction`, clamped to `[last, 1.0]`.
    pub(crate) fn progress(&mut self, fraction: f32) {
        let fraction = fraction.clamp(self.last, 1.0);
        self.last = fraction;
        if let Some(cb) = &self.callback {
            cb.on_progress(fraction);
        }
    }

    pub(crate) fn job_complete(&self, total_pages: usize, success_count: usize) {
        if let Some(cb) = &self.callback {
            cb.on_job_complete(total_pages, success_count);
        }
    }
}
