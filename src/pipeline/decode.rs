//! Decoder seam: open a PDF buffer and render its pages.
//!
//! Two backends implement [`PdfDecoder`]: [`crate::pipeline::pdfium`] wraps
//! the pdfium C++ library and renders everything a viewer would, and
//! [`crate::pipeline::native`] is a pure-Rust renderer built on `lopdf` that
//! covers vector graphics and images. The pipeline only sees the traits.
//!
//! A [`SourceDocument`] is immutable once opened and is not required to be
//! `Send`: pdfium handles are bound to the thread that created them, so the
//! pipeline renders on the task that opened the document and only ships the
//! resulting pixels to other threads.

use crate::error::{DecodeError, RenderError};
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// How far into the buffer the `%PDF-` marker may appear. Some producers
/// prepend junk (mail headers, BOMs) and every mainstream reader tolerates it.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// US Letter, used when a page carries no usable `/MediaBox`.
pub const DEFAULT_PAGE_SIZE: PageSize = PageSize {
    width_pt: 612.0,
    height_pt: 792.0,
};

/// Opens PDF buffers.
pub trait PdfDecoder: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Parse `bytes` into a document handle.
    ///
    /// The page count must be known when this returns; no page is rendered.
    fn open(
        &self,
        bytes: &[u8],
        password: Option<&str>,
    ) -> Result<Box<dyn SourceDocument>, DecodeError>;
}

/// An opened PDF. Resources are released on drop.
pub trait SourceDocument {
    fn page_count(&self) -> usize;

    /// Displayed size of page `index` (0-based) in points.
    fn page_size(&self, index: usize) -> Result<PageSize, RenderError>;

    /// Rasterise page `index` at `scale` pixels per point onto an opaque
    /// white background.
    fn render_page(&self, index: usize, scale: f32) -> Result<RenderedPage, RenderError>;
}

/// Page size in PDF points (1/72 inch), rotation already applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    pub fn new(width_pt: f32, height_pt: f32) -> Self {
        Self {
            width_pt,
            height_pt,
        }
    }

    /// Pixel size of a render at `scale`: each edge rounded, at least 1 px.
    pub fn pixel_dimensions(&self, scale: f32) -> (u32, u32) {
        let px = |pt: f32| ((pt * scale).round() as i64).clamp(1, u32::MAX as i64) as u32;
        (px(self.width_pt), px(self.height_pt))
    }
}

/// A page rasterised at a given scale. Owned by one page's processing step.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 0-based page index in the source document.
    pub page_index: usize,
    pub size: PageSize,
    pub scale: f32,
    pub image: RgbImage,
}

impl RenderedPage {
    pub fn pixel_width(&self) -> u32 {
        self.image.width()
    }

    pub fn pixel_height(&self) -> u32 {
        self.image.height()
    }
}

/// Reject buffers that cannot be a PDF before handing them to a parser.
///
/// Catches empty and truncated input with a clear error instead of whatever
/// the backend happens to report.
pub fn check_pdf_header(bytes: &[u8]) -> Result<(), DecodeError> {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    if window.windows(5).any(|w| w == b"%PDF-") {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    for (dst, src) in magic.iter_mut().zip(bytes.iter()) {
        *dst = *src;
    }
    Err(DecodeError::NotAPdf { magic })
}

/// Validate the arguments shared by every backend's `render_page`.
pub(crate) fn check_render_args(index: usize, total: usize, scale: f32) -> Result<(), RenderError> {
    if index >= total {
        return Err(RenderError::PageOutOfRange {
            page: index + 1,
            total,
        });
    }
    if !scale.is_finite() || scale <= 0.0 {
        return Err(RenderError::InvalidScale { scale });
    }
    Ok(())
}
