//! Pipeline stages for PDF page re-encoding.
//!
//! Each submodule implements exactly one transformation step, so each is
//! independently testable and the rendering backend can be swapped without
//! touching the other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ decode ──▶ raster ──▶ encode ──▶ assemble | archive
//! (bytes)   (open)     (pixels)   (JPEG)     (PDF)      (ZIP)
//! ```
//!
//! 1. [`input`]: read a local file, sniff `%PDF-`, derive output names
//! 2. [`decode`]: the [`decode::PdfDecoder`] seam, implemented by
//!    [`native`] (lopdf + [`raster`]) and [`pdfium`]
//! 3. [`encode`]: RGB pixels to baseline JPEG at the job's quality
//! 4. [`assemble`]: image-only PDF, one full-bleed JPEG per page
//! 5. [`archive`]: flat ZIP of page images

pub mod archive;
pub mod assemble;
pub mod decode;
pub mod encode;
pub mod input;
pub mod native;
pub mod pdfium;
pub mod raster;

#[cfg(test)]
pub(crate) mod fixtures;
