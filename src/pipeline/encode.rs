//! Image encoding: `RenderedPage` → baseline JPEG.
//!
//! Pages go out as RGB JPEG whatever the source content looked like. The
//! quality factor in `[0, 1]` maps linearly onto the encoder's 1–100 scale,
//! so a higher factor never yields a smaller file for the same pixels.

use crate::config::QualityFactor;
use crate::error::EncodeError;
use crate::output::EncodedImage;
use crate::pipeline::decode::RenderedPage;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use tracing::debug;

/// Largest edge a baseline JPEG frame header can describe.
pub const MAX_JPEG_EDGE: u32 = u16::MAX as u32;

/// Encode a rasterised page as JPEG at `quality`.
pub fn encode_page(page: &RenderedPage, quality: QualityFactor) -> Result<EncodedImage, EncodeError> {
    let page_num = page.page_index + 1;
    let (width, height) = page.image.dimensions();
    if width > MAX_JPEG_EDGE || height > MAX_JPEG_EDGE {
        return Err(EncodeError::TooLarge {
            page: page_num,
            width,
            height,
        });
    }

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.jpeg_quality())
        .encode(page.image.as_raw(), width, height, ExtendedColorType::Rgb8)
        .map_err(|e| EncodeError::Jpeg {
            page: page_num,
            detail: e.to_string(),
        })?;

    debug!(
        "Encoded page {} → {} bytes JPEG (q={})",
        page_num,
        buf.len(),
        quality.jpeg_quality()
    );

    Ok(EncodedImage {
        page_index: page.page_index,
        bytes: buf,
        quality,
        pixel_width: width,
        pixel_height: height,
    })
}
