//! PDF assembly: one full-bleed JPEG per page, written with `lopdf`.
//!
//! Every page is `/MediaBox [0 0 w h]` with a single DCT-encoded image
//! XObject painted over the whole box. JPEG bytes are embedded as-is, so the
//! output carries exactly the quality the encoder chose.

use crate::error::AssemblyError;
use crate::output::OutputPdf;
use image::codecs::jpeg::JpegDecoder;
use image::{ColorType, ImageDecoder};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::Cursor;
use tracing::debug;

const PRODUCER: &str = concat!("pdf-recode ", env!("CARGO_PKG_VERSION"));

/// Builds an image-only PDF page by page.
pub struct PdfPageAssembler {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl Default for PdfPageAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfPageAssembler {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append a page of `width_pt × height_pt` covered by `jpeg`.
    pub fn add_page(
        &mut self,
        width_pt: f32,
        height_pt: f32,
        jpeg: &[u8],
    ) -> Result<(), AssemblyError> {
        let valid = |v: f32| v.is_finite() && v > 0.0;
        if !valid(width_pt) || !valid(height_pt) {
            return Err(AssemblyError::InvalidDimensions {
                width: width_pt,
                height: height_pt,
            });
        }
        let header = JpegHeader::read(jpeg)?;

        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => header.width as i64,
                "Height" => header.height as i64,
                "ColorSpace" => header.color_space,
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg.to_vec(),
        )
        .with_compression(false);
        let image_id = self.doc.add_object(image);

        let content = format!("q {width_pt} 0 0 {height_pt} 0 0 cm /Im0 Do Q");
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(width_pt),
                Object::Real(height_pt),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        self.kids.push(page_id.into());

        debug!(
            "Assembled page {} ({}x{} pt, {}x{} px {})",
            self.kids.len(),
            width_pt,
            height_pt,
            header.width,
            header.height,
            header.color_space
        );
        Ok(())
    }

    /// Serialise the document. Pages appear in `add_page` order.
    pub fn finalize(mut self) -> Result<OutputPdf, AssemblyError> {
        let page_count = self.kids.len();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => page_count as i64,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        let info_id = self.doc.add_object(dictionary! {
            "Producer" => Object::string_literal(PRODUCER),
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", info_id);

        let mut bytes = Vec::new();
        self.doc
            .save_to(&mut bytes)
            .map_err(|e| AssemblyError::Serialize {
                detail: e.to_string(),
            })?;

        Ok(OutputPdf { bytes, page_count })
    }
}

/// What the image XObject dictionary needs from a JPEG.
struct JpegHeader {
    width: u32,
    height: u32,
    color_space: &'static str,
}

impl JpegHeader {
    fn read(jpeg: &[u8]) -> Result<Self, AssemblyError> {
        let invalid = |e: image::ImageError| AssemblyError::InvalidImage {
            detail: e.to_string(),
        };
        let decoder = JpegDecoder::new(Cursor::new(jpeg)).map_err(invalid)?;
        let (width, height) = decoder.dimensions();
        let color_space = match decoder.color_type() {
            ColorType::L8 | ColorType::L16 => "DeviceGray",
            _ => "DeviceRGB",
        };
        Ok(Self {
            width,
            height,
            color_space,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::ExtendedColorType;

    fn jpeg(width: u32, height: u32, gray: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        let (data, color) = if gray {
            (vec![128u8; (width * height) as usize], ExtendedColorType::L8)
        } else {
            (vec![200u8; (width * height * 3) as usize], ExtendedColorType::Rgb8)
        };
        JpegEncoder::new_with_quality(&mut buf, 80)
            .encode(&data, width, height, color)
            .unwrap();
        buf
    }

    fn image_dict(doc: &Document, page_id: ObjectId) -> lopdf::Dictionary {
        let page = doc.get_dictionary(page_id).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        let id = xobjects.get(b"Im0").unwrap().as_reference().unwrap();
        doc.get_object(id).unwrap().as_stream().unwrap().dict.clone()
    }

    #[test]
    fn pages_keep_order_and_size() {
        let mut asm = PdfPageAssembler::new();
        asm.add_page(612.0, 792.0, &jpeg(16, 20, false)).unwrap();
        asm.add_page(842.0, 595.0, &jpeg(20, 16, false)).unwrap();
        let pdf = asm.finalize().unwrap();
        assert_eq!(pdf.page_count, 2);

        let doc = Document::load_mem(&pdf.bytes).unwrap();
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        assert_eq!(pages.len(), 2);

        let media_box = |id: ObjectId| -> Vec<f32> {
            doc.get_dictionary(id)
                .unwrap()
                .get(b"MediaBox")
                .unwrap()
                .as_array()
                .unwrap()
                .iter()
                .map(|o| match o {
                    Object::Integer(i) => *i as f32,
                    Object::Real(f) => *f,
                    other => panic!("unexpected {other:?}"),
                })
                .collect()
        };
        assert_eq!(media_box(pages[0]), vec![0.0, 0.0, 612.0, 792.0]);
        assert_eq!(media_box(pages[1]), vec![0.0, 0.0, 842.0, 595.0]);

        let img = image_dict(&doc, pages[1]);
        assert_eq!(img.get(b"Width").unwrap().as_i64().unwrap(), 20);
        assert_eq!(img.get(b"Height").unwrap().as_i64().unwrap(), 16);
        assert_eq!(img.get(b"Filter").unwrap().as_name().unwrap(), b"DCTDecode");
    }

    #[test]
    fn gray_jpeg_uses_device_gray() {
        let mut asm = PdfPageAssembler::new();
        asm.add_page(100.0, 100.0, &jpeg(8, 8, true)).unwrap();
        let pdf = asm.finalize().unwrap();
        let doc = Document::load_mem(&pdf.bytes).unwrap();
        let page = *doc.get_pages().values().next().unwrap();
        let img = image_dict(&doc, page);
        assert_eq!(img.get(b"ColorSpace").unwrap().as_name().unwrap(), b"DeviceGray");
    }

    #[test]
    fn zero_pages_is_valid() {
        let pdf = PdfPageAssembler::new().finalize().unwrap();
        assert_eq!(pdf.page_count, 0);
        assert!(pdf.bytes.starts_with(b"%PDF-"));
        let doc = Document::load_mem(&pdf.bytes).unwrap();
        assert!(doc.get_pages().is_empty());
    }

    #[test]
    fn rejects_bad_dimensions() {
        let mut asm = PdfPageAssembler::new();
        let img = jpeg(4, 4, false);
        for (w, h) in [(0.0, 10.0), (10.0, -1.0), (f32::NAN, 10.0), (10.0, f32::INFINITY)] {
            assert!(matches!(
                asm.add_page(w, h, &img),
                Err(AssemblyError::InvalidDimensions { .. })
            ));
        }
        assert_eq!(asm.page_count(), 0);
    }

    #[test]
    fn rejects_non_jpeg() {
        let mut asm = PdfPageAssembler::new();
        assert!(matches!(
            asm.add_page(10.0, 10.0, b"\x89PNG\r\n\x1a\n"),
            Err(AssemblyError::InvalidImage { .. })
        ));
        assert!(matches!(
            asm.add_page(10.0, 10.0, &[]),
            Err(AssemblyError::InvalidImage { .. })
        ));
    }

    #[test]
    fn producer_is_recorded() {
        let pdf = PdfPageAssembler::new().finalize().unwrap();
        let doc = Document::load_mem(&pdf.bytes).unwrap();
        let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_dictionary(info_id).unwrap();
        let producer = info.get(b"Producer").unwrap().as_str().unwrap();
        assert!(producer.starts_with(b"pdf-recode"));
    }
}
