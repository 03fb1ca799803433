//! pdfium backend: full-fidelity rendering through `pdfium-render`.
//!
//! The library is located at bind time:
//!
//! 1. `PDFIUM_LIB_PATH`, if set, naming the library file or its directory;
//! 2. the platform library name in the current directory;
//! 3. the system library search path.
//!
//! `PdfDocument` borrows its `Pdfium` binding, so a [`PdfiumDocument`] keeps
//! the binding and the source bytes and reloads the document for each call.
//! pdfium parses lazily, so reloading costs the xref read, not a full parse.

use crate::error::{DecodeError, RenderError};
use crate::pipeline::decode::{
    check_pdf_header, check_render_args, PageSize, PdfDecoder, RenderedPage, SourceDocument,
};
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Renders with the pdfium C++ library.
#[derive(Debug, Clone)]
pub struct PdfiumDecoder {
    max_pixel_edge: u32,
}

impl PdfiumDecoder {
    /// Fails when no pdfium library can be bound.
    pub fn probe(max_pixel_edge: u32) -> Result<Self, String> {
        bind()?;
        Ok(Self { max_pixel_edge })
    }
}

/// Bind to the first pdfium library found.
fn bind() -> Result<Pdfium, String> {
    if let Ok(env_path) = std::env::var("PDFIUM_LIB_PATH") {
        let mut path = PathBuf::from(env_path);
        if path.is_dir() {
            path = PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(&path));
        }
        return Pdfium::bind_to_library(&path)
            .map(Pdfium::new)
            .map_err(|e| format!("failed to bind pdfium at {}: {e}", path.display()));
    }

    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| format!("pdfium library not found: {e}"))
}

fn classify_load_error(err: PdfiumError, password: Option<&str>) -> DecodeError {
    let err_str = format!("{:?}", err);
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            DecodeError::WrongPassword
        } else {
            DecodeError::PasswordRequired
        }
    } else {
        DecodeError::Corrupt { detail: err_str }
    }
}

impl PdfDecoder for PdfiumDecoder {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    fn open(
        &self,
        bytes: &[u8],
        password: Option<&str>,
    ) -> Result<Box<dyn SourceDocument>, DecodeError> {
        check_pdf_header(bytes)?;
        let pdfium = bind().map_err(|detail| DecodeError::Corrupt { detail })?;

        let sizes = {
            let document = pdfium
                .load_pdf_from_byte_slice(bytes, password)
                .map_err(|e| classify_load_error(e, password))?;
            document
                .pages()
                .iter()
                .map(|page| PageSize::new(page.width().value, page.height().value))
                .collect::<Vec<_>>()
        };
        info!("PDF loaded (pdfium): {} pages", sizes.len());

        Ok(Box::new(PdfiumDocument {
            pdfium,
            bytes: bytes.to_vec(),
            password: password.map(str::to_string),
            sizes,
            max_pixel_edge: self.max_pixel_edge,
        }))
    }
}

struct PdfiumDocument {
    pdfium: Pdfium,
    bytes: Vec<u8>,
    password: Option<String>,
    sizes: Vec<PageSize>,
    max_pixel_edge: u32,
}

impl SourceDocument for PdfiumDocument {
    fn page_count(&self) -> usize {
        self.sizes.len()
    }

    fn page_size(&self, index: usize) -> Result<PageSize, RenderError> {
        self.sizes
            .get(index)
            .copied()
            .ok_or(RenderError::PageOutOfRange {
                page: index + 1,
                total: self.sizes.len(),
            })
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<RenderedPage, RenderError> {
        check_render_args(index, self.sizes.len(), scale)?;
        let page_num = index + 1;
        let backend = |e: PdfiumError| RenderError::Backend {
            page: page_num,
            detail: format!("{:?}", e),
        };

        let size = self.sizes[index];
        let (width, height) = size.pixel_dimensions(scale);
        if width > self.max_pixel_edge || height > self.max_pixel_edge {
            return Err(RenderError::SurfaceTooLarge {
                page: page_num,
                width,
                height,
                limit: self.max_pixel_edge,
            });
        }

        let document = self
            .pdfium
            .load_pdf_from_byte_slice(&self.bytes, self.password.as_deref())
            .map_err(backend)?;
        let page = document
            .pages()
            .get(pdfium_page_index(index, self.sizes.len())?)
            .map_err(backend)?;

        let render_config = PdfRenderConfig::new()
            .set_target_size(width as i32, height as i32)
            .set_clear_color(PdfColor::WHITE)
            .render_form_data(true);
        let bitmap = page.render_with_config(&render_config).map_err(backend)?;
        let image = bitmap.as_image().to_rgb8();

        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );

        Ok(RenderedPage {
            page_index: index,
            size,
            scale,
            image,
        })
    }
}

/// pdfium addresses pages with a `u16`.
fn pdfium_page_index(index: usize, total: usize) -> Result<u16, RenderError> {
    u16::try_from(index).map_err(|_| RenderError::PageOutOfRange {
        page: index + 1,
        total,
    })
}
