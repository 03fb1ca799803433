//! Output types: encoded page images, the assembled PDF, and job statistics.

use crate::config::{OutputMode, QualityFactor};
use crate::error::{PageError, RecodeError};
use crate::pipeline::archive;
use crate::pipeline::decode::PageSize;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// One page encoded as JPEG.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    /// 0-based index of the source page.
    pub page_index: usize,
    pub bytes: Vec<u8>,
    pub quality: QualityFactor,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl EncodedImage {
    pub const MIME_TYPE: &'static str = "image/jpeg";

    /// Download name: `{base}_{page}.jpg`, pages numbered from 1.
    pub fn file_name(&self, base: &str) -> String {
        format!("{}_{}.jpg", base, self.page_index + 1)
    }

    /// `data:image/jpeg;base64,…`, for embedding or direct links.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", Self::MIME_TYPE, STANDARD.encode(&self.bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A PDF produced by [`crate::pipeline::assemble::PdfPageAssembler`].
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPdf {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

impl OutputPdf {
    pub const MIME_TYPE: &'static str = "application/pdf";

    /// Download name: `{base}-compressed.pdf`.
    pub fn file_name(base: &str) -> String {
        format!("{}-compressed.pdf", base)
    }
}

/// What a job produced, depending on [`OutputMode`].
#[derive(Debug, Clone)]
pub enum Artifact {
    Images(Vec<EncodedImage>),
    Pdf(OutputPdf),
}

/// The result of a successful conversion.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    pub artifact: Artifact,
    pub stats: ConversionStats,
    /// Pages dropped under [`crate::config::ErrorPolicy::SkipPage`].
    pub skipped: Vec<PageError>,
}

impl ConversionOutput {
    /// Page images in page order; empty in compress mode.
    pub fn images(&self) -> &[EncodedImage] {
        match &self.artifact {
            Artifact::Images(images) => images,
            Artifact::Pdf(_) => &[],
        }
    }

    pub fn pdf(&self) -> Option<&OutputPdf> {
        match &self.artifact {
            Artifact::Pdf(pdf) => Some(pdf),
            Artifact::Images(_) => None,
        }
    }

    /// Pack the page images into a flat ZIP (`{base}_{n}.jpg` entries).
    pub fn zip_images(&self, base: &str) -> Result<Vec<u8>, RecodeError> {
        Ok(archive::images_archive(self.images(), base)?)
    }

    /// Write the artefacts into `dir` and return the written paths.
    ///
    /// Images are written one file per page, or as a single
    /// `{base}_images.zip` when `zip_images` is set. All files are first
    /// staged under temporary names and renamed only once every write
    /// succeeded, so a failed write leaves nothing behind.
    pub async fn write_to_dir(
        &self,
        dir: &Path,
        base: &str,
        zip_images: bool,
    ) -> Result<Vec<PathBuf>, RecodeError> {
        create_dir(dir).await?;

        let zipped;
        let files: Vec<(PathBuf, &[u8])> = match &self.artifact {
            Artifact::Pdf(pdf) => {
                vec![(dir.join(OutputPdf::file_name(base)), pdf.bytes.as_slice())]
            }
            Artifact::Images(_) if zip_images => {
                zipped = self.zip_images(base)?;
                vec![(dir.join(archive::archive_file_name(base)), zipped.as_slice())]
            }
            Artifact::Images(images) => images
                .iter()
                .map(|image| (dir.join(image.file_name(base)), image.bytes.as_slice()))
                .collect(),
        };
        write_all_atomic(&files).await?;
        Ok(files.into_iter().map(|(path, _)| path).collect())
    }

    /// Write the assembled PDF to exactly `path`.
    ///
    /// # Errors
    /// [`RecodeError::Internal`] when this output holds page images.
    pub async fn write_pdf_to(&self, path: &Path) -> Result<(), RecodeError> {
        let Some(pdf) = self.pdf() else {
            return Err(RecodeError::Internal(
                "No PDF to write: the job extracted images".into(),
            ));
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir(parent).await?;
        }
        write_atomic(path, &pdf.bytes).await
    }
}

async fn create_dir(dir: &Path) -> Result<(), RecodeError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| RecodeError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write via a temp file and rename. The temp file is removed on failure.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), RecodeError> {
    write_all_atomic(&[(path.to_path_buf(), bytes)]).await
}

/// Stage every file under a temp name, then rename them all.
///
/// A failed write removes every staged temp file. A failed rename removes
/// the temp files not yet renamed; files renamed before it stay in place.
async fn write_all_atomic(files: &[(PathBuf, &[u8])]) -> Result<(), RecodeError> {
    let failed = |path: &Path, e| RecodeError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    for (i, (path, bytes)) in files.iter().enumerate() {
        if let Err(e) = tokio::fs::write(tmp_path(path), bytes).await {
            remove_tmp(&files[..=i]).await;
            return Err(failed(path, e));
        }
    }
    for (i, (path, _)) in files.iter().enumerate() {
        if let Err(e) = tokio::fs::rename(tmp_path(path), path).await {
            remove_tmp(&files[i..]).await;
            return Err(failed(path, e));
        }
    }
    Ok(())
}

async fn remove_tmp(files: &[(PathBuf, &[u8])]) {
    for (path, _) in files {
        let tmp = tmp_path(path);
        if let Err(e) = tokio::fs::remove_file(&tmp).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", tmp.display(), e);
            }
        }
    }
}

/// Page geometry of a document, read without rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub backend: String,
    pub page_count: usize,
    /// Displayed size of each page, in page order.
    pub pages: Vec<PageSize>,
    pub input_bytes: usize,
}

/// Statistics for a finished job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub mode: OutputMode,
    pub backend: String,
    pub total_pages: usize,
    pub processed_pages: usize,
    pub skipped_pages: usize,
    pub scale: f32,
    pub quality: f32,
    pub input_bytes: usize,
    /// Sum of image bytes, or the size of the assembled PDF.
    pub output_bytes: usize,
    pub render_duration_ms: u64,
    pub encode_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl ConversionStats {
    /// How much smaller the output is than the input, in percent.
    ///
    /// Negative when the output grew; `0.0` for empty input.
    pub fn size_reduction_percent(&self) -> f64 {
        if self.input_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.output_bytes as f64 / self.input_bytes as f64) * 100.0
    }
}
