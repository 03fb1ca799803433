//! Error types for the pdf-recode library.
//!
//! Errors are layered the same way the pipeline is:
//!
//! * One error enum per stage: [`DecodeError`], [`RenderError`],
//!   [`EncodeError`], [`AssemblyError`], [`ArchiveError`]. Each stage returns
//!   only its own kind, which keeps the stage modules independent.
//!
//! * [`RecodeError`] is **fatal**: the job cannot produce output. Wraps every
//!   stage error plus job-level conditions (cancellation, bad configuration,
//!   unreadable input file). Returned as `Err(RecodeError)` from the top-level
//!   `convert*` functions and from [`crate::ConversionPipeline::run`].
//!
//! * [`PageError`] is **non-fatal**: a single page failed under the
//!   [`crate::config::ErrorPolicy::SkipPage`] policy. Stored inside
//!   [`crate::output::ConversionOutput`] so callers can see which pages are
//!   missing from the result.
//!
//! Every fatal error maps to an [`ErrorKind`] via [`RecodeError::kind`], so a
//! host UI can show a human-readable message next to a stable category.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The input buffer could not be opened as a PDF document.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No `%PDF-` marker near the start of the buffer (empty or truncated input).
    #[error("Input is not a PDF document (first bytes: {magic:?})")]
    NotAPdf { magic: [u8; 4] },

    /// Header, xref table or trailer is damaged beyond recovery.
    #[error("PDF is corrupt: {detail}")]
    Corrupt { detail: String },

    /// The document is encrypted and no password was supplied.
    #[error("PDF is encrypted and requires a password")]
    PasswordRequired,

    /// A password was supplied but the document rejected it.
    #[error("Wrong password for encrypted PDF")]
    WrongPassword,
}

/// A single page could not be rasterised. `page` is 1-indexed.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    #[error("Invalid render scale {scale}: must be finite and greater than zero")]
    InvalidScale { scale: f32 },

    /// The requested pixel surface exceeds the configured edge limit or
    /// could not be allocated.
    #[error("Page {page}: raster surface {width}x{height} px cannot be allocated (limit {limit} px per edge)")]
    SurfaceTooLarge {
        page: usize,
        width: u32,
        height: u32,
        limit: u32,
    },

    /// The page content stream is missing, undecodable or unparseable.
    #[error("Page {page}: content stream is corrupt: {detail}")]
    CorruptContent { page: usize, detail: String },

    /// The rendering backend reported a failure.
    #[error("Page {page}: rasterisation failed: {detail}")]
    Backend { page: usize, detail: String },
}

impl RenderError {
    /// 1-indexed page the error refers to, when there is one.
    pub fn page(&self) -> Option<usize> {
        match self {
            RenderError::PageOutOfRange { page, .. }
            | RenderError::SurfaceTooLarge { page, .. }
            | RenderError::CorruptContent { page, .. }
            | RenderError::Backend { page, .. } => Some(*page),
            RenderError::InvalidScale { .. } => None,
        }
    }
}

/// A rendered page could not be compressed to JPEG. `page` is 1-indexed.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Baseline JPEG is limited to 65 535 px per edge.
    #[error("Page {page}: {width}x{height} px exceeds the JPEG size limit")]
    TooLarge { page: usize, width: u32, height: u32 },

    #[error("Page {page}: JPEG encoding failed: {detail}")]
    Jpeg { page: usize, detail: String },
}

/// The page assembler was handed invalid input. Always an internal contract
/// violation, so always fatal.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Invalid page dimensions {width}x{height} pt: both must be finite and positive")]
    InvalidDimensions { width: f32, height: f32 },

    #[error("Page image is not a valid JPEG: {detail}")]
    InvalidImage { detail: String },

    #[error("Failed to serialise output PDF: {detail}")]
    Serialize { detail: String },
}

/// ZIP construction failed. Fatal to the archive action only.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Duplicate archive entry '{name}'")]
    DuplicateEntry { name: String },

    #[error("Invalid archive entry name '{name}': entries are stored flat")]
    InvalidName { name: String },

    #[error("Failed to write archive: {0}")]
    Write(#[from] zip::result::ZipError),

    #[error("Failed to write archive: {0}")]
    Io(#[from] std::io::Error),
}

/// All fatal errors returned by the pdf-recode library.
///
/// Page-level failures under the skip policy use [`PageError`] and are
/// stored in [`crate::output::ConversionOutput`] rather than propagated here.
#[derive(Debug, Error)]
pub enum RecodeError {
    // ── Stage errors ──────────────────────────────────────────────────────
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    // ── Job errors ────────────────────────────────────────────────────────
    /// The cancellation token fired at a page boundary.
    #[error("Conversion cancelled after {completed_pages} of {total_pages} pages")]
    Cancelled {
        completed_pages: usize,
        total_pages: usize,
    },

    /// Every page failed under the skip policy; there is nothing to return.
    #[error("All {total} pages failed.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    // ── Input / output errors ─────────────────────────────────────────────
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The requested rendering backend cannot be used on this machine.
    #[error(
        "Rendering backend unavailable: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library next to the binary,\n\
or use --backend native for the built-in renderer.\n"
    )]
    BackendUnavailable(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (task panic, illegal job state transition).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable category of a [`RecodeError`], for callers that branch on the
/// failure class rather than the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Decode,
    Render,
    Encode,
    Assembly,
    Archive,
    Cancelled,
    Config,
    Io,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Decode => "DecodeError",
            ErrorKind::Render => "RenderError",
            ErrorKind::Encode => "EncodeError",
            ErrorKind::Assembly => "AssemblyError",
            ErrorKind::Archive => "ArchiveError",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Io => "IoError",
            ErrorKind::Internal => "InternalError",
        };
        f.write_str(name)
    }
}

impl RecodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecodeError::Decode(_) => ErrorKind::Decode,
            RecodeError::Render(_) | RecodeError::AllPagesFailed { .. } => ErrorKind::Render,
            RecodeError::Encode(_) => ErrorKind::Encode,
            RecodeError::Assembly(_) => ErrorKind::Assembly,
            RecodeError::Archive(_) => ErrorKind::Archive,
            RecodeError::Cancelled { .. } => ErrorKind::Cancelled,
            RecodeError::InvalidConfig(_) | RecodeError::BackendUnavailable(_) => {
                ErrorKind::Config
            }
            RecodeError::FileNotFound { .. }
            | RecodeError::PermissionDenied { .. }
            | RecodeError::ReadFailed { .. }
            | RecodeError::OutputWriteFailed { .. } => ErrorKind::Io,
            RecodeError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RecodeError::Cancelled { .. })
    }
}

/// A non-fatal error for a single page.
///
/// Only produced under [`crate::config::ErrorPolicy::SkipPage`]; the page is
/// left out of the output and the job continues.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum PageError {
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    #[error("Page {page}: JPEG encoding failed: {detail}")]
    EncodeFailed { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page number.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. } | PageError::EncodeFailed { page, .. } => *page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_are_transparent() {
        let e: RecodeError = DecodeError::PasswordRequired.into();
        assert_eq!(e.kind(), ErrorKind::Decode);
        assert!(e.to_string().contains("password"), "got: {e}");
    }

    #[test]
    fn not_a_pdf_display_shows_magic() {
        let e = DecodeError::NotAPdf {
            magic: *b"%PD\0",
        };
        assert!(e.to_string().contains("not a PDF"));
    }

    #[test]
    fn render_error_page_number() {
        let e = RenderError::CorruptContent {
            page: 3,
            detail: "missing object".into(),
        };
        assert_eq!(e.page(), Some(3));
        assert!(e.to_string().contains("Page 3"));
        assert_eq!(RenderError::InvalidScale { scale: 0.0 }.page(), None);
    }

    #[test]
    fn kinds_cover_job_errors() {
        let cancelled = RecodeError::Cancelled {
            completed_pages: 1,
            total_pages: 3,
        };
        assert_eq!(cancelled.kind(), ErrorKind::Cancelled);
        assert!(cancelled.is_cancelled());
        assert!(cancelled.to_string().contains("1 of 3"));

        let cfg = RecodeError::InvalidConfig("bad".into());
        assert_eq!(cfg.kind(), ErrorKind::Config);

        let all = RecodeError::AllPagesFailed {
            total: 2,
            first_error: "boom".into(),
        };
        assert_eq!(all.kind(), ErrorKind::Render);
        assert!(all.to_string().contains("boom"));

        let read = RecodeError::ReadFailed {
            path: "in.pdf".into(),
            source: std::io::Error::other("EIO"),
        };
        assert_eq!(read.kind(), ErrorKind::Io);
        assert!(std::error::Error::source(&read).is_some());
    }

    #[test]
    fn kind_display_names() {
        assert_eq!(ErrorKind::Decode.to_string(), "DecodeError");
        assert_eq!(ErrorKind::Assembly.to_string(), "AssemblyError");
        assert_eq!(ErrorKind::Archive.to_string(), "ArchiveError");
    }

    #[test]
    fn page_error_serialises() {
        let e = PageError::RenderFailed {
            page: 4,
            detail: "bad stream".into(),
        };
        assert_eq!(e.page(), 4);
        let json = serde_json::to_string(&e).expect("serialise");
        assert!(json.contains("RenderFailed"));
    }
}
