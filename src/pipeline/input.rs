//! Input handling: read a local PDF into memory and derive output names.
//!
//! The pipeline works on byte buffers. This module is the file-picker side
//! of it: it turns a path into bytes with clear errors for missing or
//! unreadable files, and sniffs the header before any parser runs.

use crate::error::RecodeError;
use crate::pipeline::decode::check_pdf_header;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Read a local PDF file.
pub async fn read_pdf(path: &Path) -> Result<Vec<u8>, RecodeError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => RecodeError::FileNotFound {
            path: path.to_path_buf(),
        },
        ErrorKind::PermissionDenied => RecodeError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => RecodeError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    check_pdf_header(&bytes)?;
    debug!("Read PDF {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes)
}

/// Output base name for `path`: the file name without a trailing `.pdf`
/// (any case). Falls back to `"document"` when nothing is left.
pub fn base_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = match name.len().checked_sub(4) {
        Some(cut) if name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(".pdf") => {
            &name[..cut]
        }
        _ => name.as_str(),
    };
    if stem.is_empty() {
        "document".to_string()
    } else {
        stem.to_string()
    }
}
