//! ZIP packaging for page images.
//!
//! Entries are stored, not deflated: JPEG data does not shrink further and
//! storing keeps packing fast. The archive is flat, so entry names may not
//! contain path separators.

use crate::error::ArchiveError;
use crate::output::EncodedImage;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Download name for the images archive: `{base}_images.zip`.
pub fn archive_file_name(base: &str) -> String {
    format!("{}_images.zip", base)
}

/// Collects named entries and writes them as a ZIP archive.
#[derive(Debug, Default)]
pub struct ArchiveBuilder {
    entries: Vec<(String, Vec<u8>)>,
    names: HashSet<String>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an entry. Names must be unique, non-empty and flat.
    pub fn add(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Result<Self, ArchiveError> {
        let name = name.into();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(ArchiveError::InvalidName { name });
        }
        if !self.names.insert(name.clone()) {
            return Err(ArchiveError::DuplicateEntry { name });
        }
        self.entries.push((name, bytes.into()));
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the archive in insertion order.
    pub fn build(self) -> Result<Vec<u8>, ArchiveError> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .large_file(self.entries.iter().any(|(_, b)| b.len() as u64 >= u32::MAX as u64));
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        for (name, bytes) in &self.entries {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(bytes)?;
        }
        let bytes = zip.finish()?.into_inner();
        debug!("Built archive: {} entries, {} bytes", self.entries.len(), bytes.len());
        Ok(bytes)
    }
}

/// Build an archive from `(name, bytes)` pairs.
pub fn build_archive<N, B>(entries: impl IntoIterator<Item = (N, B)>) -> Result<Vec<u8>, ArchiveError>
where
    N: Into<String>,
    B: Into<Vec<u8>>,
{
    entries
        .into_iter()
        .try_fold(ArchiveBuilder::new(), |builder, (name, bytes)| builder.add(name, bytes))?
        .build()
}

/// Pack page images as `{base}_{page}.jpg` entries.
pub fn images_archive(images: &[EncodedImage], base: &str) -> Result<Vec<u8>, ArchiveError> {
    build_archive(images.iter().map(|img| (img.file_name(base), img.bytes.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityFactor;
    use std::io::Read;
    use zip::ZipArchive;

    fn read_back(bytes: Vec<u8>) -> Vec<(String, Vec<u8>, CompressionMethod)> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("valid zip");
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut data = Vec::new();
                file.read_to_end(&mut data).unwrap();
                (file.name().to_string(), data, file.compression())
            })
            .collect()
    }

    #[test]
    fn entries_round_trip_in_order() {
        let bytes = ArchiveBuilder::new()
            .add("b.jpg", b"second-first".to_vec())
            .unwrap()
            .add("a.jpg", b"then this".to_vec())
            .unwrap()
            .build()
            .unwrap();

        let entries = read_back(bytes);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "b.jpg");
        assert_eq!(entries[0].1, b"second-first");
        assert_eq!(entries[1].0, "a.jpg");
        assert!(entries.iter().all(|e| e.2 == CompressionMethod::Stored));
    }

    #[test]
    fn empty_archive_is_valid() {
        let entries = read_back(ArchiveBuilder::new().build().unwrap());
        assert!(entries.is_empty());
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = ArchiveBuilder::new()
            .add("page.jpg", vec![1])
            .unwrap()
            .add("page.jpg", vec![2])
            .unwrap_err();
        assert!(matches!(err, ArchiveError::DuplicateEntry { name } if name == "page.jpg"));
    }

    #[test]
    fn nested_or_empty_names_rejected() {
        for name in ["", "dir/page.jpg", "..\\page.jpg"] {
            assert!(
                matches!(
                    ArchiveBuilder::new().add(name, vec![0]),
                    Err(ArchiveError::InvalidName { .. })
                ),
                "accepted {name:?}"
            );
        }
    }

    #[test]
    fn images_archive_uses_page_names() {
        let images: Vec<EncodedImage> = (0..3)
            .map(|i| EncodedImage {
                page_index: i,
                bytes: vec![i as u8; 4],
                quality: QualityFactor::default(),
                pixel_width: 1,
                pixel_height: 1,
            })
            .collect();
        let entries = read_back(images_archive(&images, "scan").unwrap());
        let names: Vec<&str> = entries.iter().map(|e| e.0.as_str()).collect();
        assert_eq!(names, ["scan_1.jpg", "scan_2.jpg", "scan_3.jpg"]);
        assert_eq!(entries[2].1, vec![2u8; 4]);
        assert_eq!(archive_file_name("scan"), "scan_images.zip");
    }
}
