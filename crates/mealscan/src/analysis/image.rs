//! Meal photos loaded from disk, ready to send to a vision model.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::debug;

use crate::error::{Error, Result};

/// A photo ready to be sent for analysis.
#[derive(Clone, PartialEq, Eq)]
pub struct MealImage {
    /// Where the photo was read from.
    pub path: PathBuf,
    /// MIME type, detected from the file contents or extension.
    pub mime_type: &'static str,
    /// Raw file contents.
    pub bytes: Vec<u8>,
    /// BLAKE3 hash of `bytes`, hex encoded.
    pub hash: String,
}

impl std::fmt::Debug for MealImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MealImage")
            .field("path", &self.path)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .field("hash", &self.hash)
            .finish()
    }
}

impl MealImage {
    /// Read a photo from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is empty, is larger
    /// than `max_bytes`, or is not a JPEG, PNG, GIF or WebP image.
    pub fn load(path: impl AsRef<Path>, max_bytes: u64) -> Result<Self> {
        let path = path.as_ref();
        let len = std::fs::metadata(path)?.len();
        if len > max_bytes {
            return Err(Error::UnsupportedImage {
                path: path.to_path_buf(),
                message: format!("{len} bytes exceeds the {max_bytes} byte limit"),
            });
        }
        let bytes = std::fs::read(path)?;
        Self::from_bytes(path, bytes)
    }

    /// Wrap photo bytes that are already in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is empty or not a supported image type.
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Result<Self> {
        let path = path.into();
        if bytes.is_empty() {
            return Err(Error::UnsupportedImage {
                path,
                message: "file is empty".to_string(),
            });
        }
        let Some(mime_type) = sniff_mime(&bytes).or_else(|| mime_from_extension(&path)) else {
            return Err(Error::UnsupportedImage {
                path,
                message: "expected a JPEG, PNG, GIF or WebP image".to_string(),
            });
        };
        let hash = blake3::hash(&bytes).to_hex().to_string();
        debug!(
            "Loaded {} ({}, {} bytes, hash {})",
            path.display(),
            mime_type,
            bytes.len(),
            &hash[..16]
        );
        Ok(Self {
            path,
            mime_type,
            bytes,
            hash,
        })
    }

    /// The photo as a base64 `data:` URL.
    #[must_use]
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.bytes))
    }

    /// File extension matching the MIME type.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self.mime_type {
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "jpg",
        }
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn test_sniffs_content_over_extension() {
        let image = MealImage::from_bytes("photo.jpg", PNG_HEADER.to_vec()).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.extension(), "png");
    }

    #[test]
    fn test_sniff_each_format() {
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_mime(b"GIF89a...."), Some("image/gif"));
        assert_eq!(sniff_mime(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_mime(b"hello"), None);
    }

    #[test]
    fn test_falls_back_to_extension() {
        let image = MealImage::from_bytes("lunch.JPEG", b"not really".to_vec()).unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
    }

    #[test]
    fn test_rejects_unknown_and_empty() {
        let err = MealImage::from_bytes("notes.txt", b"hello".to_vec()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedImage { .. }));

        let err = MealImage::from_bytes("empty.png", Vec::new()).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_data_url() {
        let image = MealImage::from_bytes("x.png", PNG_HEADER.to_vec()).unwrap();
        let url = image.data_url();
        assert!(url.starts_with("data:image/png;base64,"));
        let encoded = url.trim_start_matches("data:image/png;base64,");
        assert_eq!(BASE64.decode(encoded).unwrap(), PNG_HEADER);
    }

    #[test]
    fn test_hash_is_stable() {
        let a = MealImage::from_bytes("a.png", PNG_HEADER.to_vec()).unwrap();
        let b = MealImage::from_bytes("b.png", PNG_HEADER.to_vec()).unwrap();
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.hash.len(), 64);
    }

    #[test]
    fn test_load_from_disk_with_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meal.png");
        std::fs::write(&path, PNG_HEADER).unwrap();

        let image = MealImage::load(&path, 1024).unwrap();
        assert_eq!(image.path, path);

        let err = MealImage::load(&path, 4).unwrap_err();
        assert!(err.to_string().contains("limit"));

        assert!(MealImage::load(dir.path().join("missing.png"), 1024).is_err());
    }

    #[test]
    fn test_debug_omits_bytes() {
        let image = MealImage::from_bytes("x.png", PNG_HEADER.to_vec()).unwrap();
        let debug_str = format!("{image:?}");
        assert!(debug_str.contains("len"));
        assert!(!debug_str.contains("IHDR"));
    }
}
