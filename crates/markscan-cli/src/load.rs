//! File-level input checks run before any bytes reach the decoder.

use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

/// Extensions accepted for form images (compared case-insensitively).
pub const ALLOWED_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "gif", "bmp", "tiff", "tif", "webp"];

/// Largest accepted image file.
pub const MAX_IMAGE_BYTES: u64 = 16 * 1024 * 1024;

/// Problems with an input file, reported before decoding.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Nothing exists at the given path.
    #[error("no such file: {}", .0.display())]
    Missing(PathBuf),

    /// The file name does not end in an accepted image extension.
    #[error(
        "unsupported file type for {}: expected one of {}",
        .path.display(),
        ALLOWED_EXTENSIONS.join(", ")
    )]
    UnsupportedExtension {
        /// Offending path.
        path: PathBuf,
    },

    /// The file exceeds [`MAX_IMAGE_BYTES`].
    #[error("{} is {size} bytes; the limit is {MAX_IMAGE_BYTES}", .path.display())]
    TooLarge {
        /// Offending path.
        path: PathBuf,
        /// Actual size in bytes.
        size: u64,
    },

    /// The file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A JSON settings file did not parse.
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        /// Path being parsed.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Whether `path` carries an accepted image extension.
#[must_use]
pub fn has_allowed_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

/// Validate and read an image file.
///
/// # Errors
///
/// Returns a [`LoadError`] if the extension is not accepted, the file is
/// missing or too large, or reading fails.
pub fn read_image(path: &Path) -> Result<Vec<u8>, LoadError> {
    if !has_allowed_extension(path) {
        return Err(LoadError::UnsupportedExtension {
            path: path.to_path_buf(),
        });
    }

    let metadata = std::fs::metadata(path).map_err(|source| read_error(path, source))?;
    if metadata.len() > MAX_IMAGE_BYTES {
        return Err(LoadError::TooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
        });
    }

    let bytes = std::fs::read(path).map_err(|source| read_error(path, source))?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "image loaded");
    Ok(bytes)
}

/// Read and parse a JSON settings file (scan configuration or menu).
///
/// # Errors
///
/// Returns a [`LoadError`] if the file is missing, unreadable, or not
/// valid JSON for `T`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| read_error(path, source))?;
    serde_json::from_str(&text).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn read_error(path: &Path, source: io::Error) -> LoadError {
    if source.kind() == io::ErrorKind::NotFound {
        LoadError::Missing(path.to_path_buf())
    } else {
        LoadError::Read {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn extensions_match_case_insensitively() {
        assert!(has_allowed_extension(Path::new("form.PNG")));
        assert!(has_allowed_extension(Path::new("scans/form.Jpeg")));
        assert!(has_allowed_extension(Path::new("form.tif")));
        assert!(!has_allowed_extension(Path::new("form.pdf")));
        assert!(!has_allowed_extension(Path::new("form")));
        assert!(!has_allowed_extension(Path::new(".png")));
    }

    #[test]
    fn unsupported_extension_is_rejected_before_touching_disk() {
        let err = read_image(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(
            matches!(err, LoadError::UnsupportedExtension { .. }),
            "got {err:?}"
        );
    }

    #[test]
    fn missing_file_is_reported_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_image(&dir.path().join("absent.png")).unwrap_err();
        assert!(matches!(err, LoadError::Missing(_)), "got {err:?}");
    }

    #[test]
    fn oversized_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.png");
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(MAX_IMAGE_BYTES + 1).unwrap();

        let err = read_image(&path).unwrap_err();
        match err {
            LoadError::TooLarge { size, .. } => assert_eq!(size, MAX_IMAGE_BYTES + 1),
            other => unreachable!("expected TooLarge, got {other:?}"),
        }
    }

    #[test]
    fn small_file_is_read_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("form.webp");
        std::fs::write(&path, b"bytes").unwrap();
        assert_eq!(read_image(&path).unwrap(), b"bytes");
    }

    #[test]
    fn json_settings_parse_into_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = markscan_pipeline::ScanConfig::default();
        config.column_tolerance = 42;
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        let loaded: markscan_pipeline::ScanConfig = read_json(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = read_json::<markscan_pipeline::ScanConfig>(&path).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }), "got {err:?}");
    }
}
