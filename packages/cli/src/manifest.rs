//! Batch manifest loading.
//!
//! A manifest is a JSON array of `{"path": ..., "lat": ..., "lng": ...}`
//! objects. Relative image paths are resolved against the manifest's
//! directory.

use std::path::{Path, PathBuf};

use roadwatch_image::{DEFAULT_MIME_TYPE, DecodedImage, mime_for_extension};
use roadwatch_pipeline::detection::BatchItem;
use serde::Deserialize;
use thiserror::Error;

/// Errors loading a manifest or one of its images.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// A file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// The file that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The manifest is not valid JSON of the expected shape.
    #[error("Invalid manifest: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    path: PathBuf,
    lat: Option<f64>,
    lng: Option<f64>,
}

/// Reads an image file, taking the MIME type from its extension.
///
/// # Errors
///
/// Returns [`ManifestError::Read`] if the file cannot be read.
pub fn load_image(path: &Path) -> Result<DecodedImage, ManifestError> {
    let bytes = std::fs::read(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mime_type = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(mime_for_extension)
        .unwrap_or(DEFAULT_MIME_TYPE);

    Ok(DecodedImage::from_bytes(bytes, mime_type))
}

/// Loads every image a manifest lists, in order.
///
/// Missing coordinates are passed through so the pipeline reports them per
/// item; an unreadable image fails the whole load.
///
/// # Errors
///
/// Returns [`ManifestError`] if the manifest or any image cannot be read.
pub fn load(manifest: &Path) -> Result<Vec<BatchItem>, ManifestError> {
    let text = std::fs::read_to_string(manifest).map_err(|source| ManifestError::Read {
        path: manifest.to_path_buf(),
        source,
    })?;
    let entries: Vec<ManifestEntry> = serde_json::from_str(&text)?;
    let base = manifest.parent().unwrap_or_else(|| Path::new("."));

    entries
        .into_iter()
        .map(|entry| {
            let image = load_image(&base.join(&entry.path))?;
            Ok(BatchItem {
                image: Some(image.to_data_url()),
                lat: entry.lat,
                lng: entry.lng,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "roadwatch_cli_manifest_{}_{name}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn loads_entries_relative_to_manifest() {
        let dir = scratch_dir("relative");
        std::fs::write(dir.join("a.png"), b"hello").unwrap();
        std::fs::write(dir.join("b.JPG"), b"hello").unwrap();
        std::fs::write(
            dir.join("drive.json"),
            r#"[
                {"path": "a.png", "lat": 22.7196, "lng": 75.8577},
                {"path": "b.JPG", "lat": 22.72}
            ]"#,
        )
        .unwrap();

        let items = load(&dir.join("drive.json")).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].image.as_deref(),
            Some("data:image/png;base64,aGVsbG8=")
        );
        assert_eq!(
            items[1].image.as_deref(),
            Some("data:image/jpeg;base64,aGVsbG8=")
        );
        assert_eq!(items[1].lng, None);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_image_fails_load() {
        let dir = scratch_dir("missing");
        std::fs::write(
            dir.join("drive.json"),
            r#"[{"path": "nope.png", "lat": 1.0, "lng": 2.0}]"#,
        )
        .unwrap();

        let err = load(&dir.join("drive.json")).unwrap_err();
        assert!(matches!(err, ManifestError::Read { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
