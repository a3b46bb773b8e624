//! On-disk storage for uploaded vehicle images
//!
//! Files live under `<data dir>/vehicle_images/<vehicle id>/<image id>.<ext>` and are
//! served by the web API under [`IMAGE_URL_PREFIX`].

use crate::error::{PersistenceError, Result};
use std::path::{Path, PathBuf};

/// URL path the web server mounts the image directory on
pub const IMAGE_URL_PREFIX: &str = "/images";

/// A file written by [`ImageStore::save`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Path relative to the store root
    pub path: String,
    /// Public URL of the file
    pub url: String,
}

/// Directory holding uploaded images
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    /// Create an image store next to the database file's directory
    pub fn new(data_dir: &Path) -> Self {
        let root = data_dir.join("vehicle_images");

        if let Err(e) = std::fs::create_dir_all(&root) {
            log::warn!("Failed to create image directory: {}", e);
        } else {
            log::info!("Image directory: {:?}", root);
        }

        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write image bytes for a vehicle under the given image id
    pub fn save(
        &self,
        vehicle_id: &str,
        image_id: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<StoredImage> {
        if !is_safe_segment(vehicle_id) || !is_safe_segment(image_id) {
            return Err(PersistenceError::Backend(format!(
                "Refusing to store image under unsafe id: {}/{}",
                vehicle_id, image_id
            ))
            .into());
        }

        let relative = format!("{}/{}.{}", vehicle_id, image_id, extension_of(file_name));
        let path = self.full_path(&relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        log::debug!("Stored image {} ({} bytes)", relative, bytes.len());

        Ok(StoredImage {
            url: format!("{}/{}", IMAGE_URL_PREFIX, relative),
            path: relative,
        })
    }

    pub fn contains(&self, relative: &str) -> bool {
        self.full_path(relative).exists()
    }

    /// Delete a stored image; a missing file is only logged
    pub fn remove(&self, relative: &str) {
        if let Err(e) = std::fs::remove_file(self.full_path(relative)) {
            log::warn!("Failed to remove image {}: {}", relative, e);
        } else {
            log::debug!("Removed image {}", relative);
        }
    }
}

/// Whether a vehicle image URL points at an uploaded file rather than an external host
pub fn is_uploaded_url(url: &str) -> bool {
    url.strip_prefix(IMAGE_URL_PREFIX)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Path segments may only contain ASCII alphanumerics, '-' and '_'
fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Lowercase file extension, defaulting to "jpg"
fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "jpg".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_and_read_image() {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::new(temp_dir.path());
        let test_data = vec![0xFF, 0xD8, 0xFF]; // JPEG magic bytes

        let stored = store.save("car-1", "img-1", "front.JPG", &test_data).unwrap();

        assert_eq!(stored.path, "car-1/img-1.jpg");
        assert_eq!(stored.url, "/images/car-1/img-1.jpg");
        assert!(store.contains(&stored.path));
        assert_eq!(std::fs::read(store.root().join(&stored.path)).unwrap(), test_data);
    }

    #[test]
    fn remove_deletes_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::new(temp_dir.path());

        let stored = store.save("car-1", "img-1", "a.png", b"png").unwrap();
        store.remove(&stored.path);

        assert!(!store.contains(&stored.path));
        // Removing twice only logs
        store.remove(&stored.path);
    }

    #[test]
    fn unsafe_ids_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::new(temp_dir.path());

        assert!(store.save("../etc", "img", "a.jpg", b"x").is_err());
        assert!(store.save("car", "a/b", "a.jpg", b"x").is_err());
        assert!(store.save("", "img", "a.jpg", b"x").is_err());
    }

    #[test]
    fn uploaded_urls_are_recognized() {
        assert!(is_uploaded_url("/images/car-1/img-1.jpg"));
        assert!(!is_uploaded_url("https://images.pexels.com/photos/1.jpeg"));
        assert!(!is_uploaded_url("/imagesfoo/a.jpg"));
    }

    #[test]
    fn extension_defaults_to_jpg() {
        assert_eq!(extension_of("photo"), "jpg");
        assert_eq!(extension_of("photo.WebP"), "webp");
        assert_eq!(extension_of("photo.tar.gz"), "gz");
        assert_eq!(extension_of("photo.verylongext"), "jpg");
    }
}
