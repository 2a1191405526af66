//! Local image storage and JSON export/import.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::PLACEHOLDER_IMAGE;
use crate::error::FileError;

/// Product images saved on this device, stored under a single directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    /// Open (and create) the image directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, FileError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write image bytes under a fresh unique name, keeping the extension
    /// of `file_name`. Returns the stored path.
    pub fn save_image(&self, bytes: &[u8], file_name: &str) -> Result<PathBuf, FileError> {
        let unique = match Path::new(file_name).extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
            None => Uuid::new_v4().to_string(),
        };
        let path = self.dir.join(unique);
        fs::write(&path, bytes)?;
        debug!(path = %path.display(), size = bytes.len(), "Image saved");
        Ok(path)
    }

    /// Delete an image file. Returns `false` when nothing was deleted.
    pub fn delete_image(&self, path: &Path) -> bool {
        if !path.is_file() {
            return false;
        }
        match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to delete image {}: {e}", path.display());
                false
            }
        }
    }

    /// True when the locator points at a file in this store.
    pub fn contains(&self, locator: &str) -> bool {
        let path = Path::new(locator);
        path.starts_with(&self.dir) && path.is_file()
    }

    pub fn exists(locator: &str) -> bool {
        !locator.is_empty() && Path::new(locator).is_file()
    }

    /// Locator to display: the image itself when it exists on disk or is
    /// remote, otherwise the placeholder.
    pub fn resolve_image(locator: &str) -> &str {
        if locator.starts_with("http://") || locator.starts_with("https://") || Self::exists(locator) {
            locator
        } else {
            PLACEHOLDER_IMAGE
        }
    }
}

/// Write `records` as indented JSON to `dir/file_name`.
pub fn export_json<T: Serialize>(
    dir: &Path,
    records: &[T],
    file_name: &str,
) -> Result<PathBuf, FileError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    let json = serde_json::to_string_pretty(records)?;
    fs::write(&path, json)?;
    debug!(path = %path.display(), count = records.len(), "Exported records");
    Ok(path)
}

/// Read a JSON array written by [`export_json`]. A missing file yields
/// `Ok(None)`.
pub fn import_json<T: DeserializeOwned>(path: &Path) -> Result<Option<Vec<T>>, FileError> {
    if !path.is_file() {
        return Ok(None);
    }
    let json = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&json)?))
}
