use glob::glob;
use log::error;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::{DatasetError, Result};
use crate::types::ImageAnnotation;

// Image extensions probed when locating the image paired with a label or
// annotation file, in lookup order
pub const IMG_EXTENSIONS: &[&str] = &["jpg", "png", "jpeg"];

/// Collect all annotation JSON files under a directory, recursively.
pub fn find_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/**/*.json", dir.display());
    let mut files: Vec<PathBuf> = glob(&pattern)?.filter_map(|entry| entry.ok()).collect();
    files.sort();
    Ok(files)
}

/// Collect all YOLO label files in a directory, sorted by name.
pub fn find_label_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*.txt", dir.display());
    let mut files: Vec<PathBuf> = glob(&pattern)?.filter_map(|entry| entry.ok()).collect();
    files.sort();
    Ok(files)
}

/// Collect all image files in a directory, sorted by name so ingestion-time
/// id assignment is deterministic.
pub fn find_image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for ext in IMG_EXTENSIONS {
        let pattern = format!("{}/*.{}", dir.display(), ext);
        files.extend(glob(&pattern)?.filter_map(|entry| entry.ok()));
    }
    files.sort();
    Ok(files)
}

/// Locate the image paired with the given stem, trying each known extension.
pub fn paired_image(image_dir: &Path, stem: &str) -> Option<PathBuf> {
    IMG_EXTENSIONS
        .iter()
        .map(|ext| image_dir.join(format!("{}.{}", stem, ext)))
        .find(|candidate| candidate.exists())
}

/// Read and parse a single annotation JSON file, streaming from the file
/// handle instead of loading the document into memory first.
///
/// Parse failures are logged and yield `None`; one malformed document never
/// aborts a batch.
pub fn read_annotation(path: &Path) -> Option<ImageAnnotation> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            error!("Failed to open JSON file ({}): {:?}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_reader(BufReader::new(file)) {
        Ok(annotation) => Some(annotation),
        Err(e) => {
            error!("Failed to parse JSON ({}): {:?}", path.display(), e);
            None
        }
    }
}

/// Read and parse any JSON document into a typed value.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    let value = serde_json::from_reader(BufReader::new(file))?;
    Ok(value)
}

/// Write a file atomically: the content lands in a sibling temporary file
/// first and is renamed into place, so a crash mid-run never leaves a
/// truncated label or JSON file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = match dir {
        Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
        None => tempfile::NamedTempFile::new_in(".")?,
    };
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| DatasetError::Io(e.error))?;
    Ok(())
}

/// Serialize a value to pretty-printed JSON and write it atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes)
}
