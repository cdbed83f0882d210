//! Dataset assembly: ground-truth construction from YOLO label files,
//! train/validation splitting, and image/label pairing checks.

use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;

use crate::config::ClassTable;
use crate::error::{DatasetError, Result};
use crate::geometry::{NormalizedBox, OrientedBox};
use crate::io;
use crate::types::{AnnotationSet, DetectionRecord, ImageRecord, ProcessingStats};
use crate::utils::{create_output_directory, external_name};

/// Parse one YOLO label line into its class id and normalized box.
///
/// Accepts the 4-coordinate center-form convention and the 8-coordinate
/// oriented-vertex convention; the latter is reduced to its enclosing box.
pub fn parse_label_line(line: &str) -> Result<(u32, NormalizedBox)> {
    let mut parts = line.split_whitespace();
    let class_id: u32 = parts
        .next()
        .ok_or_else(|| DatasetError::InvalidShape("empty label line".to_string()))?
        .parse()
        .map_err(|_| DatasetError::InvalidShape(format!("bad class id in '{}'", line)))?;

    let coords: Vec<f64> = parts
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| DatasetError::InvalidShape(format!("bad coordinate in '{}'", line)))?;

    match coords.as_slice() {
        [x_center, y_center, width, height] => Ok((
            class_id,
            NormalizedBox {
                x_center: *x_center,
                y_center: *y_center,
                width: *width,
                height: *height,
            },
        )),
        [x1, y1, x2, y2, x3, y3, x4, y4] => {
            let quad =
                OrientedBox::from_points(&[(*x1, *y1), (*x2, *y2), (*x3, *y3), (*x4, *y4)])?;
            let aabb = quad.enclosing();
            Ok((
                class_id,
                NormalizedBox {
                    x_center: aabb.x + aabb.width / 2.0,
                    y_center: aabb.y + aabb.height / 2.0,
                    width: aabb.width,
                    height: aabb.height,
                },
            ))
        }
        other => Err(DatasetError::InvalidShape(format!(
            "label line has {} coordinates",
            other.len()
        ))),
    }
}

/// Build a ground-truth annotation set from a directory of images and their
/// YOLO label files.
///
/// Images are taken in name order and assigned ids dense from 1. An image
/// without a label file is kept (and counted); an unreadable or zero-sized
/// image fails individually without aborting the batch. An empty image
/// directory is fatal.
pub fn build_ground_truth(
    image_dir: &Path,
    label_dir: &Path,
    classes: &ClassTable,
) -> Result<(AnnotationSet, ProcessingStats)> {
    let image_files = io::find_image_files(image_dir)?;
    if image_files.is_empty() {
        return Err(DatasetError::EmptyInput(image_dir.display().to_string()));
    }

    let mut set = AnnotationSet::default();
    let mut stats = ProcessingStats::new();
    let mut seen_classes: BTreeSet<u32> = BTreeSet::new();
    let mut next_id: u32 = 1;

    for path in &image_files {
        stats.total += 1;

        let (width, height) = match image::image_dimensions(path) {
            Ok(dims) => dims,
            Err(e) => {
                warn!("Failed to read image size for {}: {}", path.display(), e);
                stats.invalid_images += 1;
                continue;
            }
        };
        if width == 0 || height == 0 {
            warn!("Zero-sized image {}", path.display());
            stats.invalid_images += 1;
            continue;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = external_name(path);
        let image_id = next_id;
        next_id += 1;
        set.images.push(ImageRecord {
            id: image_id,
            external_name: stem.clone(),
            file_name,
            width,
            height,
        });

        let label_path = label_dir.join(&stem).with_extension("txt");
        if !label_path.exists() {
            warn!("No label file for image '{}'", stem);
            stats.missing_pairs += 1;
            continue;
        }

        let content = fs::read_to_string(&label_path)?;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_label_line(line) {
                Ok((class_id, norm)) => {
                    seen_classes.insert(class_id);
                    set.records.push(DetectionRecord {
                        image_id,
                        class_id,
                        bbox: norm.to_pixel(width, height),
                        score: None,
                    });
                }
                Err(e) => {
                    warn!("Skipping label line in {}: {}", label_path.display(), e);
                    stats.failed += 1;
                }
            }
        }
        stats.converted += 1;
    }

    set.categories = seen_classes
        .into_iter()
        .map(|id| {
            let name = classes
                .name_of(id)
                .map(str::to_string)
                .unwrap_or_else(|| format!("class_{}", id));
            (id, name)
        })
        .collect();

    Ok((set, stats))
}

/// Outcome of a train/validation split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSummary {
    pub train: usize,
    pub val: usize,
}

/// Split paired image/label files into `train/` and `val/` trees under the
/// output directory. Only stems present in both directories take part; the
/// shuffle is seeded so a split is reproducible.
pub fn split_dataset(
    image_dir: &Path,
    label_dir: &Path,
    output_dir: &Path,
    val_size: f32,
    seed: u64,
) -> Result<SplitSummary> {
    let image_stems: HashSet<String> = io::find_image_files(image_dir)?
        .iter()
        .map(|p| external_name(p))
        .collect();
    let label_stems: HashSet<String> = io::find_label_files(label_dir)?
        .iter()
        .map(|p| external_name(p))
        .collect();

    let mut matched: Vec<String> = image_stems.intersection(&label_stems).cloned().collect();
    if matched.is_empty() {
        return Err(DatasetError::EmptyInput(format!(
            "{} and {} share no paired files",
            image_dir.display(),
            label_dir.display()
        )));
    }
    matched.sort();

    let unmatched = image_stems.len() + label_stems.len() - 2 * matched.len();
    if unmatched > 0 {
        warn!("{} files lack a pair and are excluded from the split", unmatched);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    matched.shuffle(&mut rng);

    let val_count = (matched.len() as f32 * val_size).ceil() as usize;
    let (val_stems, train_stems) = matched.split_at(val_count);

    let train_images = create_output_directory(&output_dir.join("train/images"))?;
    let train_labels = create_output_directory(&output_dir.join("train/labels"))?;
    let val_images = create_output_directory(&output_dir.join("val/images"))?;
    let val_labels = create_output_directory(&output_dir.join("val/labels"))?;

    copy_pairs(train_stems, image_dir, label_dir, &train_images, &train_labels)?;
    copy_pairs(val_stems, image_dir, label_dir, &val_images, &val_labels)?;

    info!(
        "Split complete: {} train, {} val",
        train_stems.len(),
        val_stems.len()
    );
    Ok(SplitSummary {
        train: train_stems.len(),
        val: val_stems.len(),
    })
}

fn copy_pairs(
    stems: &[String],
    image_dir: &Path,
    label_dir: &Path,
    images_out: &Path,
    labels_out: &Path,
) -> Result<()> {
    for stem in stems {
        let Some(image_src) = io::paired_image(image_dir, stem) else {
            warn!("Image for '{}' disappeared during the split", stem);
            continue;
        };
        let ext = image_src.extension().unwrap_or_default();
        fs::copy(&image_src, images_out.join(stem).with_extension(ext))?;

        let label_name = Path::new(stem).with_extension("txt");
        fs::copy(label_dir.join(&label_name), labels_out.join(&label_name))?;
    }
    Ok(())
}

/// Result of a pairing/integrity check over an image and a label directory.
#[derive(Debug, Default, Clone)]
pub struct IntegrityReport {
    /// Image stems without a label file.
    pub missing_labels: Vec<String>,
    /// Label stems without an image file.
    pub missing_images: Vec<String>,
    /// Images that failed to decode.
    pub undecodable: Vec<String>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.missing_labels.is_empty()
            && self.missing_images.is_empty()
            && self.undecodable.is_empty()
    }

    pub fn print_summary(&self) {
        if self.is_clean() {
            info!("Image/label pairing and image integrity are clean.");
            return;
        }
        for name in &self.missing_labels {
            warn!("Image without a label file: {}", name);
        }
        for name in &self.missing_images {
            warn!("Label without an image file: {}", name);
        }
        for name in &self.undecodable {
            warn!("Image failed to decode: {}", name);
        }
        warn!(
            "Integrity check: {} missing labels, {} missing images, {} undecodable images",
            self.missing_labels.len(),
            self.missing_images.len(),
            self.undecodable.len()
        );
    }
}

/// Check that every image has a label file and vice versa, and that every
/// image decodes fully. Reports problems; never aborts.
pub fn check_integrity(image_dir: &Path, label_dir: &Path) -> Result<IntegrityReport> {
    let image_files = io::find_image_files(image_dir)?;
    let image_stems: BTreeSet<String> = image_files.iter().map(|p| external_name(p)).collect();
    let label_stems: BTreeSet<String> = io::find_label_files(label_dir)?
        .iter()
        .map(|p| external_name(p))
        .collect();

    let missing_labels = image_stems.difference(&label_stems).cloned().collect();
    let missing_images = label_stems.difference(&image_stems).cloned().collect();

    let mut undecodable: Vec<String> = image_files
        .par_iter()
        .filter_map(|path| {
            image::open(path)
                .err()
                .map(|_| path.display().to_string())
        })
        .collect();
    undecodable.sort();

    Ok(IntegrityReport {
        missing_labels,
        missing_images,
        undecodable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_center_form_line() {
        let (class_id, norm) = parse_label_line("0 0.250000 0.250000 0.500000 0.500000").unwrap();
        assert_eq!(class_id, 0);
        assert!((norm.x_center - 0.25).abs() < 1e-9);
        assert!((norm.width - 0.5).abs() < 1e-9);

        let bbox = norm.to_pixel(200, 100);
        assert!((bbox.x - 0.0).abs() < 1e-9);
        assert!((bbox.width - 100.0).abs() < 1e-9);
        assert!((bbox.height - 50.0).abs() < 1e-9);
    }

    #[test]
    fn parse_oriented_line_reduces_to_enclosing_box() {
        let (class_id, norm) =
            parse_label_line("1 0.1 0.1 0.5 0.1 0.5 0.3 0.1 0.3").unwrap();
        assert_eq!(class_id, 1);
        assert!((norm.x_center - 0.3).abs() < 1e-9);
        assert!((norm.y_center - 0.2).abs() < 1e-9);
        assert!((norm.width - 0.4).abs() < 1e-9);
        assert!((norm.height - 0.2).abs() < 1e-9);
    }

    #[test]
    fn parse_rejects_other_coordinate_counts() {
        assert!(parse_label_line("0 0.1 0.2 0.3").is_err());
        assert!(parse_label_line("0").is_err());
        assert!(parse_label_line("x 0.1 0.2 0.3 0.4").is_err());
    }
}
