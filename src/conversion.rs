use dashmap::DashSet;
use indicatif::ProgressBar;
use log::{error, warn};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{ClassTable, ConvertConfig, LabelFormat};
use crate::error::{DatasetError, Result};
use crate::geometry::{AxisAlignedBox, OrientedBox};
use crate::io;
use crate::raster;
use crate::types::{ImageAnnotation, ProcessingStats, Shape, ShapeKind};
use crate::utils::external_name;

/// Output locations for a conversion run.
pub struct ConvertOutput {
    pub labels_dir: PathBuf,
    pub images_dir: Option<PathBuf>,
}

/// Collect the label vocabulary of a batch, sorted alphabetically so id
/// assignment is deterministic across runs.
pub fn discover_labels(annotations: &[(PathBuf, ImageAnnotation)]) -> ClassTable {
    let labels: DashSet<String> = DashSet::new();
    annotations.par_iter().for_each(|(_, annotation)| {
        for shape in &annotation.shapes {
            if !labels.contains(&shape.label) {
                labels.insert(shape.label.clone());
            }
        }
    });

    let mut names: Vec<String> = labels.into_iter().collect();
    names.sort();
    ClassTable::new(names)
}

/// Process a batch of annotations in parallel
pub fn process_annotations_in_parallel(
    annotations: &[(PathBuf, ImageAnnotation)],
    cfg: &ConvertConfig,
    image_dir: Option<&Path>,
    out: &ConvertOutput,
    pb: &ProgressBar,
) -> ProcessingStats {
    annotations
        .par_iter()
        .map(|(json_path, annotation)| {
            let mut stats = ProcessingStats::new();
            stats.total = 1;
            match process_annotation(json_path, annotation, cfg, image_dir, out, &mut stats) {
                Ok(()) => stats.converted = 1,
                Err(e) => {
                    error!(
                        "Failed to process annotation {}: {}",
                        json_path.display(),
                        e
                    );
                    if matches!(e, DatasetError::InvalidDimensions { .. }) {
                        stats.invalid_images += 1;
                    }
                    stats.failed = 1;
                }
            }
            pb.inc(1);
            stats
        })
        .reduce(ProcessingStats::new, |mut acc, stats| {
            acc.merge(&stats);
            acc
        })
}

/// Convert a single annotation document and write its label file, copying or
/// resizing the paired image when an image directory is given.
pub fn process_annotation(
    json_path: &Path,
    annotation: &ImageAnnotation,
    cfg: &ConvertConfig,
    image_dir: Option<&Path>,
    out: &ConvertOutput,
    stats: &mut ProcessingStats,
) -> Result<()> {
    let stem = sanitize_filename::sanitize(external_name(json_path));

    let yolo_data = convert_annotation(annotation, cfg, stats)?;
    let label_path = out.labels_dir.join(&stem).with_extension("txt");
    io::write_atomic(&label_path, yolo_data.as_bytes())?;

    if let (Some(image_dir), Some(images_out)) = (image_dir, out.images_dir.as_deref()) {
        match io::paired_image(image_dir, &stem) {
            Some(src) => {
                let ext = src.extension().unwrap_or_default();
                let dst = images_out.join(&stem).with_extension(ext);
                match cfg.target_size {
                    Some((width, height)) => {
                        let img = image::open(&src)?;
                        raster::resize_exact(&img, width, height).save(&dst)?;
                    }
                    None => {
                        fs::copy(&src, &dst)?;
                    }
                }
            }
            None => {
                warn!("No paired image found for {:?}", json_path);
                stats.missing_pairs += 1;
            }
        }
    }

    Ok(())
}

/// Convert an annotation document to YOLO label lines.
///
/// Unknown labels and unsupported point counts skip the shape and continue
/// the document; a zero-sized image fails the whole document (and only it).
pub fn convert_annotation(
    annotation: &ImageAnnotation,
    cfg: &ConvertConfig,
    stats: &mut ProcessingStats,
) -> Result<String> {
    if annotation.image_width == 0 || annotation.image_height == 0 {
        return Err(DatasetError::InvalidDimensions {
            width: annotation.image_width,
            height: annotation.image_height,
        });
    }

    let mut yolo_data = String::with_capacity(annotation.shapes.len() * 64);

    for shape in &annotation.shapes {
        let Some(class_id) = cfg.classes.id_of(&shape.label) else {
            warn!(
                "{}; skipping shape",
                DatasetError::UnknownLabel {
                    label: shape.label.clone()
                }
            );
            stats.unknown_labels += 1;
            continue;
        };

        let kind = match shape.kind() {
            Ok(kind) => kind,
            Err(e) => {
                warn!("Skipping shape: {}", e);
                stats.unsupported_shapes += 1;
                continue;
            }
        };

        match cfg.format {
            LabelFormat::Bbox => write_bbox_line(&mut yolo_data, class_id, &kind, annotation, cfg)?,
            LabelFormat::Obb => write_obb_line(&mut yolo_data, class_id, &kind, shape, annotation)?,
        }
    }

    Ok(yolo_data)
}

/// Append one axis-aligned center-form label line.
fn write_bbox_line(
    out: &mut String,
    class_id: u32,
    kind: &ShapeKind,
    annotation: &ImageAnnotation,
    cfg: &ConvertConfig,
) -> Result<()> {
    let bbox = match kind {
        ShapeKind::CornerRect { p1, p2 } => AxisAlignedBox::from_corners(*p1, *p2),
        ShapeKind::Quad(quad) => quad.enclosing(),
    };

    // Rescale into the target resolution before normalizing when a resize is
    // requested; otherwise the annotation resolution is the image resolution.
    let (bbox, norm_width, norm_height) = match cfg.target_size {
        Some((width, height)) => {
            let sx = width as f64 / annotation.image_width as f64;
            let sy = height as f64 / annotation.image_height as f64;
            (bbox.rescale(sx, sy), width, height)
        }
        None => (bbox, annotation.image_width, annotation.image_height),
    };

    let norm = bbox.to_normalized(norm_width, norm_height)?;
    out.push_str(&format!(
        "{} {:.6} {:.6} {:.6} {:.6}\n",
        class_id, norm.x_center, norm.y_center, norm.width, norm.height
    ));
    Ok(())
}

/// Append one oriented-quadrilateral label line (four normalized vertices).
///
/// Vertex coordinates divided by the annotation resolution are unchanged by a
/// uniform resize, so no rescale step is needed here.
fn write_obb_line(
    out: &mut String,
    class_id: u32,
    kind: &ShapeKind,
    shape: &Shape,
    annotation: &ImageAnnotation,
) -> Result<()> {
    let quad = match kind {
        ShapeKind::CornerRect { p1, p2 } => {
            let (x1, y1) = *p1;
            let (x2, y2) = *p2;
            // Corner pair expanded clockwise from the first corner.
            OrientedBox::from_points(&[(x1, y1), (x2, y1), (x2, y2), (x1, y2)]).map_err(|_| {
                DatasetError::UnsupportedShape {
                    label: shape.label.clone(),
                    points: shape.points.len(),
                }
            })?
        }
        ShapeKind::Quad(quad) => quad.clone(),
    };

    let w = annotation.image_width as f64;
    let h = annotation.image_height as f64;
    out.push_str(&format!("{}", class_id));
    for &(x, y) in quad.vertices() {
        out.push_str(&format!(" {:.6} {:.6}", x / w, y / h));
    }
    out.push('\n');
    Ok(())
}
