//! Overlay rendering: label files onto their images, and ground truth
//! against predictions.

use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::fs;
use std::path::Path;

use crate::coco::PredictionRecord;
use crate::dataset::parse_label_line;
use crate::error::{DatasetError, Result};
use crate::geometry::{iou, size_bucket, AxisAlignedBox};
use crate::io;
use crate::raster;
use crate::types::{AnnotationSet, ProcessingStats};
use crate::utils::{create_progress_bar, external_name};

/// Render every label file in a directory onto its paired image, coloring
/// each box by its size bucket. Missing or undecodable images are warned
/// about and skipped.
pub fn render_label_overlays(
    image_dir: &Path,
    label_dir: &Path,
    output_dir: &Path,
) -> Result<ProcessingStats> {
    let label_files = io::find_label_files(label_dir)?;
    if label_files.is_empty() {
        return Err(DatasetError::EmptyInput(label_dir.display().to_string()));
    }
    fs::create_dir_all(output_dir)?;

    let pb = create_progress_bar(label_files.len() as u64, "Visualize");
    let stats = label_files
        .par_iter()
        .map(|label_path| {
            let mut stats = ProcessingStats::new();
            stats.total = 1;
            match render_one_label_file(label_path, image_dir, output_dir) {
                Ok(()) => stats.converted = 1,
                Err(DatasetError::MissingPairedFile(name)) => {
                    warn!("No image found for '{}'", name);
                    stats.missing_pairs = 1;
                }
                Err(e) => {
                    warn!("Failed to render {}: {}", label_path.display(), e);
                    stats.failed = 1;
                }
            }
            pb.inc(1);
            stats
        })
        .reduce(ProcessingStats::new, |mut acc, stats| {
            acc.merge(&stats);
            acc
        });
    pb.finish_with_message("Visualization complete");

    Ok(stats)
}

fn render_one_label_file(label_path: &Path, image_dir: &Path, output_dir: &Path) -> Result<()> {
    let stem = external_name(label_path);
    let image_path = io::paired_image(image_dir, &stem)
        .ok_or_else(|| DatasetError::MissingPairedFile(stem.clone()))?;

    let mut img = raster::open_rgb(&image_path)?;
    let (width, height) = img.dimensions();

    let content = fs::read_to_string(label_path)?;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let norm = match parse_label_line(line) {
            Ok((_, norm)) => norm,
            Err(e) => {
                warn!("Skipping label line in {}: {}", label_path.display(), e);
                continue;
            }
        };
        let bbox = norm.to_pixel(width, height);
        let color = raster::bucket_color(size_bucket(bbox.width, bbox.height));
        raster::draw_box(&mut img, &bbox, color, 2);
    }

    raster::save(&img, &output_dir.join(format!("{}_visualized.jpg", stem)))
}

/// Sample images from the ground truth and render its boxes against the
/// reconciled predictions, logging each image's mean cross-set IoU.
pub fn render_eval_overlays(
    gt: &AnnotationSet,
    predictions: &[PredictionRecord],
    image_dir: &Path,
    output_dir: &Path,
    samples: usize,
    seed: u64,
) -> Result<ProcessingStats> {
    if gt.images.is_empty() {
        return Err(DatasetError::EmptyInput(
            "ground truth has no images".to_string(),
        ));
    }
    fs::create_dir_all(output_dir)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let sampled: Vec<_> = gt
        .images
        .choose_multiple(&mut rng, samples.min(gt.images.len()))
        .collect();

    let mut stats = ProcessingStats::new();
    for record in sampled {
        stats.total += 1;

        let image_path = image_dir.join(&record.file_name);
        let mut img = match raster::open_rgb(&image_path) {
            Ok(img) => img,
            Err(e) => {
                warn!("Failed to load {}: {}", image_path.display(), e);
                stats.invalid_images += 1;
                continue;
            }
        };

        let gt_boxes: Vec<AxisAlignedBox> = gt
            .records
            .iter()
            .filter(|r| r.image_id == record.id)
            .map(|r| r.bbox)
            .collect();
        let pred_boxes: Vec<AxisAlignedBox> = predictions
            .iter()
            .filter(|p| p.image_id == record.id)
            .map(PredictionRecord::to_bbox)
            .collect();

        for bbox in &gt_boxes {
            raster::draw_box(&mut img, bbox, raster::GT_COLOR, 2);
        }
        for bbox in &pred_boxes {
            raster::draw_box(&mut img, bbox, raster::PRED_COLOR, 2);
        }

        info!(
            "{}: mean IoU {:.3}",
            record.file_name,
            mean_cross_iou(&gt_boxes, &pred_boxes)
        );

        raster::save(
            &img,
            &output_dir.join(format!("{}_eval.jpg", record.external_name)),
        )?;
        stats.converted += 1;
    }

    Ok(stats)
}

/// Mean IoU over every ground-truth/prediction pair of one image; 0.0 when
/// either side is empty.
fn mean_cross_iou(gt_boxes: &[AxisAlignedBox], pred_boxes: &[AxisAlignedBox]) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for gt_box in gt_boxes {
        for pred_box in pred_boxes {
            total += iou(gt_box, pred_box);
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_cross_iou_of_empty_sides_is_zero() {
        let a = [AxisAlignedBox::new(0.0, 0.0, 10.0, 10.0)];
        assert_eq!(mean_cross_iou(&a, &[]), 0.0);
        assert_eq!(mean_cross_iou(&[], &a), 0.0);
    }

    #[test]
    fn mean_cross_iou_averages_all_pairs() {
        let gt = [AxisAlignedBox::new(0.0, 0.0, 10.0, 10.0)];
        let preds = [
            AxisAlignedBox::new(0.0, 0.0, 10.0, 10.0),
            AxisAlignedBox::new(100.0, 100.0, 10.0, 10.0),
        ];
        assert!((mean_cross_iou(&gt, &preds) - 0.5).abs() < 1e-9);
    }
}
