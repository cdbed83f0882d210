//! COCO-style detection metrics over a reconciled ground truth and
//! prediction pair.
//!
//! The IoU sweep 0.50:0.05:0.95 and the small/medium/large area buckets are
//! a fixed external contract: any comparable output must reproduce them
//! exactly, so neither is configurable from here.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::coco::PredictionRecord;
use crate::error::{DatasetError, Result};
use crate::geometry::{iou, size_bucket, SizeBucket};
use crate::types::{AnnotationSet, DetectionRecord};

/// The standard COCO evaluation thresholds, 0.50 through 0.95 in steps of
/// 0.05.
pub fn coco_iou_thresholds() -> Vec<f64> {
    (0..10).map(|i| 0.5 + 0.05 * i as f64).collect()
}

const RECALL_LEVELS: usize = 101;
const MAX_DETECTIONS: usize = 100;

/// Undefined statistics (no ground truth in the slice) are reported as -1,
/// matching the COCO tooling convention.
const UNDEFINED: f64 = -1.0;

type GtGroups<'a> = HashMap<(u32, u32), Vec<&'a DetectionRecord>>;
type PredGroups<'a> = HashMap<(u32, u32), Vec<&'a PredictionRecord>>;

#[derive(Debug, Clone, Copy)]
struct MatchOutcome {
    confidence: f64,
    is_true_positive: bool,
}

/// The twelve summary statistics of a COCO evaluation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalSummary {
    pub ap: f64,
    pub ap50: f64,
    pub ap75: f64,
    pub ap_small: f64,
    pub ap_medium: f64,
    pub ap_large: f64,
    pub ar_1: f64,
    pub ar_10: f64,
    pub ar_100: f64,
    pub ar_small: f64,
    pub ar_medium: f64,
    pub ar_large: f64,
}

fn write_stat(
    f: &mut fmt::Formatter<'_>,
    metric: &str,
    abbr: &str,
    iou: &str,
    area: &str,
    dets: &str,
    value: f64,
) -> fmt::Result {
    writeln!(
        f,
        " Average {metric} ({abbr}) @[ IoU={iou} | area={area:>6} | maxDets={dets:>3} ] = {value:.3}"
    )
}

impl fmt::Display for EvalSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = write_stat;
        line(f, "Precision", "AP", "0.50:0.95", "all", "100", self.ap)?;
        line(f, "Precision", "AP", "0.50     ", "all", "100", self.ap50)?;
        line(f, "Precision", "AP", "0.75     ", "all", "100", self.ap75)?;
        line(f, "Precision", "AP", "0.50:0.95", "small", "100", self.ap_small)?;
        line(f, "Precision", "AP", "0.50:0.95", "medium", "100", self.ap_medium)?;
        line(f, "Precision", "AP", "0.50:0.95", "large", "100", self.ap_large)?;
        line(f, "Recall   ", "AR", "0.50:0.95", "all", "1", self.ar_1)?;
        line(f, "Recall   ", "AR", "0.50:0.95", "all", "10", self.ar_10)?;
        line(f, "Recall   ", "AR", "0.50:0.95", "all", "100", self.ar_100)?;
        line(f, "Recall   ", "AR", "0.50:0.95", "small", "100", self.ar_small)?;
        line(f, "Recall   ", "AR", "0.50:0.95", "medium", "100", self.ar_medium)?;
        line(f, "Recall   ", "AR", "0.50:0.95", "large", "100", self.ar_large)
    }
}

/// Evaluate reconciled predictions against a ground truth.
///
/// Both sets must already share image-id and category-id spaces; run the
/// reconciler first when predictions come from an external process.
pub fn evaluate(gt: &AnnotationSet, predictions: &[PredictionRecord]) -> Result<EvalSummary> {
    if gt.images.is_empty() {
        return Err(DatasetError::EmptyInput(
            "ground truth has no images".to_string(),
        ));
    }

    let thresholds = coco_iou_thresholds();

    let mut categories: BTreeSet<u32> = gt.categories.iter().map(|&(id, _)| id).collect();
    if categories.is_empty() {
        categories = gt.records.iter().map(|r| r.class_id).collect();
    }
    let categories: Vec<u32> = categories.into_iter().collect();
    let image_ids: Vec<u32> = gt.images.iter().map(|img| img.id).collect();

    let mut gt_groups: GtGroups = HashMap::new();
    for record in &gt.records {
        gt_groups
            .entry((record.image_id, record.class_id))
            .or_default()
            .push(record);
    }

    let mut pred_groups: PredGroups = HashMap::new();
    for pred in predictions {
        pred_groups
            .entry((pred.image_id, pred.category_id))
            .or_default()
            .push(pred);
    }

    let scope = EvalScope {
        image_ids: &image_ids,
        categories: &categories,
        gt_groups: &gt_groups,
        pred_groups: &pred_groups,
    };

    Ok(EvalSummary {
        ap: scope.average_precision_over(&thresholds, None),
        ap50: scope.average_precision_over(&[0.5], None),
        ap75: scope.average_precision_over(&[0.75], None),
        ap_small: scope.average_precision_over(&thresholds, Some(SizeBucket::Small)),
        ap_medium: scope.average_precision_over(&thresholds, Some(SizeBucket::Medium)),
        ap_large: scope.average_precision_over(&thresholds, Some(SizeBucket::Large)),
        ar_1: scope.average_recall_over(&thresholds, 1, None),
        ar_10: scope.average_recall_over(&thresholds, 10, None),
        ar_100: scope.average_recall_over(&thresholds, MAX_DETECTIONS, None),
        ar_small: scope.average_recall_over(&thresholds, MAX_DETECTIONS, Some(SizeBucket::Small)),
        ar_medium: scope.average_recall_over(&thresholds, MAX_DETECTIONS, Some(SizeBucket::Medium)),
        ar_large: scope.average_recall_over(&thresholds, MAX_DETECTIONS, Some(SizeBucket::Large)),
    })
}

struct EvalScope<'a> {
    image_ids: &'a [u32],
    categories: &'a [u32],
    gt_groups: &'a GtGroups<'a>,
    pred_groups: &'a PredGroups<'a>,
}

impl EvalScope<'_> {
    /// AP averaged over the given thresholds and all categories; size buckets
    /// restrict both ground truth and predictions to boxes of that bucket.
    fn average_precision_over(&self, thresholds: &[f64], bucket: Option<SizeBucket>) -> f64 {
        let mut values = Vec::new();
        for &category in self.categories {
            for &threshold in thresholds {
                let (matches, total_gt) =
                    self.class_matches(category, threshold, MAX_DETECTIONS, bucket);
                if let Some(ap) = average_precision(&matches, total_gt) {
                    values.push(ap);
                }
            }
        }
        mean_or_undefined(&values)
    }

    fn average_recall_over(
        &self,
        thresholds: &[f64],
        max_detections: usize,
        bucket: Option<SizeBucket>,
    ) -> f64 {
        let mut values = Vec::new();
        for &category in self.categories {
            for &threshold in thresholds {
                let (matches, total_gt) =
                    self.class_matches(category, threshold, max_detections, bucket);
                if total_gt > 0 {
                    let tp = matches.iter().filter(|m| m.is_true_positive).count();
                    values.push(tp as f64 / total_gt as f64);
                }
            }
        }
        mean_or_undefined(&values)
    }

    /// Collect match outcomes for one category at one threshold across all
    /// images, sorted by confidence descending.
    fn class_matches(
        &self,
        category: u32,
        threshold: f64,
        max_detections: usize,
        bucket: Option<SizeBucket>,
    ) -> (Vec<MatchOutcome>, usize) {
        let mut all_matches = Vec::new();
        let mut total_gt = 0;

        for &image_id in self.image_ids {
            let key = (image_id, category);

            let gts: Vec<&DetectionRecord> = self
                .gt_groups
                .get(&key)
                .map(|records| {
                    records
                        .iter()
                        .copied()
                        .filter(|r| in_bucket(bucket, r.bbox.width, r.bbox.height))
                        .collect()
                })
                .unwrap_or_default();
            total_gt += gts.len();

            let mut preds: Vec<&PredictionRecord> = self
                .pred_groups
                .get(&key)
                .map(|records| {
                    records
                        .iter()
                        .copied()
                        .filter(|p| in_bucket(bucket, p.bbox[2], p.bbox[3]))
                        .collect()
                })
                .unwrap_or_default();
            preds.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            preds.truncate(max_detections);

            if !preds.is_empty() {
                all_matches.extend(greedy_match(&preds, &gts, threshold));
            }
        }

        all_matches.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        (all_matches, total_gt)
    }
}

fn in_bucket(bucket: Option<SizeBucket>, width: f64, height: f64) -> bool {
    bucket.map_or(true, |b| size_bucket(width, height) == b)
}

/// Match predictions (already sorted by confidence descending) to ground
/// truths greedily: each prediction takes the highest-IoU unmatched ground
/// truth, and is a true positive when that IoU reaches the threshold.
fn greedy_match(
    preds: &[&PredictionRecord],
    gts: &[&DetectionRecord],
    threshold: f64,
) -> Vec<MatchOutcome> {
    let mut gt_taken = vec![false; gts.len()];
    let mut outcomes = Vec::with_capacity(preds.len());

    for pred in preds {
        let pred_box = pred.to_bbox();
        let mut best_iou = 0.0;
        let mut best_gt: Option<usize> = None;

        for (gt_idx, gt) in gts.iter().enumerate() {
            if gt_taken[gt_idx] {
                continue;
            }
            let overlap = iou(&pred_box, &gt.bbox);
            if overlap > best_iou {
                best_iou = overlap;
                best_gt = Some(gt_idx);
            }
        }

        let is_true_positive = match best_gt {
            Some(gt_idx) if best_iou >= threshold => {
                gt_taken[gt_idx] = true;
                true
            }
            _ => false,
        };
        outcomes.push(MatchOutcome {
            confidence: pred.score,
            is_true_positive,
        });
    }

    outcomes
}

/// 101-point interpolated average precision from confidence-sorted matches.
///
/// Returns `None` when there is no ground truth to recall; such slices are
/// excluded from aggregation rather than averaged in as zero.
fn average_precision(matches: &[MatchOutcome], total_gt: usize) -> Option<f64> {
    if total_gt == 0 {
        return None;
    }
    if matches.is_empty() {
        return Some(0.0);
    }

    let mut precisions = Vec::with_capacity(matches.len());
    let mut recalls = Vec::with_capacity(matches.len());
    let mut tp = 0usize;
    let mut fp = 0usize;
    for m in matches {
        if m.is_true_positive {
            tp += 1;
        } else {
            fp += 1;
        }
        precisions.push(tp as f64 / (tp + fp) as f64);
        recalls.push(tp as f64 / total_gt as f64);
    }

    // Monotone envelope from the right, then sample at the 101 recall levels.
    for i in (0..precisions.len() - 1).rev() {
        precisions[i] = precisions[i].max(precisions[i + 1]);
    }

    let mut sum = 0.0;
    for level in 0..RECALL_LEVELS {
        let recall = level as f64 / (RECALL_LEVELS - 1) as f64;
        let precision = recalls
            .iter()
            .position(|&r| r >= recall)
            .map(|idx| precisions[idx])
            .unwrap_or(0.0);
        sum += precision;
    }
    Some(sum / RECALL_LEVELS as f64)
}

fn mean_or_undefined(values: &[f64]) -> f64 {
    if values.is_empty() {
        UNDEFINED
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
