//! Rewriting raw detector output onto a ground truth's id and category
//! spaces.
//!
//! Predictions come from an inference process that knows nothing of the
//! ground truth's sequential image ids, so the only usable join key is the
//! extension-stripped file name carried by both sides.

use log::{info, warn};
use std::collections::HashSet;
use std::path::Path;

use crate::coco::{PredictionRecord, RawPrediction};
use crate::error::DatasetError;
use crate::types::AnnotationSet;
use crate::utils::external_name;

/// Counts accumulated over one reconciliation run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records successfully rewritten onto the ground-truth id space.
    pub matched: usize,
    /// Records dropped because their name is absent from the ground truth.
    pub dropped: usize,
    /// Multi-class records whose category id is unknown to the ground truth.
    /// These are kept untouched; the disagreement is reported, not fixed.
    pub category_mismatches: usize,
}

impl ReconcileReport {
    pub fn print_summary(&self) {
        info!(
            "Reconciled {} prediction records ({} dropped)",
            self.matched, self.dropped
        );
        if self.category_mismatches > 0 {
            warn!(
                "{} records carry category ids unknown to the ground truth",
                self.category_mismatches
            );
        }
    }
}

/// Rewrite raw predictions onto the ground truth's image-id and category-id
/// spaces.
///
/// A prediction whose stripped name is not a ground-truth image is dropped
/// and counted, never fatal. With a single-category ground truth, every
/// output record is forced onto that category id (detectors routinely emit a
/// zero-based or arbitrary id of their own); with multiple categories, ids
/// are left as-is and disagreements are only counted.
pub fn reconcile(
    gt: &AnnotationSet,
    predictions: &[RawPrediction],
) -> (Vec<PredictionRecord>, ReconcileReport) {
    let ids_by_name = gt.image_ids_by_name();
    let forced_category = gt.single_category();
    let known_categories: HashSet<u32> = gt.categories.iter().map(|&(id, _)| id).collect();

    let mut reconciled = Vec::with_capacity(predictions.len());
    let mut report = ReconcileReport::default();

    for pred in predictions {
        let stem = external_name(Path::new(&pred.image_id));
        let Some(&image_id) = ids_by_name.get(stem.as_str()) else {
            warn!(
                "{}; dropped",
                DatasetError::ReconciliationMiss(pred.image_id.clone())
            );
            report.dropped += 1;
            continue;
        };

        let category_id = match forced_category {
            Some(id) => id,
            None => {
                if !known_categories.contains(&pred.category_id) {
                    warn!(
                        "{}",
                        DatasetError::CategoryMismatch(format!(
                            "prediction for '{}' has category {} unknown to the ground truth",
                            stem, pred.category_id
                        ))
                    );
                    report.category_mismatches += 1;
                }
                pred.category_id
            }
        };

        reconciled.push(PredictionRecord {
            image_id,
            category_id,
            bbox: pred.bbox,
            score: pred.score,
        });
        report.matched += 1;
    }

    (reconciled, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageRecord;

    fn gt_with_images(names: &[(&str, u32)], categories: Vec<(u32, String)>) -> AnnotationSet {
        AnnotationSet {
            images: names
                .iter()
                .map(|&(name, id)| ImageRecord {
                    id,
                    external_name: name.to_string(),
                    file_name: format!("{}.jpg", name),
                    width: 800,
                    height: 800,
                })
                .collect(),
            records: Vec::new(),
            categories,
        }
    }

    fn raw(image_id: &str, category_id: u32) -> RawPrediction {
        RawPrediction {
            image_id: image_id.to_string(),
            category_id,
            bbox: [0.0, 0.0, 10.0, 10.0],
            score: 0.9,
        }
    }

    #[test]
    fn unknown_names_are_dropped_and_counted() {
        let gt = gt_with_images(&[("a", 1), ("b", 2)], vec![(0, "component".to_string())]);
        let (records, report) = reconcile(&gt, &[raw("a", 0), raw("c", 0)]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].image_id, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.matched, 1);
    }

    #[test]
    fn single_category_is_forced() {
        let gt = gt_with_images(&[("a", 1)], vec![(5, "component".to_string())]);
        let (records, report) = reconcile(&gt, &[raw("a", 0), raw("a", 3)]);

        assert!(records.iter().all(|r| r.category_id == 5));
        assert_eq!(report.category_mismatches, 0);
    }

    #[test]
    fn multi_category_mismatch_is_reported_not_fixed() {
        let gt = gt_with_images(
            &[("a", 1)],
            vec![(0, "component".to_string()), (1, "via".to_string())],
        );
        let (records, report) = reconcile(&gt, &[raw("a", 1), raw("a", 7)]);

        assert_eq!(records[0].category_id, 1);
        assert_eq!(records[1].category_id, 7);
        assert_eq!(report.category_mismatches, 1);
    }

    #[test]
    fn prediction_names_with_extensions_are_stripped() {
        let gt = gt_with_images(&[("a", 1)], vec![(0, "component".to_string())]);
        let (records, report) = reconcile(&gt, &[raw("a.jpg", 0)]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].image_id, 1);
        assert_eq!(report.dropped, 0);
    }
}
