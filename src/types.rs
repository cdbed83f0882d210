use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{DatasetError, Result};
use crate::geometry::{AxisAlignedBox, OrientedBox, Point};

// The Shape struct representing one annotated object in a document
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Shape {
    pub label: String,
    pub points: Vec<Point>,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub shape_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// The two annotation conventions a shape can follow, decided by point count
/// at the parsing boundary so downstream code matches exhaustively instead of
/// re-inspecting array lengths.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    /// Two opposite corners of an axis-aligned rectangle, in either order.
    CornerRect { p1: Point, p2: Point },
    /// Four vertices of a possibly-rotated quadrilateral.
    Quad(OrientedBox),
}

impl Shape {
    /// Classify the shape's points into one of the supported conventions.
    ///
    /// Any point count outside {2, 4} is an `UnsupportedShape` for this shape
    /// only; callers skip the shape and continue the document.
    pub fn kind(&self) -> Result<ShapeKind> {
        match self.points.as_slice() {
            [p1, p2] => Ok(ShapeKind::CornerRect { p1: *p1, p2: *p2 }),
            [_, _, _, _] => Ok(ShapeKind::Quad(OrientedBox::from_points(&self.points)?)),
            other => Err(DatasetError::UnsupportedShape {
                label: self.label.clone(),
                points: other.len(),
            }),
        }
    }
}

// The ImageAnnotation struct representing one hand-annotated document
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnnotation {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub flags: Option<HashMap<String, bool>>,
    pub shapes: Vec<Shape>,
    #[serde(default)]
    pub image_path: Option<String>,
    pub image_height: u32,
    pub image_width: u32,
}

/// One image of a dataset. `id` is assigned sequentially at ingestion and is
/// the join key between images and their records; `external_name` (the
/// extension-stripped filename) is the only identifier stable across
/// annotation tools and inference output.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub id: u32,
    pub external_name: String,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
}

/// One ground-truth or predicted object, tagged with the image it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRecord {
    pub image_id: u32,
    pub class_id: u32,
    pub bbox: AxisAlignedBox,
    pub score: Option<f64>,
}

/// One full ground-truth or prediction dataset, held in memory for the
/// duration of a run.
///
/// Within one set, image ids are unique and dense from 1. Two sets never
/// share an id space; cross-set operations require reconciliation through
/// `external_name` first.
#[derive(Debug, Clone, Default)]
pub struct AnnotationSet {
    pub images: Vec<ImageRecord>,
    pub records: Vec<DetectionRecord>,
    /// (category id, category name), sorted by id.
    pub categories: Vec<(u32, String)>,
}

impl AnnotationSet {
    /// Map from external name to image id, used to rewrite foreign records
    /// onto this set's id space.
    pub fn image_ids_by_name(&self) -> HashMap<&str, u32> {
        self.images
            .iter()
            .map(|img| (img.external_name.as_str(), img.id))
            .collect()
    }

    /// The sole category id when the set declares exactly one category.
    pub fn single_category(&self) -> Option<u32> {
        match self.categories.as_slice() {
            [(id, _)] => Some(*id),
            _ => None,
        }
    }
}

// Struct to hold per-run processing statistics
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    pub total: usize,
    pub converted: usize,
    pub unknown_labels: usize,
    pub unsupported_shapes: usize,
    pub missing_pairs: usize,
    pub invalid_images: usize,
    pub failed: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold another worker's counters into this one.
    pub fn merge(&mut self, other: &ProcessingStats) {
        self.total += other.total;
        self.converted += other.converted;
        self.unknown_labels += other.unknown_labels;
        self.unsupported_shapes += other.unsupported_shapes;
        self.missing_pairs += other.missing_pairs;
        self.invalid_images += other.invalid_images;
        self.failed += other.failed;
    }

    pub fn print_summary(&self) {
        log::info!("=== Processing Summary ===");
        log::info!("Total items processed: {}", self.total);
        log::info!("Successful conversions: {}", self.converted);
        log::info!("Failed items: {}", self.failed);

        if self.unknown_labels > 0 {
            log::warn!("Skipped shapes with unknown labels: {}", self.unknown_labels);
        }
        if self.unsupported_shapes > 0 {
            log::warn!(
                "Skipped shapes with unsupported point counts: {}",
                self.unsupported_shapes
            );
        }
        if self.missing_pairs > 0 {
            log::warn!("Items without a paired file: {}", self.missing_pairs);
        }
        if self.invalid_images > 0 {
            log::warn!(
                "Images that failed to load or had zero size: {}",
                self.invalid_images
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(points: Vec<Point>) -> Shape {
        Shape {
            label: "component".to_string(),
            points,
            group_id: None,
            shape_type: None,
            description: None,
        }
    }

    #[test]
    fn two_points_classify_as_corner_rect() {
        let kind = shape(vec![(1.0, 2.0), (3.0, 4.0)]).kind().unwrap();
        assert_eq!(
            kind,
            ShapeKind::CornerRect {
                p1: (1.0, 2.0),
                p2: (3.0, 4.0)
            }
        );
    }

    #[test]
    fn four_points_classify_as_quad() {
        let kind = shape(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 2.0), (0.0, 2.0)])
            .kind()
            .unwrap();
        assert!(matches!(kind, ShapeKind::Quad(_)));
    }

    #[test]
    fn other_point_counts_are_unsupported() {
        let err = shape(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)])
            .kind()
            .unwrap_err();
        assert!(matches!(
            err,
            DatasetError::UnsupportedShape { points: 3, .. }
        ));
    }

    #[test]
    fn annotation_document_parses_camel_case_fields() {
        let json = r#"{
            "imageWidth": 200,
            "imageHeight": 100,
            "shapes": [{"label": "component", "points": [[0.0, 0.0], [100.0, 50.0]]}]
        }"#;
        let doc: ImageAnnotation = serde_json::from_str(json).unwrap();
        assert_eq!(doc.image_width, 200);
        assert_eq!(doc.image_height, 100);
        assert_eq!(doc.shapes.len(), 1);
    }

    #[test]
    fn single_category_detection() {
        let mut set = AnnotationSet::default();
        assert_eq!(set.single_category(), None);
        set.categories.push((5, "component".to_string()));
        assert_eq!(set.single_category(), Some(5));
        set.categories.push((6, "via".to_string()));
        assert_eq!(set.single_category(), None);
    }
}
