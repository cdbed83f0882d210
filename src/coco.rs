//! COCO format data structures and conversions.
//!
//! Covers the ground-truth schema (`images`/`annotations`/`categories`), the
//! raw detector output arrays produced by an inference process, and the
//! reconciled prediction arrays consumed by evaluation.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{DatasetError, Result};
use crate::geometry::AxisAlignedBox;
use crate::io;
use crate::types::{AnnotationSet, DetectionRecord, ImageRecord};
use crate::utils::external_name;

/// COCO category information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: u32,
    pub name: String,
    #[serde(default = "default_supercategory")]
    pub supercategory: String,
}

fn default_supercategory() -> String {
    "none".to_string()
}

/// COCO image information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Image {
    pub id: u32,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
}

/// COCO annotation information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    pub id: u32,
    pub image_id: u32,
    pub category_id: u32,
    /// Bounding box in [x, y, width, height] pixel form
    pub bbox: [f64; 4],
    pub area: f64,
    #[serde(default)]
    pub iscrowd: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Complete COCO ground-truth document
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CocoFile {
    pub images: Vec<Image>,
    pub annotations: Vec<Annotation>,
    pub categories: Vec<Category>,
}

/// One record of raw detector output. The producing process knows nothing of
/// the ground truth's id assignment, so `image_id` here is the detector's own
/// identifier, usually the image stem; numeric ids are tolerated and carried
/// as their decimal string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPrediction {
    #[serde(deserialize_with = "string_or_number")]
    pub image_id: String,
    pub category_id: u32,
    /// Bounding box in [x, y, width, height] pixel form
    pub bbox: [f64; 4],
    pub score: f64,
}

/// One reconciled prediction, consistent with a ground truth's image-id and
/// category-id spaces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionRecord {
    pub image_id: u32,
    pub category_id: u32,
    pub bbox: [f64; 4],
    pub score: f64,
}

impl PredictionRecord {
    pub fn to_bbox(&self) -> AxisAlignedBox {
        AxisAlignedBox::new(self.bbox[0], self.bbox[1], self.bbox[2], self.bbox[3])
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("invalid image_id: {}", other))),
    }
}

impl CocoFile {
    /// Build a COCO document from an in-memory annotation set. Annotation ids
    /// are assigned sequentially from 1.
    pub fn from_set(set: &AnnotationSet) -> CocoFile {
        let images = set
            .images
            .iter()
            .map(|img| Image {
                id: img.id,
                file_name: img.file_name.clone(),
                width: img.width,
                height: img.height,
            })
            .collect();

        let annotations = set
            .records
            .iter()
            .enumerate()
            .map(|(i, record)| Annotation {
                id: i as u32 + 1,
                image_id: record.image_id,
                category_id: record.class_id,
                bbox: [
                    record.bbox.x,
                    record.bbox.y,
                    record.bbox.width,
                    record.bbox.height,
                ],
                area: record.bbox.area(),
                iscrowd: 0,
                score: record.score,
            })
            .collect();

        let categories = set
            .categories
            .iter()
            .map(|(id, name)| Category {
                id: *id,
                name: name.clone(),
                supercategory: default_supercategory(),
            })
            .collect();

        CocoFile {
            images,
            annotations,
            categories,
        }
    }

    /// Lower a COCO document into the in-memory model, deriving each image's
    /// external name from its file name.
    pub fn into_set(self) -> AnnotationSet {
        let images = self
            .images
            .into_iter()
            .map(|img| ImageRecord {
                id: img.id,
                external_name: external_name(Path::new(&img.file_name)),
                file_name: img.file_name,
                width: img.width,
                height: img.height,
            })
            .collect();

        let records = self
            .annotations
            .into_iter()
            .map(|ann| DetectionRecord {
                image_id: ann.image_id,
                class_id: ann.category_id,
                bbox: AxisAlignedBox::new(ann.bbox[0], ann.bbox[1], ann.bbox[2], ann.bbox[3]),
                score: ann.score,
            })
            .collect();

        let mut categories: Vec<(u32, String)> = self
            .categories
            .into_iter()
            .map(|cat| (cat.id, cat.name))
            .collect();
        categories.sort_by_key(|&(id, _)| id);

        AnnotationSet {
            images,
            records,
            categories,
        }
    }

    pub fn load(path: &Path) -> Result<CocoFile> {
        let file: CocoFile = io::read_json(path)?;
        file.validate()?;
        Ok(file)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        io::write_json_atomic(path, self)
    }

    fn validate(&self) -> Result<()> {
        for ann in &self.annotations {
            if ann.bbox[2] < 0.0 || ann.bbox[3] < 0.0 {
                return Err(DatasetError::InvalidShape(format!(
                    "annotation {} has negative box dimensions",
                    ann.id
                )));
            }
        }
        Ok(())
    }
}

/// Load a raw detector prediction array.
pub fn load_raw_predictions(path: &Path) -> Result<Vec<RawPrediction>> {
    io::read_json(path)
}

/// Write a reconciled prediction array atomically.
pub fn save_predictions(path: &Path, predictions: &[PredictionRecord]) -> Result<()> {
    io::write_json_atomic(path, &predictions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_prediction_tolerates_numeric_image_id() {
        let json = r#"[
            {"image_id": "board_001", "category_id": 0, "bbox": [1.0, 2.0, 3.0, 4.0], "score": 0.9},
            {"image_id": 17, "category_id": 0, "bbox": [1.0, 2.0, 3.0, 4.0], "score": 0.8}
        ]"#;
        let preds: Vec<RawPrediction> = serde_json::from_str(json).unwrap();
        assert_eq!(preds[0].image_id, "board_001");
        assert_eq!(preds[1].image_id, "17");
    }

    #[test]
    fn set_round_trip_preserves_records() {
        let set = AnnotationSet {
            images: vec![ImageRecord {
                id: 1,
                external_name: "board_001".to_string(),
                file_name: "board_001.jpg".to_string(),
                width: 800,
                height: 800,
            }],
            records: vec![DetectionRecord {
                image_id: 1,
                class_id: 0,
                bbox: AxisAlignedBox::new(10.0, 20.0, 30.0, 40.0),
                score: None,
            }],
            categories: vec![(0, "component".to_string())],
        };

        let coco = CocoFile::from_set(&set);
        assert_eq!(coco.annotations[0].id, 1);
        assert_eq!(coco.annotations[0].area, 1200.0);
        assert_eq!(coco.annotations[0].iscrowd, 0);

        let back = coco.into_set();
        assert_eq!(back.images[0].external_name, "board_001");
        assert_eq!(back.records, set.records);
        assert_eq!(back.categories, set.categories);
    }

    #[test]
    fn validate_rejects_negative_dimensions() {
        let coco = CocoFile {
            images: vec![],
            annotations: vec![Annotation {
                id: 1,
                image_id: 1,
                category_id: 0,
                bbox: [0.0, 0.0, -5.0, 10.0],
                area: 0.0,
                iscrowd: 0,
                score: None,
            }],
            categories: vec![],
        };
        assert!(coco.validate().is_err());
    }
}
