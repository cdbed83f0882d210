//! PCB component detection dataset toolkit
//!
//! This library converts hand-annotated board JSON into YOLO training labels,
//! builds COCO ground truth from converted datasets, reconciles external
//! detector output onto the ground truth's id spaces, computes COCO-style
//! AP/AR metrics, and renders annotated overlays.

pub mod coco;
pub mod config;
pub mod conversion;
pub mod dataset;
pub mod error;
pub mod evaluate;
pub mod geometry;
pub mod io;
pub mod raster;
pub mod reconcile;
pub mod types;
pub mod utils;
pub mod visualize;

// Re-export commonly used types and functions
pub use config::{ClassTable, ConvertConfig, LabelFormat};
pub use error::{DatasetError, Result};
pub use evaluate::{coco_iou_thresholds, evaluate, EvalSummary};
pub use geometry::{
    iou, size_bucket, AxisAlignedBox, NormalizedBox, OrientedBox, Point, SizeBucket,
};
pub use reconcile::{reconcile, ReconcileReport};
pub use types::{
    AnnotationSet, DetectionRecord, ImageAnnotation, ImageRecord, ProcessingStats, Shape,
    ShapeKind,
};
