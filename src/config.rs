use clap::{Parser, ValueEnum};
use std::str::FromStr;

// Enumeration for the label output format
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum LabelFormat {
    /// Axis-aligned center-form boxes, 4 coordinates per line
    Bbox,
    /// Oriented quadrilaterals, 8 coordinates per line
    Obb,
}

/// Ordered class-name table. Class ids are positions in this table and are
/// only meaningful relative to it.
#[derive(Debug, Clone, Default)]
pub struct ClassTable {
    names: Vec<String>,
}

impl ClassTable {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn id_of(&self, label: &str) -> Option<u32> {
        self.names.iter().position(|n| n == label).map(|i| i as u32)
    }

    pub fn name_of(&self, id: u32) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

/// Run configuration for the annotation converter. Passed explicitly into
/// every operation; there is no process-wide mutable state.
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    pub classes: ClassTable,
    pub format: LabelFormat,
    /// When set, images are resized to this resolution and box coordinates
    /// are rescaled by the width/height ratio before normalization.
    pub target_size: Option<(u32, u32)>,
}

/// Command-line arguments for converting annotation JSON to YOLO label files.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct ConvertArgs {
    /// Directory containing annotation JSON files
    #[arg(short = 'd', long = "json_dir")]
    pub json_dir: String,

    /// Directory containing the source images (omit to convert labels only)
    #[arg(short = 'i', long = "image_dir")]
    pub image_dir: Option<String>,

    /// Output directory for the converted dataset
    #[arg(short = 'o', long = "output_dir")]
    pub output_dir: String,

    /// Output format for the label files
    #[arg(
        long = "output_format",
        visible_alias = "format",
        value_enum,
        default_value = "bbox"
    )]
    pub output_format: LabelFormat,

    /// Resize images and rescale labels to this square resolution
    #[arg(long = "target_size")]
    pub target_size: Option<u32>,

    /// Proportion of the dataset to use for validation (0 disables the split)
    #[arg(long = "val_size", default_value_t = 0.2, value_parser = validate_size)]
    pub val_size: f32,

    /// Seed for random shuffling
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,

    /// Verify image/label pairing and image integrity after conversion
    #[arg(long = "verify")]
    pub verify: bool,

    /// Ordered list of class names (discovered from the input when omitted)
    #[arg(use_value_delimiter = true)]
    pub label_list: Vec<String>,
}

/// Command-line arguments for building a COCO ground-truth JSON from a
/// directory of images and YOLO label files.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct GroundTruthArgs {
    /// Directory containing the dataset images
    #[arg(short = 'i', long = "image_dir")]
    pub image_dir: String,

    /// Directory containing the YOLO label files
    #[arg(short = 'l', long = "label_dir")]
    pub label_dir: String,

    /// Path of the ground-truth JSON to write
    #[arg(short = 'o', long = "output", default_value = "ground_truth.json")]
    pub output: String,

    /// Ordered list of class names (ids without a name are called class_<id>)
    #[arg(use_value_delimiter = true)]
    pub label_list: Vec<String>,
}

/// Command-line arguments for reconciling detector output against a
/// ground-truth file and computing COCO metrics.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct EvalArgs {
    /// Ground-truth COCO JSON
    #[arg(short = 'g', long = "ground_truth")]
    pub ground_truth: String,

    /// Raw detector predictions JSON (array of records keyed by image name)
    #[arg(short = 'p', long = "predictions")]
    pub predictions: String,

    /// Optional path to write the reconciled COCO predictions JSON
    #[arg(long = "reconciled_out")]
    pub reconciled_out: Option<String>,
}

/// Command-line arguments for rendering annotated overlays.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct VizArgs {
    /// Directory containing the dataset images
    #[arg(short = 'i', long = "image_dir")]
    pub image_dir: String,

    /// Directory containing YOLO label files to draw
    #[arg(short = 'l', long = "label_dir")]
    pub label_dir: Option<String>,

    /// Ground-truth COCO JSON (with --predictions, draws both sets)
    #[arg(short = 'g', long = "ground_truth")]
    pub ground_truth: Option<String>,

    /// Reconciled COCO predictions JSON
    #[arg(short = 'p', long = "predictions")]
    pub predictions: Option<String>,

    /// Output directory for the rendered overlays
    #[arg(short = 'o', long = "output_dir")]
    pub output_dir: String,

    /// Number of images to sample in ground-truth/prediction mode
    #[arg(long = "samples", default_value_t = 5)]
    pub samples: usize,

    /// Seed for sampling images
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,
}

// Validate that the size is between 0.0 and 1.0
pub fn validate_size(s: &str) -> Result<f32, String> {
    match f32::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("SIZE must be between 0.0 and 1.0".to_string()),
    }
}
