//! Bounding-box representations and the pure conversions between them.
//!
//! Everything in this module is side-effect free: oriented quadrilaterals,
//! axis-aligned pixel boxes and YOLO-normalized center-form boxes, plus the
//! IoU and COCO size-bucket arithmetic used by conversion, visualization and
//! evaluation alike.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DatasetError, Result};

/// A point in pixel or normalized coordinates. The coordinate space is a
/// convention of the call site and must never be mixed without an explicit
/// rescale.
pub type Point = (f64, f64);

/// Upper area bound (exclusive) of the COCO "small" bucket, 32 * 32 pixels.
pub const SMALL_MAX_AREA: f64 = 1024.0;

/// Upper area bound (exclusive) of the COCO "medium" bucket, 96 * 96 pixels.
pub const MEDIUM_MAX_AREA: f64 = 9216.0;

/// COCO object-size classification by pixel area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeBucket {
    Small,
    Medium,
    Large,
}

impl fmt::Display for SizeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeBucket::Small => write!(f, "small"),
            SizeBucket::Medium => write!(f, "medium"),
            SizeBucket::Large => write!(f, "large"),
        }
    }
}

/// Classify a box by pixel area using the standard COCO thresholds.
pub fn size_bucket(width: f64, height: f64) -> SizeBucket {
    size_bucket_with(width, height, SMALL_MAX_AREA, MEDIUM_MAX_AREA)
}

/// Classify a box by pixel area against caller-supplied thresholds.
pub fn size_bucket_with(width: f64, height: f64, small_max: f64, medium_max: f64) -> SizeBucket {
    let area = width * height;
    if area < small_max {
        SizeBucket::Small
    } else if area < medium_max {
        SizeBucket::Medium
    } else {
        SizeBucket::Large
    }
}

/// A possibly-rotated quadrilateral given by exactly four vertices in a
/// consistent winding order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientedBox {
    vertices: [Point; 4],
}

impl OrientedBox {
    /// Build an oriented box from an annotated point list.
    ///
    /// Fails with `InvalidShape` unless exactly four points are given.
    pub fn from_points(points: &[Point]) -> Result<Self> {
        let vertices = <[Point; 4]>::try_from(points).map_err(|_| {
            DatasetError::InvalidShape(format!("expected 4 vertices, got {}", points.len()))
        })?;
        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[Point; 4] {
        &self.vertices
    }

    /// The smallest axis-aligned box containing all four vertices.
    ///
    /// Rotation information is lost; this reduction is one-way.
    pub fn enclosing(&self) -> AxisAlignedBox {
        let (x_min, y_min, x_max, y_max) = self.vertices.iter().fold(
            (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
            |(x_min, y_min, x_max, y_max), &(x, y)| {
                (x_min.min(x), y_min.min(y), x_max.max(x), y_max.max(y))
            },
        );
        AxisAlignedBox::new(x_min, y_min, x_max - x_min, y_max - y_min)
    }

    /// Scale every vertex by per-axis resolution ratios.
    pub fn rescale(&self, sx: f64, sy: f64) -> OrientedBox {
        let mut vertices = self.vertices;
        for v in &mut vertices {
            v.0 *= sx;
            v.1 *= sy;
        }
        OrientedBox { vertices }
    }
}

/// An axis-aligned box in LTWH (left-top-width-height) pixel form, the
/// layout COCO uses for `bbox` arrays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisAlignedBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl AxisAlignedBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a box from two opposite corners given in either order.
    pub fn from_corners(p1: Point, p2: Point) -> Self {
        let x = p1.0.min(p2.0);
        let y = p1.1.min(p2.1);
        Self {
            x,
            y,
            width: (p2.0 - p1.0).abs(),
            height: (p2.1 - p1.1).abs(),
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Right edge coordinate (x + width).
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge coordinate (y + height).
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Scale by per-axis resolution ratios, e.g. 800/3904 on each axis when
    /// retargeting a 3904px annotation to an 800px image.
    pub fn rescale(&self, sx: f64, sy: f64) -> AxisAlignedBox {
        AxisAlignedBox {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
        }
    }

    /// Convert to center-form coordinates normalized by the image size.
    ///
    /// Fails with `InvalidDimensions` when either dimension is zero.
    pub fn to_normalized(&self, image_width: u32, image_height: u32) -> Result<NormalizedBox> {
        if image_width == 0 || image_height == 0 {
            return Err(DatasetError::InvalidDimensions {
                width: image_width,
                height: image_height,
            });
        }
        let w = image_width as f64;
        let h = image_height as f64;
        Ok(NormalizedBox {
            x_center: (self.x + self.width / 2.0) / w,
            y_center: (self.y + self.height / 2.0) / h,
            width: self.width / w,
            height: self.height / h,
        })
    }
}

/// A center-form box with every coordinate in [0, 1], relative to a known
/// image width and height (the YOLO label convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedBox {
    /// Convert back to an axis-aligned pixel box; inverse of
    /// [`AxisAlignedBox::to_normalized`].
    pub fn to_pixel(&self, image_width: u32, image_height: u32) -> AxisAlignedBox {
        let w = image_width as f64;
        let h = image_height as f64;
        let width = self.width * w;
        let height = self.height * h;
        AxisAlignedBox {
            x: self.x_center * w - width / 2.0,
            y: self.y_center * h - height / 2.0,
            width,
            height,
        }
    }
}

/// Intersection over union of two axis-aligned boxes.
///
/// Returns a value in [0, 1]. A zero union area or disjoint boxes yield 0.0;
/// this is a defined edge case, never an error.
pub fn iou(a: &AxisAlignedBox, b: &AxisAlignedBox) -> f64 {
    let x_left = a.x.max(b.x);
    let y_top = a.y.max(b.y);
    let x_right = a.right().min(b.right());
    let y_bottom = a.bottom().min(b.bottom());

    if x_right < x_left || y_bottom < y_top {
        return 0.0;
    }

    let intersection = (x_right - x_left) * (y_bottom - y_top);
    let union = a.area() + b.area() - intersection;
    if union == 0.0 {
        return 0.0;
    }

    intersection / union
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enclosing_of_rotated_quad_is_non_negative() {
        let quad = OrientedBox::from_points(&[(50.0, 10.0), (90.0, 50.0), (50.0, 90.0), (10.0, 50.0)])
            .unwrap();
        let aabb = quad.enclosing();
        assert!(aabb.width >= 0.0 && aabb.height >= 0.0);
        assert_eq!(aabb, AxisAlignedBox::new(10.0, 10.0, 80.0, 80.0));
    }

    #[test]
    fn from_points_rejects_wrong_count() {
        assert!(OrientedBox::from_points(&[(0.0, 0.0), (1.0, 1.0)]).is_err());
        assert!(OrientedBox::from_points(&[(0.0, 0.0); 5]).is_err());
    }

    #[test]
    fn from_corners_tolerates_swapped_order() {
        let a = AxisAlignedBox::from_corners((10.0, 10.0), (20.0, 30.0));
        let b = AxisAlignedBox::from_corners((20.0, 30.0), (10.0, 10.0));
        assert_eq!(a, b);
        assert_eq!(a, AxisAlignedBox::new(10.0, 10.0, 10.0, 20.0));
    }

    #[test]
    fn normalize_round_trip_is_identity() {
        let bbox = AxisAlignedBox::new(13.0, 27.5, 120.0, 64.0);
        let back = bbox.to_normalized(800, 600).unwrap().to_pixel(800, 600);
        assert!((bbox.x - back.x).abs() < 1e-9);
        assert!((bbox.y - back.y).abs() < 1e-9);
        assert!((bbox.width - back.width).abs() < 1e-9);
        assert!((bbox.height - back.height).abs() < 1e-9);
    }

    #[test]
    fn normalize_rejects_zero_dimensions() {
        let bbox = AxisAlignedBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(bbox.to_normalized(0, 100).is_err());
        assert!(bbox.to_normalized(100, 0).is_err());
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let bbox = AxisAlignedBox::new(5.0, 5.0, 40.0, 20.0);
        assert!((iou(&bbox, &bbox) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = AxisAlignedBox::new(0.0, 0.0, 10.0, 10.0);
        let b = AxisAlignedBox::new(20.0, 20.0, 10.0, 10.0);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn iou_of_degenerate_boxes_is_zero_not_error() {
        let a = AxisAlignedBox::new(0.0, 0.0, 0.0, 0.0);
        assert_eq!(iou(&a, &a), 0.0);
    }

    #[test]
    fn iou_partial_overlap() {
        let a = AxisAlignedBox::new(0.0, 0.0, 10.0, 10.0);
        let b = AxisAlignedBox::new(5.0, 5.0, 10.0, 10.0);
        // intersection 25, union 175
        assert!((iou(&a, &b) - 25.0 / 175.0).abs() < 1e-10);
    }

    #[test]
    fn size_bucket_boundaries() {
        assert_eq!(size_bucket(1023.0, 1.0), SizeBucket::Small);
        assert_eq!(size_bucket(1024.0, 1.0), SizeBucket::Medium);
        assert_eq!(size_bucket(9215.0, 1.0), SizeBucket::Medium);
        assert_eq!(size_bucket(96.0, 96.0), SizeBucket::Large);
    }

    #[test]
    fn size_bucket_with_custom_thresholds() {
        assert_eq!(size_bucket_with(10.0, 10.0, 50.0, 200.0), SizeBucket::Medium);
        assert_eq!(size_bucket_with(10.0, 10.0, 200.0, 400.0), SizeBucket::Small);
    }
}
