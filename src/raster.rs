//! Thin wrappers over the raster stack: decode, Lanczos resize, and
//! rectangle drawing used by the conversion and visualization paths.

use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::path::Path;

use crate::error::Result;
use crate::geometry::{AxisAlignedBox, SizeBucket};

/// Overlay color for ground-truth boxes.
pub const GT_COLOR: Rgb<u8> = Rgb([66, 133, 244]);

/// Overlay color for prediction boxes.
pub const PRED_COLOR: Rgb<u8> = Rgb([219, 68, 55]);

pub fn open_rgb(path: &Path) -> Result<RgbImage> {
    Ok(image::open(path)?.into_rgb8())
}

/// Resize to the exact target resolution with the Lanczos3 filter.
pub fn resize_exact(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    img.resize_exact(width, height, FilterType::Lanczos3)
}

pub fn save(img: &RgbImage, path: &Path) -> Result<()> {
    img.save(path)?;
    Ok(())
}

/// Overlay color by object size: small red, medium blue, large yellow.
pub fn bucket_color(bucket: SizeBucket) -> Rgb<u8> {
    match bucket {
        SizeBucket::Small => Rgb([255, 0, 0]),
        SizeBucket::Medium => Rgb([0, 0, 255]),
        SizeBucket::Large => Rgb([255, 255, 0]),
    }
}

/// Draw a hollow rectangle with the given border thickness, growing outward
/// so the box interior stays unobscured.
pub fn draw_box(img: &mut RgbImage, bbox: &AxisAlignedBox, color: Rgb<u8>, thickness: u32) {
    let width = bbox.width.max(1.0).round() as u32;
    let height = bbox.height.max(1.0).round() as u32;
    for t in 0..thickness {
        let rect = Rect::at(
            bbox.x.round() as i32 - t as i32,
            bbox.y.round() as i32 - t as i32,
        )
        .of_size(width + 2 * t, height + 2 * t);
        draw_hollow_rect_mut(img, rect, color);
    }
}
