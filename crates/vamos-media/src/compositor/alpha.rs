//! Feathered alpha from a binary mask.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::distance_transform::euclidean_squared_distance_transform;

/// Per-pixel blend weight in `[0, 1]`.
pub type AlphaMask = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Mask values above this count as inside the region.
const MASK_THRESHOLD: u8 = 127;

/// Build the blend weight for `mask`.
///
/// With `feather_px <= 0` the result is the binarized mask. Otherwise mask
/// pixels get 1 and each background pixel gets `1 - d / feather_px`
/// floored at 0, where `d` is its Euclidean distance to the nearest mask
/// pixel. The band therefore lies outside the region and the region itself
/// is always fully covered.
pub fn build_alpha_from_mask(mask: &GrayImage, feather_px: i32) -> AlphaMask {
    let (width, height) = mask.dimensions();
    let binary = GrayImage::from_fn(width, height, |x, y| {
        Luma([if mask.get_pixel(x, y)[0] > MASK_THRESHOLD { 255 } else { 0 }])
    });

    if feather_px <= 0 {
        return AlphaMask::from_fn(width, height, |x, y| {
            Luma([if binary.get_pixel(x, y)[0] > 0 { 1.0 } else { 0.0 }])
        });
    }

    // Distance from every pixel to the nearest lit (mask) pixel; 0 inside.
    let distances = euclidean_squared_distance_transform(&binary);
    let feather = feather_px as f64;

    AlphaMask::from_fn(width, height, |x, y| {
        let d = distances.get_pixel(x, y)[0].sqrt();
        Luma([(1.0 - d / feather).clamp(0.0, 1.0) as f32])
    })
}
