//! Blur transforms and alpha compositing.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::filter::{box_filter, gaussian_blur_f32};
use tracing::warn;
use vamos_models::{BlurMode, BoundingBox};

use super::alpha::build_alpha_from_mask;
use super::mask::{mask_bounds, pixel_span};
use super::{KERNEL_FRACTION, MAX_KERNEL, MIN_KERNEL};

const BILATERAL_DIAMETER: i32 = 9;
const BILATERAL_SIGMA_COLOR: f32 = 75.0;
const BILATERAL_SIGMA_SPACE: f32 = 75.0;

/// Blur kernel for a region: `round(min(w, h) * fraction)` forced odd and
/// clamped to `[min, max]`.
pub fn adaptive_kernel_size(width: u32, height: u32, fraction: f64, min: u32, max: u32) -> u32 {
    let min = min | 1;
    let max = if max % 2 == 0 { max.saturating_sub(1) } else { max }.max(min);

    let shorter = width.min(height) as f64;
    let mut kernel = (shorter * fraction.max(0.0)).round() as u32;
    if kernel % 2 == 0 {
        kernel += 1;
    }
    kernel.clamp(min, max)
}

/// Blend a blurred copy of `frame` into it through `mask`.
///
/// `bbox_hint` sizes the blur kernel; without it the mask's bounds are used.
/// Only the region of interest around the mask is transformed.
pub fn apply_blur(
    frame: &RgbImage,
    mask: &GrayImage,
    mode: BlurMode,
    feather_px: i32,
    bbox_hint: Option<&BoundingBox>,
) -> RgbImage {
    let mut out = frame.clone();
    blend_blur_into(&mut out, mask, mode, feather_px, bbox_hint);
    out
}

pub(crate) fn blend_blur_into(
    frame: &mut RgbImage,
    mask: &GrayImage,
    mode: BlurMode,
    feather_px: i32,
    bbox_hint: Option<&BoundingBox>,
) {
    let (width, height) = frame.dimensions();
    if mask.dimensions() != (width, height) {
        warn!(
            frame = ?(width, height),
            mask = ?mask.dimensions(),
            "Mask does not match frame size, skipping region"
        );
        return;
    }

    let Some((mx0, my0, mx1, my1)) = mask_bounds(mask) else {
        return;
    };

    let (region_w, region_h) = bbox_hint
        .and_then(|b| pixel_span(b, width, height))
        .map(|(x0, y0, x1, y1)| (x1 - x0, y1 - y0))
        .unwrap_or((mx1 - mx0, my1 - my0));
    let kernel = adaptive_kernel_size(region_w, region_h, KERNEL_FRACTION, MIN_KERNEL, MAX_KERNEL);

    let margin = kernel + feather_px.max(0) as u32;
    let x0 = mx0.saturating_sub(margin);
    let y0 = my0.saturating_sub(margin);
    let x1 = (mx1 + margin).min(width);
    let y1 = (my1 + margin).min(height);

    let roi = imageops::crop_imm(frame, x0, y0, x1 - x0, y1 - y0).to_image();
    let roi_mask = imageops::crop_imm(mask, x0, y0, x1 - x0, y1 - y0).to_image();

    let blurred = blur_region(&roi, mode, kernel);
    let alpha = build_alpha_from_mask(&roi_mask, feather_px);

    for (x, y, a) in alpha.enumerate_pixels() {
        let a = a[0];
        if a <= 0.0 {
            continue;
        }
        let orig = *frame.get_pixel(x0 + x, y0 + y);
        let soft = blurred.get_pixel(x, y);
        let blended = Rgb(std::array::from_fn(|c| {
            (a * soft[c] as f32 + (1.0 - a) * orig[c] as f32)
                .round()
                .clamp(0.0, 255.0) as u8
        }));
        frame.put_pixel(x0 + x, y0 + y, blended);
    }
}

/// Run one blur transform over a whole image.
pub fn blur_region(image: &RgbImage, mode: BlurMode, kernel: u32) -> RgbImage {
    match mode {
        BlurMode::Gaussian => gaussian_blur_f32(image, gaussian_sigma(kernel)),
        BlurMode::Box => box_blur(image, kernel / 2),
        BlurMode::Bilateral => bilateral(image),
        BlurMode::Mosaic => mosaic(image, (kernel / 3).max(2)),
    }
}

/// Sigma matching a Gaussian kernel of the given size.
fn gaussian_sigma(kernel: u32) -> f32 {
    0.3 * ((kernel as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

fn box_blur(image: &RgbImage, radius: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    let channels: Vec<GrayImage> = (0..3)
        .map(|c| {
            let plane = GrayImage::from_fn(width, height, |x, y| Luma([image.get_pixel(x, y)[c]]));
            box_filter(&plane, radius, radius)
        })
        .collect();

    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            channels[0].get_pixel(x, y)[0],
            channels[1].get_pixel(x, y)[0],
            channels[2].get_pixel(x, y)[0],
        ])
    })
}

/// Edge-preserving smoothing with a fixed 9 px window.
///
/// Color distance is the L1 norm over the three channels.
fn bilateral(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let radius = BILATERAL_DIAMETER / 2;

    let space_coeff = -0.5 / (BILATERAL_SIGMA_SPACE * BILATERAL_SIGMA_SPACE);
    let color_coeff = -0.5 / (BILATERAL_SIGMA_COLOR * BILATERAL_SIGMA_COLOR);

    let mut taps = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = (dx * dx + dy * dy) as f32;
            if r2 <= (radius * radius) as f32 {
                taps.push((dx, dy, (r2 * space_coeff).exp()));
            }
        }
    }
    let color_weights: Vec<f32> = (0..=255 * 3)
        .map(|d| ((d * d) as f32 * color_coeff).exp())
        .collect();

    let max_x = width as i32 - 1;
    let max_y = height as i32 - 1;

    RgbImage::from_fn(width, height, |x, y| {
        let center = image.get_pixel(x, y);
        let mut sum = [0.0f32; 3];
        let mut total = 0.0f32;

        for &(dx, dy, space_weight) in &taps {
            let nx = (x as i32 + dx).clamp(0, max_x) as u32;
            let ny = (y as i32 + dy).clamp(0, max_y) as u32;
            let neighbor = image.get_pixel(nx, ny);

            let distance: usize = (0..3)
                .map(|c| (neighbor[c] as i32 - center[c] as i32).unsigned_abs() as usize)
                .sum();
            let weight = space_weight * color_weights[distance];

            for c in 0..3 {
                sum[c] += weight * neighbor[c] as f32;
            }
            total += weight;
        }

        Rgb(std::array::from_fn(|c| {
            (sum[c] / total).round().clamp(0.0, 255.0) as u8
        }))
    })
}

/// Blocky pixelation: area-downsample by `cell`, then nearest-neighbour upsample.
fn mosaic(image: &RgbImage, cell: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    let small_w = width.div_ceil(cell).max(1);
    let small_h = height.div_ceil(cell).max(1);

    let small = imageops::resize(image, small_w, small_h, FilterType::Triangle);
    imageops::resize(&small, width, height, FilterType::Nearest)
}
