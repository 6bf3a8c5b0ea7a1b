//! Region boxes and binary masks.

use image::{GrayImage, Luma};
use imageproc::drawing::{draw_filled_ellipse_mut, draw_filled_rect_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;
use vamos_models::BoundingBox;

const MASK_ON: Luma<u8> = Luma([255]);

/// Shape rasterized into a region mask.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionShape {
    Rectangle,
    /// Ellipse inscribed in the box
    Ellipse,
    /// Closed outline in frame pixel coordinates
    Polygon(Vec<(f64, f64)>),
}

/// Grow `bbox` by `pad_ratio` of its extent on each side, clamped to the frame.
pub fn expand_box(bbox: &BoundingBox, pad_ratio: f64, width: u32, height: u32) -> BoundingBox {
    let pad_x = bbox.width.max(0.0) * pad_ratio.max(0.0);
    let pad_y = bbox.height.max(0.0) * pad_ratio.max(0.0);
    BoundingBox::new(
        bbox.x - pad_x,
        bbox.y - pad_y,
        bbox.width + 2.0 * pad_x,
        bbox.height + 2.0 * pad_y,
    )
    .clamp_to(width, height)
}

/// Integer pixel span `[x0, x1) x [y0, y1)` covered by `bbox`, if any.
pub(crate) fn pixel_span(
    bbox: &BoundingBox,
    width: u32,
    height: u32,
) -> Option<(u32, u32, u32, u32)> {
    let clamped = bbox.clamp_to(width, height);
    let x0 = clamped.x.floor() as u32;
    let y0 = clamped.y.floor() as u32;
    let x1 = (clamped.x2().ceil() as u32).min(width);
    let y1 = (clamped.y2().ceil() as u32).min(height);
    (x1 > x0 && y1 > y0).then_some((x0, y0, x1, y1))
}

/// Rasterize `shape` within `bbox` into a `width x height` 0/255 mask.
pub fn mask_from_region(
    shape: &RegionShape,
    bbox: &BoundingBox,
    width: u32,
    height: u32,
) -> GrayImage {
    let mut mask = GrayImage::new(width, height);

    match shape {
        RegionShape::Rectangle => fill_rect(&mut mask, bbox),
        RegionShape::Ellipse => {
            let Some((x0, y0, x1, y1)) = pixel_span(bbox, width, height) else {
                return mask;
            };
            let center = (
                ((x0 + x1) / 2) as i32,
                ((y0 + y1) / 2) as i32,
            );
            let rx = (((x1 - x0) / 2) as i32).max(1);
            let ry = (((y1 - y0) / 2) as i32).max(1);
            draw_filled_ellipse_mut(&mut mask, center, rx, ry, MASK_ON);
        }
        RegionShape::Polygon(points) => {
            let mut vertices: Vec<Point<i32>> = Vec::with_capacity(points.len());
            for &(x, y) in points {
                let p = Point::new(x.round() as i32, y.round() as i32);
                if vertices.last() != Some(&p) {
                    vertices.push(p);
                }
            }
            while vertices.len() > 1 && vertices.first() == vertices.last() {
                vertices.pop();
            }

            if vertices.len() >= 3 {
                draw_polygon_mut(&mut mask, &vertices, MASK_ON);
            } else {
                fill_rect(&mut mask, bbox);
            }
        }
    }

    mask
}

fn fill_rect(mask: &mut GrayImage, bbox: &BoundingBox) {
    let (width, height) = mask.dimensions();
    if let Some((x0, y0, x1, y1)) = pixel_span(bbox, width, height) {
        let rect = Rect::at(x0 as i32, y0 as i32).of_size(x1 - x0, y1 - y0);
        draw_filled_rect_mut(mask, rect, MASK_ON);
    }
}

/// Bounding span of the non-zero pixels of `mask`.
pub(crate) fn mask_bounds(mask: &GrayImage) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, px) in mask.enumerate_pixels() {
        if px[0] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x + 1, y + 1),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x + 1), y1.max(y + 1)),
        });
    }
    bounds
}
