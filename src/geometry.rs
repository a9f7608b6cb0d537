//! PDF-space to viewport-space coordinate mapping.
//!
//! PDF rectangles are `[x1, y1, x2, y2]` with origin at the bottom-left;
//! viewport coordinates have origin at the top-left and may be scaled and
//! rotated. Mapping goes through the page's affine transform rather than a
//! hand-rolled y-flip so that pages with non-identity rotation map
//! correctly.

use thiserror::Error;

use crate::types::Bounds;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GeometryError {
    #[error("malformed rectangle: expected 4 components, got {0}")]
    MalformedRect(usize),
}

/// A page viewport carrying the point-conversion transform.
///
/// Mirrors the viewer-side viewport: built from the page box at a given
/// scale and rotation, with the transform expressed as the affine matrix
/// `[a, b, c, d, e, f]` applied as `(ax + cy + e, bx + dy + f)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scale: f64,
    pub rotation: i32,
    transform: [f64; 6],
}

impl Viewport {
    /// Build a viewport for a page of `page_width` x `page_height` PDF
    /// units at the given scale and rotation (degrees, multiple of 90).
    pub fn new(page_width: f64, page_height: f64, scale: f64, rotation: i32) -> Self {
        let rotation = rotation.rem_euclid(360);
        let (a, b, c, d) = match rotation {
            90 => (0.0, 1.0, 1.0, 0.0),
            180 => (-1.0, 0.0, 0.0, 1.0),
            270 => (0.0, -1.0, -1.0, 0.0),
            _ => (1.0, 0.0, 0.0, -1.0),
        };

        let cx = page_width / 2.0;
        let cy = page_height / 2.0;
        let (width, height, offset_x, offset_y) = if a == 0.0 {
            (page_height * scale, page_width * scale, cy * scale, cx * scale)
        } else {
            (page_width * scale, page_height * scale, cx * scale, cy * scale)
        };

        let transform = [
            a * scale,
            b * scale,
            c * scale,
            d * scale,
            offset_x - a * scale * cx - c * scale * cy,
            offset_y - b * scale * cx - d * scale * cy,
        ];

        Self {
            width,
            height,
            scale,
            rotation,
            transform,
        }
    }

    pub fn transform(&self) -> [f64; 6] {
        self.transform
    }

    /// Map a PDF-space point into viewport space.
    pub fn convert_to_viewport_point(&self, x: f64, y: f64) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.transform;
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// Map a viewport-space point back into PDF space.
    pub fn convert_to_pdf_point(&self, vx: f64, vy: f64) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.transform;
        let det = a * d - b * c;
        let dx = vx - e;
        let dy = vy - f;
        ((d * dx - c * dy) / det, (a * dy - b * dx) / det)
    }
}

/// Map a PDF rectangle into a viewport-space bounding box.
///
/// The top-left viewport corner derives from `(x1, y2)`, the bottom-right
/// from `(x2, y1)`; width and height are the resulting deltas.
pub fn rect_to_viewport(rect: &[f64], viewport: &Viewport) -> Result<Bounds, GeometryError> {
    if rect.len() < 4 {
        return Err(GeometryError::MalformedRect(rect.len()));
    }
    let (x1, y1, x2, y2) = (rect[0], rect[1], rect[2], rect[3]);
    let (left, top) = viewport.convert_to_viewport_point(x1, y2);
    let (right, bottom) = viewport.convert_to_viewport_point(x2, y1);
    Ok(Bounds {
        left,
        top,
        width: right - left,
        height: bottom - top,
    })
}

/// Inverse of [`rect_to_viewport`] for axis-aligned, unrotated pages.
pub fn bounds_to_rect(bounds: &Bounds, viewport: &Viewport) -> [f64; 4] {
    let (x1, y2) = viewport.convert_to_pdf_point(bounds.left, bounds.top);
    let (x2, y1) =
        viewport.convert_to_pdf_point(bounds.left + bounds.width, bounds.top + bounds.height);
    [x1, y1, x2, y2]
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn letter_page_rect_maps_to_viewport_box() {
        // 612x792 letter page at unit scale, no rotation.
        let vp = Viewport::new(612.0, 792.0, 1.0, 0);
        let bounds = rect_to_viewport(&[100.0, 700.0, 300.0, 750.0], &vp).unwrap();
        assert!((bounds.left - 100.0).abs() < EPS);
        assert!((bounds.top - 42.0).abs() < EPS); // 792 - 750
        assert!((bounds.width - 200.0).abs() < EPS);
        assert!((bounds.height - 50.0).abs() < EPS);

        // Top-left Y must agree with the page's own point conversion.
        let (_, top) = vp.convert_to_viewport_point(100.0, 750.0);
        assert!((bounds.top - top).abs() < EPS);
    }

    #[test]
    fn unrotated_transform_is_scaled_flip() {
        let vp = Viewport::new(612.0, 792.0, 2.0, 0);
        assert_eq!(vp.transform(), [2.0, 0.0, 0.0, -2.0, 0.0, 1584.0]);
        assert!((vp.width - 1224.0).abs() < EPS);
        assert!((vp.height - 1584.0).abs() < EPS);
    }

    #[test]
    fn rotation_swaps_viewport_dimensions() {
        let vp = Viewport::new(612.0, 792.0, 1.0, 90);
        assert!((vp.width - 792.0).abs() < EPS);
        assert!((vp.height - 612.0).abs() < EPS);
        // 90-degree rotation maps (x, y) -> (y, x).
        let (vx, vy) = vp.convert_to_viewport_point(10.0, 20.0);
        assert!((vx - 20.0).abs() < EPS);
        assert!((vy - 10.0).abs() < EPS);
    }

    #[test]
    fn negative_rotation_normalizes() {
        let vp = Viewport::new(612.0, 792.0, 1.0, -90);
        assert_eq!(vp.rotation, 270);
    }

    #[test]
    fn round_trip_recovers_rect() {
        let vp = Viewport::new(612.0, 792.0, 1.5, 0);
        let rect = [72.5, 640.25, 310.75, 701.5];
        let bounds = rect_to_viewport(&rect, &vp).unwrap();
        let back = bounds_to_rect(&bounds, &vp);
        for (orig, recovered) in rect.iter().zip(back.iter()) {
            assert!((orig - recovered).abs() < EPS);
        }
    }

    #[test]
    fn point_round_trip_under_rotation() {
        for rotation in [0, 90, 180, 270] {
            let vp = Viewport::new(612.0, 792.0, 1.25, rotation);
            let (vx, vy) = vp.convert_to_viewport_point(123.4, 567.8);
            let (x, y) = vp.convert_to_pdf_point(vx, vy);
            assert!((x - 123.4).abs() < EPS, "rotation {rotation}");
            assert!((y - 567.8).abs() < EPS, "rotation {rotation}");
        }
    }

    #[test]
    fn short_rect_is_rejected() {
        let vp = Viewport::new(612.0, 792.0, 1.0, 0);
        assert_eq!(
            rect_to_viewport(&[1.0, 2.0, 3.0], &vp),
            Err(GeometryError::MalformedRect(3))
        );
    }
}
