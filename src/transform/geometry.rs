//! Bounding box filtering, padding and clamping.

use serde::{Deserialize, Serialize};

/// Regions narrower or shorter than this (in pixels) are skipped.
pub const MIN_REGION_SIDE: i64 = 20;

/// Regions with fewer pixels than this are skipped.
pub const MIN_REGION_AREA: i64 = 400;

/// Axis-aligned box `(x_min, y_min, x_max, y_max)` in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: i64,
    pub y_min: i64,
    pub x_max: i64,
    pub y_max: i64,
}

impl BoundingBox {
    pub fn new(x_min: i64, y_min: i64, x_max: i64, y_max: i64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    pub fn width(&self) -> i64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> i64 {
        self.y_max - self.y_min
    }

    /// Whether a region with this box and pixel `area` is large enough to augment.
    pub fn passes_size_filter(&self, area: i64) -> bool {
        self.width() >= MIN_REGION_SIDE && self.height() >= MIN_REGION_SIDE && area >= MIN_REGION_AREA
    }

    /// Grow by `padding` on all sides, then clamp into a `width` x `height` image.
    ///
    /// Maxima are capped at `width`/`height` (not `width - 1`), so the result
    /// satisfies `0 <= x_min <= x_max <= width` and `0 <= y_min <= y_max <= height`.
    pub fn padded_and_clamped(&self, padding: i64, width: u32, height: u32) -> Self {
        let (w, h) = (i64::from(width), i64::from(height));
        let x_max = (self.x_max + padding).clamp(0, w);
        let y_max = (self.y_max + padding).clamp(0, h);
        Self {
            x_min: (self.x_min - padding).clamp(0, x_max),
            y_min: (self.y_min - padding).clamp(0, y_max),
            x_max,
            y_max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_filter_boundaries() {
        // width == 20 is kept, width == 19 is not
        assert!(BoundingBox::new(0, 0, 20, 20).passes_size_filter(400));
        assert!(!BoundingBox::new(0, 0, 19, 20).passes_size_filter(400));
        assert!(!BoundingBox::new(0, 0, 20, 19).passes_size_filter(400));
        assert!(!BoundingBox::new(0, 0, 20, 20).passes_size_filter(399));
        assert!(BoundingBox::new(10, 10, 50, 50).passes_size_filter(1600));
    }

    #[test]
    fn test_padding_inside_image() {
        let bbox = BoundingBox::new(10, 10, 50, 50).padded_and_clamped(5, 64, 64);
        assert_eq!(bbox, BoundingBox::new(5, 5, 55, 55));
    }

    #[test]
    fn test_padding_clamped_at_borders() {
        let bbox = BoundingBox::new(3, 2, 60, 30).padded_and_clamped(20, 64, 40);
        assert_eq!(bbox, BoundingBox::new(0, 0, 64, 40));
    }

    #[test]
    fn test_zero_padding_is_identity_inside_image() {
        let bbox = BoundingBox::new(1, 2, 30, 40);
        assert_eq!(bbox.padded_and_clamped(0, 100, 100), bbox);
    }

    #[test]
    fn test_clamped_invariants_hold_for_many_boxes() {
        let (width, height) = (37u32, 23u32);
        for x_min in (-10..50).step_by(7) {
            for y_min in (-10..30).step_by(5) {
                for extent in [0, 1, 20, 45] {
                    for padding in [0, 5, 20] {
                        let bbox = BoundingBox::new(x_min, y_min, x_min + extent, y_min + extent)
                            .padded_and_clamped(padding, width, height);
                        assert!(0 <= bbox.x_min && bbox.x_min <= bbox.x_max);
                        assert!(bbox.x_max <= i64::from(width));
                        assert!(0 <= bbox.y_min && bbox.y_min <= bbox.y_max);
                        assert!(bbox.y_max <= i64::from(height));
                    }
                }
            }
        }
    }
}
