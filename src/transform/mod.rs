//! Image transformation: intensity normalization, region geometry and augmentation.

pub mod augment;
mod geometry;
mod normalize;

pub use augment::{
    draw_rectangle, highlight_region, write_augmentations, Augmentation, Flip, Rotation, RunImage,
    WrittenImage,
};
pub use geometry::{BoundingBox, MIN_REGION_AREA, MIN_REGION_SIDE};
pub use normalize::{normalize_to_u8, percentile_bounds};
