//! Region highlighting and the rotation x flip augmentation set.
//!
//! Every accepted region yields exactly 12 images: four rotations, each
//! written unflipped, flipped horizontally and flipped vertically. Flips are
//! applied to the rotated image.

use crate::error::ExtractError;
use crate::io::manifest::Record;
use crate::transform::BoundingBox;
use image::{imageops, DynamicImage, GrayImage, Rgb, RgbImage};
use ndarray::ArrayD;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Stroke width of the region marker.
pub const MARKER_THICKNESS: i64 = 6;

/// Region marker color (pure red, RGB order).
pub const MARKER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Clockwise rotation applied to the highlighted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [Rotation::R0, Rotation::R90, Rotation::R180, Rotation::R270];

    pub fn tag(self) -> &'static str {
        match self {
            Rotation::R0 => "r0",
            Rotation::R90 => "r90",
            Rotation::R180 => "r180",
            Rotation::R270 => "r270",
        }
    }

    pub fn apply(self, image: &RgbImage) -> RgbImage {
        match self {
            Rotation::R0 => image.clone(),
            Rotation::R90 => imageops::rotate90(image),
            Rotation::R180 => imageops::rotate180(image),
            // 270 clockwise == 90 counter-clockwise
            Rotation::R270 => imageops::rotate270(image),
        }
    }
}

/// Mirror applied after rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flip {
    None,
    /// Left-right mirror.
    Horizontal,
    /// Top-bottom mirror.
    Vertical,
}

impl Flip {
    pub const ALL: [Flip; 3] = [Flip::None, Flip::Horizontal, Flip::Vertical];

    pub fn tag(self) -> &'static str {
        match self {
            Flip::None => "",
            Flip::Horizontal => "fh",
            Flip::Vertical => "fv",
        }
    }

    pub fn apply(self, image: RgbImage) -> RgbImage {
        match self {
            Flip::None => image,
            Flip::Horizontal => imageops::flip_horizontal(&image),
            Flip::Vertical => imageops::flip_vertical(&image),
        }
    }
}

/// One rotation + flip combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Augmentation {
    pub rotation: Rotation,
    pub flip: Flip,
}

impl Augmentation {
    /// All 12 combinations, rotation-major.
    pub fn all() -> Vec<Augmentation> {
        Rotation::ALL
            .iter()
            .flat_map(|&rotation| Flip::ALL.iter().map(move |&flip| Augmentation { rotation, flip }))
            .collect()
    }

    /// `<mask>_bounded_<rot>[_<flip>].png`
    pub fn file_name(&self, mask_name: &str) -> String {
        match self.flip {
            Flip::None => format!("{}_bounded_{}.png", mask_name, self.rotation.tag()),
            flip => format!("{}_bounded_{}_{}.png", mask_name, self.rotation.tag(), flip.tag()),
        }
    }

    pub fn apply(&self, image: &RgbImage) -> RgbImage {
        self.flip.apply(self.rotation.apply(image))
    }
}

/// A normalized run image, single or three channel.
#[derive(Debug, Clone)]
pub enum RunImage {
    Gray(GrayImage),
    Rgb(RgbImage),
}

impl RunImage {
    /// Interpret a normalized `(H, W)`, `(H, W, 1)` or `(H, W, 3)` array.
    pub fn from_array(arr: &ArrayD<u8>) -> Result<Self, ExtractError> {
        let shape = arr.shape();
        let (height, width, channels) = match *shape {
            [h, w] => (h, w, 1),
            [h, w, c] if c == 1 || c == 3 => (h, w, c),
            _ => {
                return Err(ExtractError::Decode(format!(
                    "Unsupported image shape {:?}, expected (H, W), (H, W, 1) or (H, W, 3)",
                    shape
                )))
            }
        };
        let (width, height) = (dimension(width)?, dimension(height)?);
        let pixels: Vec<u8> = arr.iter().copied().collect();

        let image = if channels == 1 {
            GrayImage::from_raw(width, height, pixels).map(RunImage::Gray)
        } else {
            RgbImage::from_raw(width, height, pixels).map(RunImage::Rgb)
        };
        image.ok_or_else(|| {
            ExtractError::Decode(format!("Pixel buffer does not match shape {:?}", shape))
        })
    }

    pub fn width(&self) -> u32 {
        match self {
            RunImage::Gray(img) => img.width(),
            RunImage::Rgb(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            RunImage::Gray(img) => img.height(),
            RunImage::Rgb(img) => img.height(),
        }
    }

    /// Three-channel copy suitable for drawing a colored marker.
    pub fn to_rgb(&self) -> RgbImage {
        match self {
            RunImage::Gray(img) => DynamicImage::ImageLuma8(img.clone()).into_rgb8(),
            RunImage::Rgb(img) => img.clone(),
        }
    }

    /// Write as PNG, keeping the channel count.
    pub fn save_png(&self, path: &Path) -> Result<(), ExtractError> {
        let result = match self {
            RunImage::Gray(img) => img.save(path),
            RunImage::Rgb(img) => img.save(path),
        };
        result.map_err(|source| ExtractError::ImageWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn dimension(size: usize) -> Result<u32, ExtractError> {
    u32::try_from(size)
        .map_err(|_| ExtractError::Decode(format!("Image dimension {} too large", size)))
}

/// Paint an unfilled rectangle with corners `(x_min, y_min)` and `(x_max, y_max)`.
///
/// The stroke is centered on the box edges; pixels outside the image are skipped.
pub fn draw_rectangle(image: &mut RgbImage, bbox: &BoundingBox, thickness: i64, color: Rgb<u8>) {
    let half = thickness / 2;
    let band = |c: i64| (c - half, c - half + thickness - 1);

    let (left_lo, left_hi) = band(bbox.x_min);
    let (right_lo, right_hi) = band(bbox.x_max);
    let (top_lo, top_hi) = band(bbox.y_min);
    let (bottom_lo, bottom_hi) = band(bbox.y_max);

    let x_range = left_lo.max(0)..=right_hi.min(i64::from(image.width()) - 1);
    let y_range = top_lo.max(0)..=bottom_hi.min(i64::from(image.height()) - 1);

    for y in y_range {
        let on_horizontal = (top_lo..=top_hi).contains(&y) || (bottom_lo..=bottom_hi).contains(&y);
        for x in x_range.clone() {
            let on_vertical = (left_lo..=left_hi).contains(&x) || (right_lo..=right_hi).contains(&x);
            if on_horizontal || on_vertical {
                image.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Three-channel copy of `base` with the region marker drawn at `bbox`.
pub fn highlight_region(base: &RunImage, bbox: &BoundingBox) -> RgbImage {
    let mut bounded = base.to_rgb();
    draw_rectangle(&mut bounded, bbox, MARKER_THICKNESS, MARKER_COLOR);
    bounded
}

/// A written augmentation file.
#[derive(Debug, Clone)]
pub struct WrittenImage {
    pub path: PathBuf,
    pub bytes: u64,
    pub record: Record,
}

/// Write all 12 augmentations of `bounded` into `dir`.
///
/// Files are encoded in parallel; the result is in [`Augmentation::all`] order.
pub fn write_augmentations(
    bounded: &RgbImage,
    mask_name: &str,
    description: &str,
    dir: &Path,
) -> Result<Vec<WrittenImage>, ExtractError> {
    Augmentation::all()
        .par_iter()
        .map(|augmentation| {
            let path = dir.join(augmentation.file_name(mask_name));
            augmentation
                .apply(bounded)
                .save(&path)
                .map_err(|source| ExtractError::ImageWrite {
                    path: path.clone(),
                    source,
                })?;
            let bytes = std::fs::metadata(&path)
                .map(|m| m.len())
                .map_err(|e| ExtractError::filesystem(&path, e))?;
            let record = Record::new(&path, description);
            Ok(WrittenImage { path, bytes, record })
        })
        .collect()
}
