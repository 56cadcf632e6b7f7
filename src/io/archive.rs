//! Read-only accessor over a SABER Zarr archive.
//!
//! Layout:
//!
//! ```text
//! /<run>/image                  intensity array
//! /<run>/masks/<mask>           group carrying mask attributes
//! /<run>/masks/<mask>/mask      mask array
//! ```
//!
//! Nothing is cached: every accessor reads the store at call time.

use crate::error::ExtractError;
use crate::io::store::{child_groups, is_group, node_path, open_filesystem_store};
use crate::transform::BoundingBox;
use ndarray::ArrayD;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zarrs::array::{Array, DataType};
use zarrs::filesystem::FilesystemStore;
use zarrs::group::Group;

const MASKS_GROUP: &str = "masks";
const IMAGE_ARRAY: &str = "image";
const MASK_ARRAY: &str = "mask";

/// Root handle over a SABER archive.
pub struct Archive {
    root_path: PathBuf,
    store: Arc<FilesystemStore>,
}

impl Archive {
    /// Open the archive at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ExtractError> {
        let root_path = path.as_ref().to_path_buf();
        let store = open_filesystem_store(&root_path)?;
        Ok(Self { root_path, store })
    }

    /// Path the archive was opened from.
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Names of all runs, sorted. A run is a top-level group with a `masks` sub-group.
    pub fn run_names(&self) -> Result<Vec<String>, ExtractError> {
        Ok(child_groups(&self.store, "/")?
            .into_iter()
            .filter(|name| is_group(&self.store, &node_path(&[name, MASKS_GROUP])))
            .collect())
    }

    /// All runs, in the same order as [`Archive::run_names`].
    pub fn runs(&self) -> Result<Vec<Run>, ExtractError> {
        Ok(self
            .run_names()?
            .into_iter()
            .map(|name| Run::new(name, self.store.clone()))
            .collect())
    }

    /// Number of runs.
    pub fn num_runs(&self) -> Result<usize, ExtractError> {
        Ok(self.run_names()?.len())
    }

    /// Run at position `index` of the sorted run listing.
    pub fn run_at(&self, index: usize) -> Result<Run, ExtractError> {
        let names = self.run_names()?;
        let count = names.len();
        names
            .into_iter()
            .nth(index)
            .map(|name| Run::new(name, self.store.clone()))
            .ok_or_else(|| {
                ExtractError::NotFound(format!(
                    "Run index {} out of range ({} runs in '{}')",
                    index,
                    count,
                    self.root_path.display()
                ))
            })
    }

    /// Look up a run by name.
    pub fn get_run(&self, name: &str) -> Result<Run, ExtractError> {
        if !self.run_names()?.iter().any(|n| n == name) {
            return Err(ExtractError::NotFound(format!(
                "Run '{}' does not exist in '{}'",
                name,
                self.root_path.display()
            )));
        }
        Ok(Run::new(name.to_string(), self.store.clone()))
    }
}

/// One imaging acquisition: an intensity image plus labeled masks.
#[derive(Clone)]
pub struct Run {
    name: String,
    store: Arc<FilesystemStore>,
}

impl Run {
    fn new(name: String, store: Arc<FilesystemStore>) -> Self {
        Self { name, store }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw intensity data, converted to `f64`.
    pub fn image_array(&self) -> Result<ArrayD<f64>, ExtractError> {
        read_numeric_array(&self.store, &node_path(&[&self.name, IMAGE_ARRAY]))
    }

    /// Names of the run's masks, sorted.
    pub fn mask_names(&self) -> Result<Vec<String>, ExtractError> {
        child_groups(&self.store, &node_path(&[&self.name, MASKS_GROUP]))
    }

    pub fn masks(&self) -> Result<Vec<Mask>, ExtractError> {
        Ok(self
            .mask_names()?
            .into_iter()
            .map(|name| Mask::new(self.name.clone(), name, self.store.clone()))
            .collect())
    }

    pub fn get_mask(&self, name: &str) -> Result<Mask, ExtractError> {
        if !self.mask_names()?.iter().any(|n| n == name) {
            return Err(ExtractError::NotFound(format!(
                "Mask '{}' does not exist in run '{}'",
                name, self.name
            )));
        }
        Ok(Mask::new(self.name.clone(), name.to_string(), self.store.clone()))
    }
}

/// All attributes of a mask, read in one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskMetadata {
    pub area: i64,
    pub bbox: BoundingBox,
    pub description: String,
    pub hashtags: Vec<String>,
    pub original_segmentation_id: i64,
    pub segmentation_id: i64,
}

/// A labeled region of a run.
#[derive(Clone)]
pub struct Mask {
    run_name: String,
    name: String,
    store: Arc<FilesystemStore>,
}

impl Mask {
    fn new(run_name: String, name: String, store: Arc<FilesystemStore>) -> Self {
        Self {
            run_name,
            name,
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    fn group_path(&self) -> String {
        node_path(&[&self.run_name, MASKS_GROUP, &self.name])
    }

    fn attributes(&self) -> Result<Map<String, Value>, ExtractError> {
        let path = self.group_path();
        let group = Group::open(self.store.clone(), &path)
            .map_err(|e| ExtractError::NotFound(format!("Mask group '{}': {}", path, e)))?;
        Ok(group.attributes().clone())
    }

    fn attribute<T: DeserializeOwned>(&self, key: &str) -> Result<T, ExtractError> {
        parse_attribute(&self.attributes()?, key, &self.group_path())
    }

    /// Pixel count of the mask.
    pub fn area(&self) -> Result<i64, ExtractError> {
        self.attribute("area")
    }

    /// Bounding box `(x_min, y_min, x_max, y_max)` in image coordinates.
    pub fn bbox(&self) -> Result<BoundingBox, ExtractError> {
        let [x_min, y_min, x_max, y_max]: [i64; 4] = self.attribute("bbox")?;
        Ok(BoundingBox::new(x_min, y_min, x_max, y_max))
    }

    /// Free-text caption of the region.
    pub fn description(&self) -> Result<String, ExtractError> {
        self.attribute("description")
    }

    /// Hashtags, decoded from their text-encoded list.
    pub fn hashtags(&self) -> Result<Vec<String>, ExtractError> {
        parse_hashtags(&self.attributes()?, &self.group_path())
    }

    pub fn original_segmentation_id(&self) -> Result<i64, ExtractError> {
        self.attribute("original_segmentation_id")
    }

    pub fn segmentation_id(&self) -> Result<i64, ExtractError> {
        self.attribute("segmentation_id")
    }

    /// Every attribute at once, from a single metadata read.
    pub fn metadata(&self) -> Result<MaskMetadata, ExtractError> {
        let attrs = self.attributes()?;
        let path = self.group_path();
        let [x_min, y_min, x_max, y_max]: [i64; 4] = parse_attribute(&attrs, "bbox", &path)?;

        Ok(MaskMetadata {
            area: parse_attribute(&attrs, "area", &path)?,
            bbox: BoundingBox::new(x_min, y_min, x_max, y_max),
            description: parse_attribute(&attrs, "description", &path)?,
            hashtags: parse_hashtags(&attrs, &path)?,
            original_segmentation_id: parse_attribute(&attrs, "original_segmentation_id", &path)?,
            segmentation_id: parse_attribute(&attrs, "segmentation_id", &path)?,
        })
    }

    /// The mask array itself, converted to `f64`.
    pub fn mask_array(&self) -> Result<ArrayD<f64>, ExtractError> {
        read_numeric_array(
            &self.store,
            &node_path(&[&self.run_name, MASKS_GROUP, &self.name, MASK_ARRAY]),
        )
    }
}

fn parse_attribute<T: DeserializeOwned>(
    attrs: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<T, ExtractError> {
    let value = attrs
        .get(key)
        .ok_or_else(|| ExtractError::Decode(format!("{}: missing attribute '{}'", path, key)))?;
    serde_json::from_value(value.clone())
        .map_err(|e| ExtractError::decode(format!("{} attribute '{}'", path, key), e))
}

fn parse_hashtags(attrs: &Map<String, Value>, path: &str) -> Result<Vec<String>, ExtractError> {
    match attrs.get("hashtags") {
        Some(Value::String(encoded)) => serde_json::from_str(encoded)
            .map_err(|e| ExtractError::decode(format!("{} attribute 'hashtags'", path), e)),
        Some(_) => parse_attribute(attrs, "hashtags", path),
        None => Err(ExtractError::Decode(format!(
            "{}: missing attribute 'hashtags'",
            path
        ))),
    }
}

macro_rules! retrieve_as_f64 {
    ($array:expr, $path:expr, $t:ty) => {
        $array
            .retrieve_array_subset_ndarray::<$t>(&$array.subset_all())
            .map(|data| data.mapv(|v| v as f64))
            .map_err(|e| ExtractError::decode(format!("Reading array '{}'", $path), e))
    };
}

/// Read a whole numeric array of any integer or float data type as `f64`.
fn read_numeric_array(store: &Arc<FilesystemStore>, path: &str) -> Result<ArrayD<f64>, ExtractError> {
    let array = Array::open(store.clone(), path)
        .map_err(|e| ExtractError::NotFound(format!("Array '{}': {}", path, e)))?;

    match array.data_type() {
        DataType::Int8 => retrieve_as_f64!(array, path, i8),
        DataType::Int16 => retrieve_as_f64!(array, path, i16),
        DataType::Int32 => retrieve_as_f64!(array, path, i32),
        DataType::Int64 => retrieve_as_f64!(array, path, i64),
        DataType::UInt8 => retrieve_as_f64!(array, path, u8),
        DataType::UInt16 => retrieve_as_f64!(array, path, u16),
        DataType::UInt32 => retrieve_as_f64!(array, path, u32),
        DataType::UInt64 => retrieve_as_f64!(array, path, u64),
        DataType::Float32 => retrieve_as_f64!(array, path, f32),
        DataType::Float64 => retrieve_as_f64!(array, path, f64),
        other => Err(ExtractError::Decode(format!(
            "Array '{}' has unsupported data type {:?}",
            path, other
        ))),
    }
}
