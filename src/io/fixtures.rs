//! Builders for small SABER archives used by tests.

use crate::io::store::node_path;
use ndarray::{Array2, ArrayD};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zarrs::array::ArrayBuilder;
use zarrs::filesystem::FilesystemStore;
use zarrs::group::GroupBuilder;

/// Attributes of a mask to write.
pub struct MaskSpec {
    pub name: String,
    pub bbox: [i64; 4],
    pub area: i64,
    pub description: String,
}

impl MaskSpec {
    pub fn new(name: &str, bbox: [i64; 4], area: i64, description: &str) -> Self {
        Self {
            name: name.to_string(),
            bbox,
            area,
            description: description.to_string(),
        }
    }
}

/// Writes a SABER-layout Zarr hierarchy on disk.
pub struct ArchiveBuilder {
    path: PathBuf,
    store: Arc<FilesystemStore>,
    mask_count: i64,
    image_shapes: HashMap<String, (usize, usize)>,
}

impl ArchiveBuilder {
    pub fn create(path: &Path) -> Self {
        std::fs::create_dir_all(path).unwrap();
        let store = Arc::new(FilesystemStore::new(path).unwrap());
        write_group(&store, "/", Map::new());
        Self {
            path: path.to_path_buf(),
            store,
            mask_count: 0,
            image_shapes: HashMap::new(),
        }
    }

    /// Add a run with a `uint16` image and an empty `masks` group.
    pub fn run_u16(mut self, name: &str, image: Array2<u16>) -> Self {
        self.run_group(name);
        let (h, w) = image.dim();
        self.image_shapes.insert(name.to_string(), (h, w));
        let array = ArrayBuilder::new(
            vec![h as u64, w as u64],
            vec![h as u64, w as u64],
            "uint16",
            0u16,
        )
        .build(self.store.clone(), &node_path(&[name, "image"]))
        .unwrap();
        array.store_metadata().unwrap();
        array.store_array_subset_ndarray(&[0, 0], image).unwrap();
        self
    }

    /// Add a run with a `float32` image of any dimensionality.
    pub fn run_f32(mut self, name: &str, image: ArrayD<f32>) -> Self {
        self.run_group(name);
        self.image_shapes
            .insert(name.to_string(), (image.shape()[0], image.shape()[1]));
        let shape: Vec<u64> = image.shape().iter().map(|&d| d as u64).collect();
        let origin = vec![0u64; shape.len()];
        let array = ArrayBuilder::new(shape.clone(), shape, "float32", 0f32)
            .build(self.store.clone(), &node_path(&[name, "image"]))
            .unwrap();
        array.store_metadata().unwrap();
        array.store_array_subset_ndarray(&origin, image).unwrap();
        self
    }

    /// Add a run whose `image` array is missing.
    pub fn run_without_image(self, name: &str) -> Self {
        self.run_group(name);
        self
    }

    /// Add a top-level group that has no `masks` sub-group.
    pub fn group_without_masks(self, name: &str) -> Self {
        write_group(&self.store, &node_path(&[name]), Map::new());
        self
    }

    /// Add a mask group with attributes and a mask array shaped like the run image.
    pub fn mask(mut self, run: &str, spec: MaskSpec) -> Self {
        self.mask_count += 1;
        let mut attrs = Map::new();
        attrs.insert("area".into(), json!(spec.area));
        attrs.insert("bbox".into(), json!(spec.bbox));
        attrs.insert("description".into(), json!(spec.description));
        attrs.insert(
            "hashtags".into(),
            Value::String(format!("[\"#{}\", \"#membrane\"]", spec.description)),
        );
        attrs.insert("segmentation_id".into(), json!(self.mask_count));
        attrs.insert("original_segmentation_id".into(), json!(100 + self.mask_count));

        let group_path = node_path(&[run, "masks", &spec.name]);
        write_group(&self.store, &group_path, attrs);

        // same height and width as the run image, 1 inside the bbox
        let (h, w) = self.image_shapes.get(run).copied().unwrap_or((4, 4));
        let [x_min, y_min, x_max, y_max] = spec.bbox;
        let mask = Array2::<u8>::from_shape_fn((h, w), |(y, x)| {
            let (x, y) = (x as i64, y as i64);
            u8::from(x >= x_min && x < x_max && y >= y_min && y < y_max)
        });
        let array = ArrayBuilder::new(vec![h as u64, w as u64], vec![h as u64, w as u64], "uint8", 0u8)
            .build(self.store.clone(), &node_path(&[run, "masks", &spec.name, "mask"]))
            .unwrap();
        array.store_metadata().unwrap();
        array.store_array_subset_ndarray(&[0, 0], mask).unwrap();
        self
    }

    pub fn finish(self) -> PathBuf {
        self.path
    }

    fn run_group(&self, name: &str) {
        write_group(&self.store, &node_path(&[name]), Map::new());
        write_group(&self.store, &node_path(&[name, "masks"]), Map::new());
    }
}

fn write_group(store: &Arc<FilesystemStore>, path: &str, attributes: Map<String, Value>) {
    let group = GroupBuilder::new()
        .attributes(attributes)
        .build(store.clone(), path)
        .unwrap();
    group.store_metadata().unwrap();
}

/// Write a one-run archive with Zarr v2 metadata (`.zgroup`/`.zattrs`/`.zarray`),
/// as produced by zarr-python. The image is `[[1, 2], [3, 4]]` as `<u2`.
pub fn write_v2_archive(path: &Path) -> PathBuf {
    let zgroup = json!({ "zarr_format": 2 });
    for group in ["", "run001", "run001/masks", "run001/masks/m1"] {
        let dir = path.join(group);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(".zgroup"), zgroup.to_string()).unwrap();
    }

    let attrs = json!({
        "area": 900,
        "bbox": [0, 0, 30, 30],
        "description": "membrane",
        "hashtags": "[\"#membrane\", \"#cell\"]",
        "original_segmentation_id": 7,
        "segmentation_id": 1,
    });
    std::fs::write(path.join("run001/masks/m1/.zattrs"), attrs.to_string()).unwrap();

    let image_dir = path.join("run001/image");
    std::fs::create_dir_all(&image_dir).unwrap();
    let zarray = json!({
        "zarr_format": 2,
        "shape": [2, 2],
        "chunks": [2, 2],
        "dtype": "<u2",
        "compressor": null,
        "fill_value": 0,
        "order": "C",
        "filters": null,
    });
    std::fs::write(image_dir.join(".zarray"), zarray.to_string()).unwrap();
    let chunk: Vec<u8> = [1u16, 2, 3, 4].iter().flat_map(|v| v.to_le_bytes()).collect();
    std::fs::write(image_dir.join("0.0"), chunk).unwrap();

    path.to_path_buf()
}
