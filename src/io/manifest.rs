//! Corpus records and the JSON label manifests.

use crate::error::ExtractError;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Caption of a record.
///
/// Records are generated with a one-element sequence; the training manifest
/// collapses it to the bare string, the trainer depends on that asymmetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Caption {
    Text(String),
    Sequence(Vec<String>),
}

impl Caption {
    /// Collapse to the first caption string.
    pub fn into_text(self) -> Self {
        match self {
            Caption::Text(text) => Caption::Text(text),
            Caption::Sequence(items) => {
                Caption::Text(items.into_iter().next().unwrap_or_default())
            }
        }
    }
}

/// One image/caption pair of the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub image: String,
    pub image_id: String,
    pub caption: Caption,
}

impl Record {
    /// Build a record for an image file, deriving its id from the path.
    pub fn new(image_path: &Path, description: &str) -> Self {
        let image = image_path.to_string_lossy().into_owned();
        Self {
            image_id: image_id_from_path(&image),
            image,
            caption: Caption::Sequence(vec![description.to_string()]),
        }
    }
}

/// Path separators become `_` and the `.png` extension is dropped.
///
/// Ids are not guaranteed unique across runs.
pub fn image_id_from_path(path: &str) -> String {
    path.replace(['/', '\\'], "_").replace(".png", "")
}

/// Locations of the three split manifests inside an output folder.
#[derive(Debug, Clone)]
pub struct ManifestPaths {
    pub train: PathBuf,
    pub val: PathBuf,
    pub test: PathBuf,
}

impl ManifestPaths {
    pub fn new(output_folder: &Path) -> Self {
        Self {
            train: output_folder.join("labels_train.json"),
            val: output_folder.join("labels_val.json"),
            test: output_folder.join("labels_test.json"),
        }
    }
}

/// Write `records` as a JSON array with 4-space indentation.
pub fn write_manifest(path: &Path, records: &[Record]) -> Result<(), ExtractError> {
    let file = std::fs::File::create(path).map_err(|e| ExtractError::filesystem(path, e))?;
    let mut writer = std::io::BufWriter::new(file);

    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    records
        .serialize(&mut serializer)
        .map_err(|e| ExtractError::filesystem(path, std::io::Error::other(e)))?;

    writer.flush().map_err(|e| ExtractError::filesystem(path, e))?;
    tracing::debug!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// Read a manifest back.
pub fn read_manifest(path: &Path) -> Result<Vec<Record>, ExtractError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ExtractError::filesystem(path, e))?;
    serde_json::from_str(&contents)
        .map_err(|e| ExtractError::decode(format!("Manifest '{}'", path.display()), e))
}
