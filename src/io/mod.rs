//! I/O operations for the run archive and the label manifests.

pub mod archive;
pub mod manifest;
pub(crate) mod store;

#[cfg(test)]
pub(crate) mod fixtures;

pub use archive::{Archive, Mask, MaskMetadata, Run};
pub use manifest::{
    image_id_from_path, read_manifest, write_manifest, Caption, ManifestPaths, Record,
};
pub use store::{node_path, open_filesystem_store};
