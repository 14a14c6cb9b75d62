//! Manifest entities and the XML manifest codec for repkl.
//!
//! This crate defines the schema layer: typed asset maps (`AssetMap`), packing
//! lists (`PackingList`), and composition playlists (`Composition`), the
//! normalized `Identifier` that joins them, and the `ManifestCodec` trait with
//! its `quick-xml` implementation (`XmlCodec`).

pub mod asset_map;
pub mod codec;
pub mod composition;
pub mod packing_list;
pub mod types;
mod xml;

pub use asset_map::{AssetMap, AssetMapEntry, AM_2007_NS, ASSETMAP_FILENAME};
pub use codec::{
    parse_asset_map_file, parse_composition_file, parse_packing_list_file, read_manifest_file,
    ManifestCodec, XmlCodec,
};
pub use composition::Composition;
pub use packing_list::{PackingList, PackingListAsset, DEFAULT_HASH_ALGORITHM, PKL_2016_NS};
pub use types::{issue_timestamp, Identifier, UserText};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("manifest is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("manifest document has no root element")]
    EmptyDocument,
    #[error("failed to parse manifest: undeclared namespace prefix '{0}'")]
    UndeclaredPrefix(String),
    #[error("unexpected root element '{found}', expected '{expected}'")]
    UnexpectedRoot {
        expected: &'static str,
        found: String,
    },
    #[error("{document} is missing required element '{field}'")]
    MissingField {
        document: &'static str,
        field: &'static str,
    },
    #[error("{document} has invalid {field}: '{value}'")]
    InvalidField {
        document: &'static str,
        field: &'static str,
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_error_display_missing_field() {
        let e = ManifestError::MissingField {
            document: "packing list",
            field: "Hash",
        };
        assert_eq!(e.to_string(), "packing list is missing required element 'Hash'");
    }

    #[test]
    fn manifest_error_display_not_found() {
        let e = ManifestError::NotFound(PathBuf::from("/deliveries/a/ASSETMAP.xml"));
        assert!(e.to_string().contains("/deliveries/a/ASSETMAP.xml"));
    }

    #[test]
    fn manifest_error_display_unexpected_root() {
        let e = ManifestError::UnexpectedRoot {
            expected: "AssetMap",
            found: "PackingList".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("AssetMap"));
        assert!(msg.contains("PackingList"));
    }
}
