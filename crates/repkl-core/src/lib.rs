//! Asset resolution and repackaging engine for repkl.
//!
//! This crate ties the schema layer to the filesystem: it builds per-run
//! identifier resolvers over one or more mapped file sets (`Resolvers`),
//! computes the identifiers a target composition needs (`resolve_target_ids`),
//! synthesizes a new packing list and asset map scoped to them (`synthesize`),
//! and materializes the referenced files into a destination (`Materializer`).
//! `Repackager` runs the four stages in order.

pub mod config;
pub mod materialize;
pub mod repackage;
pub mod resolver;
pub mod synthesize;
pub mod target;

pub use config::RepackConfig;
pub use materialize::{check_destination, plan_assets, Action, MaterializedAsset, Materializer};
pub use repackage::{repackage, RepackageReport, RepackageRequest, Repackager};
pub use resolver::{
    build_resolvers, canonical_mapped_file_sets, infer_mapped_file_sets, DuplicatePolicy,
    ResolverBuilder, Resolvers,
};
pub use synthesize::{synthesize, ManifestDefaults, SynthesizedManifests};
pub use target::resolve_target_ids;

use repkl_schema::{Identifier, ManifestError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("manifest not found: {}", .0.display())]
    ManifestNotFound(PathBuf),
    #[error("manifest error: {0}")]
    Manifest(ManifestError),
    #[error(
        "manifest error: identifier {id} has conflicting records in {} and {}",
        first.display(),
        second.display()
    )]
    DuplicateIdentifier {
        id: Identifier,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("unresolved asset: {id} has no {table} entry in any mapped file set")]
    UnresolvedAsset {
        id: Identifier,
        table: &'static str,
    },
    #[error("I/O error on {}: {source}", path.display())]
    AssetIo {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid destination {}: {reason}", path.display())]
    InvalidDestination { path: PathBuf, reason: String },
    #[error("config error: {0}")]
    Config(String),
}

impl From<ManifestError> for CoreError {
    fn from(e: ManifestError) -> Self {
        match e {
            ManifestError::NotFound(path) => CoreError::ManifestNotFound(path),
            other => CoreError::Manifest(other),
        }
    }
}

impl CoreError {
    pub(crate) fn asset_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::AssetIo {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_not_found_is_routed_out_of_manifest_error() {
        let e: CoreError = ManifestError::NotFound(PathBuf::from("/d/ASSETMAP.xml")).into();
        assert!(matches!(e, CoreError::ManifestNotFound(_)));
        assert!(e.to_string().starts_with("manifest not found"));
    }

    #[test]
    fn malformed_manifest_keeps_manifest_prefix() {
        let e: CoreError = ManifestError::EmptyDocument.into();
        assert!(e.to_string().starts_with("manifest error:"));
    }

    #[test]
    fn duplicate_identifier_display() {
        let e = CoreError::DuplicateIdentifier {
            id: Identifier::new("urn:uuid:abc"),
            first: PathBuf::from("/a"),
            second: PathBuf::from("/b"),
        };
        let msg = e.to_string();
        assert!(msg.starts_with("manifest error:"));
        assert!(msg.contains("urn:uuid:abc"));
        assert!(msg.contains("/a") && msg.contains("/b"));
    }

    #[test]
    fn unresolved_asset_display() {
        let e = CoreError::UnresolvedAsset {
            id: Identifier::new("urn:uuid:missing"),
            table: "packing list",
        };
        assert!(e.to_string().contains("urn:uuid:missing"));
        assert!(e.to_string().contains("packing list"));
    }

    #[test]
    fn asset_io_display_names_path() {
        let e = CoreError::asset_io(
            "/dest/WAV.mxf",
            std::io::Error::new(std::io::ErrorKind::AlreadyExists, "exists"),
        );
        assert!(e.to_string().contains("/dest/WAV.mxf"));
    }
}
