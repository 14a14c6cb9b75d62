use crate::xml::{finish_document, new_document, parse_document};
use crate::{AssetMap, Composition, ManifestError, PackingList};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Conversion between manifest documents and typed entities.
///
/// Implementations own all namespace handling: entities never carry
/// namespace URIs, and identifiers come out already normalized.
pub trait ManifestCodec {
    fn parse_asset_map(&self, input: &[u8]) -> Result<AssetMap, ManifestError>;

    fn parse_packing_list(&self, input: &[u8]) -> Result<PackingList, ManifestError>;

    fn parse_composition(&self, input: &[u8]) -> Result<Composition, ManifestError>;

    fn serialize_asset_map(&self, asset_map: &AssetMap) -> Result<Vec<u8>, ManifestError>;

    fn serialize_packing_list(&self, packing_list: &PackingList)
        -> Result<Vec<u8>, ManifestError>;
}

/// `quick-xml` backed codec for SMPTE asset maps, packing lists, and
/// composition playlists.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlCodec;

impl ManifestCodec for XmlCodec {
    fn parse_asset_map(&self, input: &[u8]) -> Result<AssetMap, ManifestError> {
        AssetMap::from_element(&parse_document(input)?)
    }

    fn parse_packing_list(&self, input: &[u8]) -> Result<PackingList, ManifestError> {
        PackingList::from_element(&parse_document(input)?)
    }

    fn parse_composition(&self, input: &[u8]) -> Result<Composition, ManifestError> {
        Composition::from_element(&parse_document(input)?)
    }

    fn serialize_asset_map(&self, asset_map: &AssetMap) -> Result<Vec<u8>, ManifestError> {
        let mut w = new_document()?;
        asset_map.write_xml(&mut w)?;
        Ok(finish_document(w))
    }

    fn serialize_packing_list(
        &self,
        packing_list: &PackingList,
    ) -> Result<Vec<u8>, ManifestError> {
        let mut w = new_document()?;
        packing_list.write_xml(&mut w)?;
        Ok(finish_document(w))
    }
}

/// Read a manifest file, mapping a missing file to [`ManifestError::NotFound`].
pub fn read_manifest_file(path: impl AsRef<Path>) -> Result<Vec<u8>, ManifestError> {
    let path = path.as_ref();
    fs::read(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            ManifestError::NotFound(path.to_path_buf())
        } else {
            ManifestError::Io(e)
        }
    })
}

pub fn parse_asset_map_file(
    codec: &impl ManifestCodec,
    path: impl AsRef<Path>,
) -> Result<AssetMap, ManifestError> {
    codec.parse_asset_map(&read_manifest_file(path)?)
}

pub fn parse_packing_list_file(
    codec: &impl ManifestCodec,
    path: impl AsRef<Path>,
) -> Result<PackingList, ManifestError> {
    codec.parse_packing_list(&read_manifest_file(path)?)
}

pub fn parse_composition_file(
    codec: &impl ManifestCodec,
    path: impl AsRef<Path>,
) -> Result<Composition, ManifestError> {
    codec.parse_composition(&read_manifest_file(path)?)
}
