use crate::types::{issue_timestamp, Identifier, UserText};
use crate::xml::{self, Element, XmlWriter};
use crate::ManifestError;
use serde::Serialize;

/// SMPTE ST 429-9:2007 asset map namespace, used when writing.
pub const AM_2007_NS: &str = "http://www.smpte-ra.org/schemas/429-9/2007/AM";

/// Conventional filename of the asset map at the root of a mapped file set.
pub const ASSETMAP_FILENAME: &str = "ASSETMAP.xml";

const DOC: &str = "asset map";

/// One row of an asset map: where a resource lives, and whether it is a
/// packing list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetMapEntry {
    pub id: Identifier,
    pub path: String,
    pub is_packing_list: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetMap {
    pub id: Identifier,
    pub creator: UserText,
    pub issuer: UserText,
    pub issue_date: String,
    pub annotation: Option<UserText>,
    pub assets: Vec<AssetMapEntry>,
}

impl AssetMap {
    /// A new, empty asset map with a fresh identifier and the current time.
    pub fn new(creator: UserText, issuer: UserText) -> Self {
        Self {
            id: Identifier::generate(),
            creator,
            issuer,
            issue_date: issue_timestamp(),
            annotation: None,
            assets: Vec::new(),
        }
    }

    pub fn find(&self, id: &Identifier) -> Option<&AssetMapEntry> {
        self.assets.iter().find(|a| a.id == *id)
    }

    pub fn packing_lists(&self) -> impl Iterator<Item = &AssetMapEntry> {
        self.assets.iter().filter(|a| a.is_packing_list)
    }

    pub(crate) fn from_element(root: &Element) -> Result<Self, ManifestError> {
        expect_root(root, "AssetMap")?;
        let ns = root.namespace.as_deref();

        let assets = root
            .descendants(ns, "Asset")
            .into_iter()
            .map(|e| entry_from_element(e, ns))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: Identifier::new(&root.required_child(ns, "Id", DOC)?.text),
            creator: root.required_child(ns, "Creator", DOC)?.user_text(),
            issuer: root.required_child(ns, "Issuer", DOC)?.user_text(),
            issue_date: root.required_child(ns, "IssueDate", DOC)?.text.clone(),
            annotation: root.child(ns, "AnnotationText").map(Element::user_text),
            assets,
        })
    }

    pub(crate) fn write_xml(&self, w: &mut XmlWriter) -> Result<(), quick_xml::Error> {
        xml::start(w, "AssetMap", &[("xmlns", AM_2007_NS)])?;
        xml::text_element(w, "Id", &self.id, None)?;
        if let Some(annotation) = &self.annotation {
            xml::user_text_element(w, "AnnotationText", annotation)?;
        }
        xml::user_text_element(w, "Creator", &self.creator)?;
        xml::text_element(w, "VolumeCount", "1", None)?;
        xml::text_element(w, "IssueDate", &self.issue_date, None)?;
        xml::user_text_element(w, "Issuer", &self.issuer)?;

        xml::start(w, "AssetList", &[])?;
        for asset in &self.assets {
            xml::start(w, "Asset", &[])?;
            xml::text_element(w, "Id", &asset.id, None)?;
            if asset.is_packing_list {
                xml::text_element(w, "PackingList", "true", None)?;
            }
            xml::start(w, "ChunkList", &[])?;
            xml::start(w, "Chunk", &[])?;
            xml::text_element(w, "Path", &asset.path, None)?;
            xml::end(w, "Chunk")?;
            xml::end(w, "ChunkList")?;
            xml::end(w, "Asset")?;
        }
        xml::end(w, "AssetList")?;

        xml::end(w, "AssetMap")
    }
}

fn entry_from_element(asset: &Element, ns: Option<&str>) -> Result<AssetMapEntry, ManifestError> {
    let is_packing_list = asset.child(ns, "PackingList").is_some_and(|e| {
        let flag = e.text.to_ascii_lowercase();
        flag == "true" || flag == "1"
    });
    let path = asset
        .first_descendant(ns, "Path")
        .ok_or(ManifestError::MissingField {
            document: DOC,
            field: "Path",
        })?;

    Ok(AssetMapEntry {
        id: Identifier::new(&asset.required_child(ns, "Id", DOC)?.text),
        path: path.text.clone(),
        is_packing_list,
    })
}

pub(crate) fn expect_root(root: &Element, expected: &'static str) -> Result<(), ManifestError> {
    if root.name == expected {
        Ok(())
    } else {
        Err(ManifestError::UnexpectedRoot {
            expected,
            found: root.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ManifestCodec, XmlCodec};

    const COUNTDOWN_AUDIO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<AssetMap xmlns="http://www.smpte-ra.org/schemas/429-9/2007/AM">
  <Id>urn:uuid:6F5A6E1B-1E2D-4B5C-8C3A-0A9E2B0F6A11</Id>
  <AnnotationText language="en">countdown audio</AnnotationText>
  <Creator language="en">Sandflow</Creator>
  <VolumeCount>1</VolumeCount>
  <IssueDate>2022-03-01T10:00:00+00:00</IssueDate>
  <Issuer>Sandflow Consulting</Issuer>
  <AssetList>
    <Asset>
      <Id>urn:uuid:e8aa8652-f9de-4d8d-b337-53123066605e</Id>
      <PackingList>true</PackingList>
      <ChunkList>
        <Chunk>
          <Path>PKL_e8aa8652-f9de-4d8d-b337-53123066605e.xml</Path>
          <VolumeIndex>1</VolumeIndex>
        </Chunk>
      </ChunkList>
    </Asset>
    <Asset>
      <Id>urn:uuid:D01BC6BE-AE2F-436B-9705-C402E1D92212</Id>
      <ChunkList>
        <Chunk>
          <Path>WAV_d01bc6be-ae2f-436b-9705-c402e1d92212.mxf</Path>
        </Chunk>
      </ChunkList>
    </Asset>
    <Asset>
      <Id>urn:uuid:0b976350-bea1-4e62-ba07-f32b28aaaf30</Id>
      <PackingList>0</PackingList>
      <ChunkList>
        <Chunk>
          <Path>CPL_0b976350-bea1-4e62-ba07-f32b28aaaf30.xml</Path>
        </Chunk>
      </ChunkList>
    </Asset>
  </AssetList>
</AssetMap>
"#;

    fn parse(doc: &str) -> Result<AssetMap, ManifestError> {
        XmlCodec.parse_asset_map(doc.as_bytes())
    }

    #[test]
    fn collects_assets() {
        let am = parse(COUNTDOWN_AUDIO).unwrap();
        assert_eq!(am.id, "urn:uuid:6f5a6e1b-1e2d-4b5c-8c3a-0a9e2b0f6a11");
        assert_eq!(am.assets.len(), 3);
        assert_eq!(am.creator.language(), Some("en"));
        assert_eq!(am.annotation.as_ref().unwrap().text, "countdown audio");

        let pkl = am
            .find(&Identifier::new("urn:uuid:e8aa8652-f9de-4d8d-b337-53123066605e"))
            .unwrap();
        assert!(pkl.is_packing_list);
        assert_eq!(pkl.path, "PKL_e8aa8652-f9de-4d8d-b337-53123066605e.xml");

        let wav = am
            .find(&Identifier::new("urn:uuid:d01bc6be-ae2f-436b-9705-c402e1d92212"))
            .unwrap();
        assert!(!wav.is_packing_list);
        assert_eq!(wav.path, "WAV_d01bc6be-ae2f-436b-9705-c402e1d92212.mxf");
    }

    #[test]
    fn packing_list_flag_requires_true_or_one() {
        let am = parse(COUNTDOWN_AUDIO).unwrap();
        assert_eq!(am.packing_lists().count(), 1);
    }

    #[test]
    fn accepts_prefixed_namespace() {
        let doc = r#"<am:AssetMap xmlns:am="http://www.smpte-ra.org/schemas/429-9/2007/AM">
  <am:Id>urn:uuid:1</am:Id>
  <am:Creator>c</am:Creator>
  <am:IssueDate>2022-01-01T00:00:00Z</am:IssueDate>
  <am:Issuer>i</am:Issuer>
  <am:AssetList>
    <am:Asset><am:Id>urn:uuid:2</am:Id><am:PackingList>TRUE</am:PackingList>
      <am:ChunkList><am:Chunk><am:Path>pkl.xml</am:Path></am:Chunk></am:ChunkList></am:Asset>
  </am:AssetList>
</am:AssetMap>"#;
        let am = parse(doc).unwrap();
        assert_eq!(am.assets.len(), 1);
        assert!(am.assets[0].is_packing_list);
        assert!(am.annotation.is_none());
    }

    #[test]
    fn missing_creator_is_malformed() {
        let doc = COUNTDOWN_AUDIO.replace("<Creator language=\"en\">Sandflow</Creator>", "");
        let err = parse(&doc).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::MissingField {
                field: "Creator",
                ..
            }
        ));
    }

    #[test]
    fn missing_path_is_malformed() {
        let doc = COUNTDOWN_AUDIO.replace(
            "<Path>WAV_d01bc6be-ae2f-436b-9705-c402e1d92212.mxf</Path>",
            "",
        );
        assert!(matches!(
            parse(&doc),
            Err(ManifestError::MissingField { field: "Path", .. })
        ));
    }

    #[test]
    fn rejects_packing_list_document() {
        let doc = r#"<PackingList xmlns="http://www.smpte-ra.org/schemas/2067-2/2016/PKL"/>"#;
        assert!(matches!(
            parse(doc),
            Err(ManifestError::UnexpectedRoot {
                expected: "AssetMap",
                ..
            })
        ));
    }

    #[test]
    fn serialize_then_parse_roundtrips() {
        let am = parse(COUNTDOWN_AUDIO).unwrap();
        let bytes = XmlCodec.serialize_asset_map(&am).unwrap();
        let back = XmlCodec.parse_asset_map(&bytes).unwrap();
        assert_eq!(back, am);
    }

    #[test]
    fn serialized_document_is_namespaced_and_ordered() {
        let mut am = AssetMap::new(UserText::new("repkl"), UserText::new("n/a"));
        am.assets.push(AssetMapEntry {
            id: Identifier::new("urn:uuid:abc"),
            path: "PKL_abc.xml".to_owned(),
            is_packing_list: true,
        });
        let out = String::from_utf8(XmlCodec.serialize_asset_map(&am).unwrap()).unwrap();
        assert!(out.contains(&format!("<AssetMap xmlns=\"{AM_2007_NS}\">")));
        let id_pos = out.find("<Id>").unwrap();
        let creator_pos = out.find("<Creator>").unwrap();
        let volume_pos = out.find("<VolumeCount>1</VolumeCount>").unwrap();
        let issuer_pos = out.find("<Issuer>").unwrap();
        assert!(id_pos < creator_pos && creator_pos < volume_pos && volume_pos < issuer_pos);
        assert!(out.contains("<PackingList>true</PackingList>"));
    }
}
