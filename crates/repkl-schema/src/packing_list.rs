use crate::asset_map::expect_root;
use crate::types::{issue_timestamp, Identifier, UserText};
use crate::xml::{self, Element, XmlWriter};
use crate::ManifestError;
use serde::Serialize;

/// SMPTE ST 2067-2:2016 packing list namespace, used when writing.
pub const PKL_2016_NS: &str = "http://www.smpte-ra.org/schemas/2067-2/2016/PKL";

/// Hash algorithm assumed when an asset carries no `HashAlgorithm` element.
pub const DEFAULT_HASH_ALGORITHM: &str = "http://www.w3.org/2000/09/xmldsig#sha1";

const DOC: &str = "packing list";

/// Provenance and integrity metadata for one resource. The hash is carried
/// verbatim and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackingListAsset {
    pub id: Identifier,
    pub annotation_text: Option<UserText>,
    pub hash: String,
    pub size: u64,
    pub media_type: String,
    pub original_filename: Option<UserText>,
    pub hash_algorithm: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackingList {
    pub id: Identifier,
    pub creator: UserText,
    pub issuer: UserText,
    pub issue_date: String,
    pub annotation: Option<UserText>,
    pub assets: Vec<PackingListAsset>,
}

impl PackingList {
    /// A new, empty packing list with a fresh identifier and the current time.
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

    /// Filename for this packing list inside a mapped file set: `PKL_<uuid>.xml`.
    pub fn file_name(&self) -> String {
        format!("PKL_{}.xml", self.id.uuid_str())
    }

    pub fn find(&self, id: &Identifier) -> Option<&PackingListAsset> {
        self.assets.iter().find(|a| a.id == *id)
    }

    pub(crate) fn from_element(root: &Element) -> Result<Self, ManifestError> {
        expect_root(root, "PackingList")?;
        let ns = root.namespace.as_deref();

        let assets = root
            .descendants(ns, "Asset")
            .into_iter()
            .map(|e| asset_from_element(e, ns))
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
        xml::start(w, "PackingList", &[("xmlns", PKL_2016_NS)])?;
        xml::text_element(w, "Id", &self.id, None)?;
        if let Some(annotation) = &self.annotation {
            xml::user_text_element(w, "AnnotationText", annotation)?;
        }
        xml::text_element(w, "IssueDate", &self.issue_date, None)?;
        xml::user_text_element(w, "Issuer", &self.issuer)?;
        xml::user_text_element(w, "Creator", &self.creator)?;

        xml::start(w, "AssetList", &[])?;
        for asset in &self.assets {
            write_asset(w, asset)?;
        }
        xml::end(w, "AssetList")?;

        xml::end(w, "PackingList")
    }
}

fn write_asset(w: &mut XmlWriter, asset: &PackingListAsset) -> Result<(), quick_xml::Error> {
    xml::start(w, "Asset", &[])?;
    xml::text_element(w, "Id", &asset.id, None)?;
    if let Some(annotation) = &asset.annotation_text {
        xml::user_text_element(w, "AnnotationText", annotation)?;
    }
    xml::text_element(w, "Hash", &asset.hash, None)?;
    xml::text_element(w, "Size", &asset.size.to_string(), None)?;
    xml::text_element(w, "Type", &asset.media_type, None)?;
    if let Some(original) = &asset.original_filename {
        xml::user_text_element(w, "OriginalFileName", original)?;
    }
    xml::empty(w, "HashAlgorithm", &[("Algorithm", &asset.hash_algorithm)])?;
    xml::end(w, "Asset")
}

fn asset_from_element(
    asset: &Element,
    ns: Option<&str>,
) -> Result<PackingListAsset, ManifestError> {
    let size_text = &asset.required_child(ns, "Size", DOC)?.text;
    let size = size_text
        .trim()
        .parse::<u64>()
        .map_err(|_| ManifestError::InvalidField {
            document: DOC,
            field: "Size",
            value: size_text.clone(),
        })?;

    let hash_algorithm = asset
        .child(ns, "HashAlgorithm")
        .and_then(|e| e.attribute("Algorithm"))
        .unwrap_or(DEFAULT_HASH_ALGORITHM)
        .to_owned();

    Ok(PackingListAsset {
        id: Identifier::new(&asset.required_child(ns, "Id", DOC)?.text),
        annotation_text: asset.child(ns, "AnnotationText").map(Element::user_text),
        hash: asset.required_child(ns, "Hash", DOC)?.text.clone(),
        size,
        media_type: asset.required_child(ns, "Type", DOC)?.text.clone(),
        original_filename: asset.child(ns, "OriginalFileName").map(Element::user_text),
        hash_algorithm,
    })
}
