use crate::asset_map::expect_root;
use crate::types::{Identifier, UserText};
use crate::xml::Element;
use crate::ManifestError;
use serde::Serialize;
use std::collections::BTreeSet;

/// The identifiers and descriptive metadata read from a composition playlist.
/// Only read; never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Composition {
    pub id: Identifier,
    /// Every `TrackFileId` referenced by a `Resource`, at any depth.
    pub resource_ids: BTreeSet<Identifier>,
    pub creator: Option<UserText>,
    pub issuer: Option<UserText>,
    pub annotation: Option<UserText>,
    pub content_title: Option<UserText>,
}

impl Composition {
    pub(crate) fn from_element(root: &Element) -> Result<Self, ManifestError> {
        expect_root(root, "CompositionPlaylist")?;
        let ns = root.namespace.as_deref();

        let resource_ids = root
            .descendants(ns, "Resource")
            .into_iter()
            .filter_map(|r| r.child(ns, "TrackFileId"))
            .map(|e| Identifier::new(&e.text))
            .collect();

        Ok(Self {
            id: Identifier::new(&root.required_child(ns, "Id", "composition")?.text),
            resource_ids,
            creator: root.child(ns, "Creator").map(Element::user_text),
            issuer: root.child(ns, "Issuer").map(Element::user_text),
            annotation: root.child(ns, "AnnotationText").map(Element::user_text),
            content_title: root.child(ns, "ContentTitle").map(Element::user_text),
        })
    }
}
