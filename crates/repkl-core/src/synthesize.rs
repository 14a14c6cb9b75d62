use crate::resolver::Resolvers;
use crate::CoreError;
use repkl_schema::{AssetMap, AssetMapEntry, Composition, Identifier, PackingList, UserText};
use std::collections::BTreeSet;
use tracing::info;

/// Creator written when neither the target composition nor the config names one.
pub const DEFAULT_CREATOR: &str = "repkl";
/// Issuer written when neither the target composition nor the config names one.
pub const DEFAULT_ISSUER: &str = "n/a";

/// Fallback metadata for synthesized manifests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDefaults {
    pub creator: Option<String>,
    pub issuer: Option<String>,
}

/// The manifests of the new mapped file set.
#[derive(Debug, Clone)]
pub struct SynthesizedManifests {
    pub packing_list: PackingList,
    /// `PKL_<uuid>.xml`, also referenced from the asset map.
    pub packing_list_file: String,
    pub asset_map: AssetMap,
}

/// Build a packing list and an asset map covering exactly `ids`, in set
/// order. Fails before building anything if an id is missing from either
/// table.
pub fn synthesize(
    ids: &BTreeSet<Identifier>,
    resolvers: &Resolvers,
    target: &Composition,
    defaults: &ManifestDefaults,
) -> Result<SynthesizedManifests, CoreError> {
    let pkl_assets = ids
        .iter()
        .map(|id| resolvers.packing_list_asset(id).cloned())
        .collect::<Result<Vec<_>, _>>()?;
    let am_entries = ids
        .iter()
        .map(|id| resolvers.asset_map_entry(id).cloned())
        .collect::<Result<Vec<_>, _>>()?;

    let creator = target.creator.clone().unwrap_or_else(|| {
        UserText::new(defaults.creator.as_deref().unwrap_or(DEFAULT_CREATOR))
    });
    let issuer = target.issuer.clone().unwrap_or_else(|| {
        UserText::new(defaults.issuer.as_deref().unwrap_or(DEFAULT_ISSUER))
    });
    let annotation = target
        .content_title
        .clone()
        .or_else(|| target.annotation.clone());

    let mut packing_list = PackingList::new(creator.clone(), issuer.clone());
    packing_list.annotation.clone_from(&annotation);
    packing_list.assets = pkl_assets;
    let packing_list_file = packing_list.file_name();

    let mut asset_map = AssetMap::new(creator, issuer);
    asset_map.annotation = annotation;
    asset_map.assets = am_entries;
    asset_map.assets.push(AssetMapEntry {
        id: packing_list.id.clone(),
        path: packing_list_file.clone(),
        is_packing_list: true,
    });

    info!(
        "synthesized packing list {} with {} assets",
        packing_list.id,
        packing_list.assets.len()
    );

    Ok(SynthesizedManifests {
        packing_list,
        packing_list_file,
        asset_map,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use repkl_schema::{PackingListAsset, DEFAULT_HASH_ALGORITHM};
    use std::path::PathBuf;

    fn resolvers(ids: &[&str]) -> Resolvers {
        let mut r = Resolvers::default();
        for raw in ids {
            let id = Identifier::new(raw);
            let path = format!("{}.mxf", id.uuid_str());
            r.paths.insert(id.clone(), PathBuf::from("/src").join(&path));
            r.asset_map.insert(
                id.clone(),
                AssetMapEntry {
                    id: id.clone(),
                    path,
                    is_packing_list: false,
                },
            );
            r.packing_list.insert(
                id.clone(),
                PackingListAsset {
                    id,
                    annotation_text: None,
                    hash: "aGFzaA==".to_owned(),
                    size: 42,
                    media_type: "application/mxf".to_owned(),
                    original_filename: None,
                    hash_algorithm: DEFAULT_HASH_ALGORITHM.to_owned(),
                },
            );
        }
        r
    }

    fn composition() -> Composition {
        Composition {
            id: Identifier::new("urn:uuid:c"),
            resource_ids: BTreeSet::new(),
            creator: None,
            issuer: Some(UserText::new("Studio").with_language("en")),
            annotation: Some(UserText::new("annotation")),
            content_title: Some(UserText::new("Title")),
        }
    }

    fn id_set(values: &[&str]) -> BTreeSet<Identifier> {
        values.iter().map(Identifier::new).collect()
    }

    #[test]
    fn manifests_cover_exactly_the_resolved_ids() {
        let r = resolvers(&["urn:uuid:c", "urn:uuid:b", "urn:uuid:a", "urn:uuid:unused"]);
        let ids = id_set(&["urn:uuid:c", "urn:uuid:b", "urn:uuid:a"]);
        let out = synthesize(&ids, &r, &composition(), &ManifestDefaults::default()).unwrap();

        let pkl_ids: Vec<&str> = out.packing_list.assets.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(pkl_ids, ["urn:uuid:a", "urn:uuid:b", "urn:uuid:c"]);

        assert_eq!(out.asset_map.assets.len(), 4);
        for id in &ids {
            assert_eq!(out.asset_map.assets.iter().filter(|e| e.id == *id).count(), 1);
        }
        let self_entries: Vec<_> = out
            .asset_map
            .assets
            .iter()
            .filter(|e| e.id == out.packing_list.id)
            .collect();
        assert_eq!(self_entries.len(), 1);
        assert!(self_entries[0].is_packing_list);
        assert_eq!(self_entries[0].path, out.packing_list_file);
        assert_eq!(out.asset_map.packing_lists().count(), 1);
    }

    #[test]
    fn packing_list_file_name_follows_its_id() {
        let r = resolvers(&["urn:uuid:c"]);
        let out = synthesize(
            &id_set(&["urn:uuid:c"]),
            &r,
            &composition(),
            &ManifestDefaults::default(),
        )
        .unwrap();
        assert_eq!(
            out.packing_list_file,
            format!("PKL_{}.xml", out.packing_list.id.uuid_str())
        );
        assert_ne!(out.packing_list.id, out.asset_map.id);
    }

    #[test]
    fn metadata_comes_from_target_then_defaults() {
        let r = resolvers(&["urn:uuid:c"]);
        let ids = id_set(&["urn:uuid:c"]);

        let out = synthesize(&ids, &r, &composition(), &ManifestDefaults::default()).unwrap();
        assert_eq!(out.packing_list.creator.text, DEFAULT_CREATOR);
        assert_eq!(out.packing_list.issuer.text, "Studio");
        assert_eq!(out.packing_list.issuer.language(), Some("en"));
        assert_eq!(out.packing_list.annotation.as_ref().unwrap().text, "Title");
        assert_eq!(out.asset_map.annotation, out.packing_list.annotation);

        let defaults = ManifestDefaults {
            creator: Some("Post House".to_owned()),
            issuer: Some("Distributor".to_owned()),
        };
        let mut bare = composition();
        bare.issuer = None;
        bare.content_title = None;
        let out = synthesize(&ids, &r, &bare, &defaults).unwrap();
        assert_eq!(out.asset_map.creator.text, "Post House");
        assert_eq!(out.asset_map.issuer.text, "Distributor");
        assert_eq!(out.asset_map.annotation.as_ref().unwrap().text, "annotation");
    }

    #[test]
    fn missing_packing_list_entry_is_unresolved() {
        let r = resolvers(&["urn:uuid:c"]);
        let ids = id_set(&["urn:uuid:c", "urn:uuid:ghost"]);
        let err = synthesize(&ids, &r, &composition(), &ManifestDefaults::default()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnresolvedAsset { ref id, table: "packing list" } if *id == "urn:uuid:ghost"
        ));
    }

    #[test]
    fn missing_asset_map_entry_is_unresolved() {
        let mut r = resolvers(&["urn:uuid:c"]);
        r.asset_map.clear();
        let err = synthesize(
            &id_set(&["urn:uuid:c"]),
            &r,
            &composition(),
            &ManifestDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnresolvedAsset {
                table: "asset map",
                ..
            }
        ));
    }

    #[test]
    fn empty_id_set_yields_self_referential_asset_map_only() {
        let r = Resolvers::default();
        let out = synthesize(
            &BTreeSet::new(),
            &r,
            &composition(),
            &ManifestDefaults::default(),
        )
        .unwrap();
        assert!(out.packing_list.assets.is_empty());
        assert_eq!(out.asset_map.assets.len(), 1);
        assert!(out.asset_map.assets[0].is_packing_list);
    }
}
