use crate::CoreError;
use repkl_schema::{
    parse_asset_map_file, parse_packing_list_file, AssetMapEntry, Identifier, ManifestCodec,
    PackingListAsset, ASSETMAP_FILENAME,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What to do when two mapped file sets register different records under
/// the same identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Keep the record registered last.
    #[default]
    Overwrite,
    /// Fail the run.
    Reject,
}

/// Identifier-keyed lookup tables covering every asset reachable from the
/// mapped file sets of one run.
#[derive(Debug, Default)]
pub struct Resolvers {
    pub paths: HashMap<Identifier, PathBuf>,
    pub asset_map: HashMap<Identifier, AssetMapEntry>,
    pub packing_list: HashMap<Identifier, PackingListAsset>,
}

impl Resolvers {
    pub fn path(&self, id: &Identifier) -> Result<&Path, CoreError> {
        self.paths
            .get(id)
            .map(PathBuf::as_path)
            .ok_or_else(|| unresolved(id, "path"))
    }

    pub fn asset_map_entry(&self, id: &Identifier) -> Result<&AssetMapEntry, CoreError> {
        self.asset_map
            .get(id)
            .ok_or_else(|| unresolved(id, "asset map"))
    }

    pub fn packing_list_asset(&self, id: &Identifier) -> Result<&PackingListAsset, CoreError> {
        self.packing_list
            .get(id)
            .ok_or_else(|| unresolved(id, "packing list"))
    }
}

fn unresolved(id: &Identifier, table: &'static str) -> CoreError {
    CoreError::UnresolvedAsset {
        id: id.clone(),
        table,
    }
}

/// Accumulates mapped file sets into a [`Resolvers`].
pub struct ResolverBuilder<'c, C: ManifestCodec> {
    codec: &'c C,
    policy: DuplicatePolicy,
    resolvers: Resolvers,
    /// Manifest file each registered record was read from.
    am_origins: HashMap<Identifier, PathBuf>,
    pkl_origins: HashMap<Identifier, PathBuf>,
}

impl<'c, C: ManifestCodec> ResolverBuilder<'c, C> {
    pub fn new(codec: &'c C) -> Self {
        Self {
            codec,
            policy: DuplicatePolicy::default(),
            resolvers: Resolvers::default(),
            am_origins: HashMap::new(),
            pkl_origins: HashMap::new(),
        }
    }

    #[must_use]
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Register the asset map at the root of `dir` and every packing list it
    /// flags.
    pub fn add_mapped_file_set(&mut self, dir: &Path) -> Result<(), CoreError> {
        let am_path = dir.join(ASSETMAP_FILENAME);
        let asset_map = parse_asset_map_file(self.codec, &am_path)?;
        info!(
            "registering mapped file set {} ({} assets)",
            dir.display(),
            asset_map.assets.len()
        );

        for entry in &asset_map.assets {
            let path = dir.join(&entry.path);
            if let Some(previous) = self.resolvers.asset_map.get(&entry.id) {
                // the same record from another directory still names another file
                if previous != entry || self.resolvers.paths.get(&entry.id) != Some(&path) {
                    self.on_conflict(&entry.id, &self.am_origins, &am_path)?;
                }
            }
            self.am_origins.insert(entry.id.clone(), am_path.clone());
            self.resolvers.paths.insert(entry.id.clone(), path);
            self.resolvers
                .asset_map
                .insert(entry.id.clone(), entry.clone());
        }

        for pkl_entry in asset_map.packing_lists() {
            let pkl_path = dir.join(&pkl_entry.path);
            let packing_list = parse_packing_list_file(self.codec, &pkl_path)?;
            debug!(
                "registering packing list {} ({} assets)",
                pkl_path.display(),
                packing_list.assets.len()
            );

            for asset in packing_list.assets {
                if let Some(previous) = self.resolvers.packing_list.get(&asset.id) {
                    if *previous != asset {
                        self.on_conflict(&asset.id, &self.pkl_origins, &pkl_path)?;
                    }
                }
                self.pkl_origins.insert(asset.id.clone(), pkl_path.clone());
                self.resolvers.packing_list.insert(asset.id.clone(), asset);
            }
        }

        Ok(())
    }

    fn on_conflict(
        &self,
        id: &Identifier,
        origins: &HashMap<Identifier, PathBuf>,
        second: &Path,
    ) -> Result<(), CoreError> {
        let first = origins.get(id).cloned().unwrap_or_default();
        match self.policy {
            DuplicatePolicy::Overwrite => {
                warn!(
                    "{id} registered by both {} and {}; keeping the latter",
                    first.display(),
                    second.display()
                );
                Ok(())
            }
            DuplicatePolicy::Reject => Err(CoreError::DuplicateIdentifier {
                id: id.clone(),
                first,
                second: second.to_path_buf(),
            }),
        }
    }

    pub fn build(self) -> Resolvers {
        self.resolvers
    }
}

/// Build resolvers over `dirs`, in order. Later directories win on duplicates
/// unless `policy` rejects them.
pub fn build_resolvers<C: ManifestCodec>(
    codec: &C,
    dirs: &[PathBuf],
    policy: DuplicatePolicy,
) -> Result<Resolvers, CoreError> {
    let mut builder = ResolverBuilder::new(codec).duplicate_policy(policy);
    for dir in dirs {
        builder.add_mapped_file_set(dir)?;
    }
    Ok(builder.build())
}

/// Mapped file sets assumed when none are given: the directories holding the
/// target and base compositions.
pub fn infer_mapped_file_sets(target: &Path, base: Option<&Path>) -> Vec<PathBuf> {
    std::iter::once(target)
        .chain(base)
        .map(|p| match p.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        })
        .collect()
}

/// Canonicalize mapped file set directories, dropping repeats while keeping
/// first-seen order.
pub fn canonical_mapped_file_sets(dirs: &[PathBuf]) -> Result<Vec<PathBuf>, CoreError> {
    let mut out: Vec<PathBuf> = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let canonical = dir
            .canonicalize()
            .map_err(|_| CoreError::ManifestNotFound(dir.join(ASSETMAP_FILENAME)))?;
        if !out.contains(&canonical) {
            out.push(canonical);
        }
    }
    Ok(out)
}
