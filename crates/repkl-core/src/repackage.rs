use crate::materialize::{check_destination, plan_assets, Action, MaterializedAsset, Materializer};
use crate::resolver::{
    build_resolvers, canonical_mapped_file_sets, infer_mapped_file_sets, DuplicatePolicy,
};
use crate::synthesize::{synthesize, ManifestDefaults};
use crate::target::resolve_target_ids;
use crate::CoreError;
use repkl_schema::{
    parse_composition_file, Identifier, ManifestCodec, XmlCodec, ASSETMAP_FILENAME,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};

/// Inputs of one repackaging run.
#[derive(Debug, Clone)]
pub struct RepackageRequest {
    /// Composition playlist to repackage.
    pub target: PathBuf,
    pub destination: PathBuf,
    /// Directories holding an `ASSETMAP.xml`. Inferred from the target and
    /// base locations when empty.
    pub mapped_file_sets: Vec<PathBuf>,
    /// Composition whose resources are already delivered (the OV).
    pub base: Option<PathBuf>,
    pub action: Action,
    pub duplicate_policy: DuplicatePolicy,
    pub defaults: ManifestDefaults,
}

impl RepackageRequest {
    pub fn new(target: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            destination: destination.into(),
            mapped_file_sets: Vec::new(),
            base: None,
            action: Action::default(),
            duplicate_policy: DuplicatePolicy::default(),
            defaults: ManifestDefaults::default(),
        }
    }

    #[must_use]
    pub fn with_mapped_file_set(mut self, dir: impl Into<PathBuf>) -> Self {
        self.mapped_file_sets.push(dir.into());
        self
    }

    #[must_use]
    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = Some(base.into());
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    #[must_use]
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    #[must_use]
    pub fn with_defaults(mut self, defaults: ManifestDefaults) -> Self {
        self.defaults = defaults;
        self
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RepackageReport {
    pub action: Action,
    pub destination: PathBuf,
    pub target_id: Identifier,
    pub mapped_file_sets: Vec<PathBuf>,
    pub resolved_ids: Vec<Identifier>,
    pub packing_list_id: Identifier,
    pub packing_list: PathBuf,
    pub asset_map: PathBuf,
    /// `false` for a dry run.
    pub manifests_written: bool,
    pub assets: Vec<MaterializedAsset>,
}

/// Runs the repackaging pipeline: resolve, synthesize, write manifests,
/// materialize assets.
#[derive(Debug, Clone, Default)]
pub struct Repackager<C: ManifestCodec = XmlCodec> {
    codec: C,
}

impl Repackager<XmlCodec> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: ManifestCodec> Repackager<C> {
    pub fn with_codec(codec: C) -> Self {
        Self { codec }
    }

    pub fn run(&self, request: &RepackageRequest) -> Result<RepackageReport, CoreError> {
        self.run_with_progress(request, |_| {})
    }

    /// Like [`Repackager::run`], calling `progress` before each asset is
    /// materialized. Stops at the first failing asset; files already placed
    /// stay where they are.
    pub fn run_with_progress(
        &self,
        request: &RepackageRequest,
        mut progress: impl FnMut(&MaterializedAsset),
    ) -> Result<RepackageReport, CoreError> {
        info!(
            "repackaging {} into {} ({})",
            request.target.display(),
            request.destination.display(),
            request.action
        );
        check_destination(&request.destination, request.action)?;

        let target = parse_composition_file(&self.codec, &request.target)?;
        let base = request
            .base
            .as_deref()
            .map(|path| parse_composition_file(&self.codec, path))
            .transpose()?;

        let dirs = if request.mapped_file_sets.is_empty() {
            infer_mapped_file_sets(&request.target, request.base.as_deref())
        } else {
            request.mapped_file_sets.clone()
        };
        let dirs = canonical_mapped_file_sets(&dirs)?;
        debug!("mapped file sets: {dirs:?}");

        let resolvers = build_resolvers(&self.codec, &dirs, request.duplicate_policy)?;
        let ids = resolve_target_ids(&target, base.as_ref());
        info!("{} identifiers to repackage", ids.len());

        let manifests = synthesize(&ids, &resolvers, &target, &request.defaults)?;
        let assets = plan_assets(&ids, &resolvers, &request.destination)?;

        let materializer = Materializer::new(request.action);
        let manifests_written =
            materializer.write_manifests(&self.codec, &request.destination, &manifests)?;
        for asset in &assets {
            progress(asset);
            materializer.materialize(asset)?;
        }

        Ok(RepackageReport {
            action: request.action,
            destination: request.destination.clone(),
            target_id: target.id,
            mapped_file_sets: dirs,
            resolved_ids: ids.into_iter().collect(),
            packing_list_id: manifests.packing_list.id.clone(),
            packing_list: request.destination.join(&manifests.packing_list_file),
            asset_map: request.destination.join(ASSETMAP_FILENAME),
            manifests_written,
            assets,
        })
    }
}

/// Repackage with the XML codec.
pub fn repackage(request: &RepackageRequest) -> Result<RepackageReport, CoreError> {
    Repackager::new().run(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn request_builder_sets_fields() {
        let req = RepackageRequest::new("/in/CPL.xml", "/out")
            .with_mapped_file_set("/in")
            .with_mapped_file_set("/ov")
            .with_base("/ov/CPL.xml")
            .with_action(Action::Symlink)
            .with_duplicate_policy(DuplicatePolicy::Reject);
        assert_eq!(req.mapped_file_sets.len(), 2);
        assert_eq!(req.base.as_deref(), Some(Path::new("/ov/CPL.xml")));
        assert_eq!(req.action, Action::Symlink);
        assert_eq!(req.duplicate_policy, DuplicatePolicy::Reject);
    }

    #[test]
    fn request_defaults_to_copy_with_inferred_sets() {
        let req = RepackageRequest::new("CPL.xml", "out");
        assert_eq!(req.action, Action::Copy);
        assert!(req.mapped_file_sets.is_empty());
        assert_eq!(req.duplicate_policy, DuplicatePolicy::Overwrite);
    }

    #[test]
    fn non_empty_destination_fails_before_parsing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("junk"), b"x").unwrap();
        let req = RepackageRequest::new(dir.path().join("missing.xml"), dir.path());
        assert!(matches!(
            Repackager::new().run(&req),
            Err(CoreError::InvalidDestination { .. })
        ));
    }

    #[test]
    fn missing_target_is_manifest_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let req = RepackageRequest::new(dir.path().join("missing.xml"), dir.path())
            .with_action(Action::DryRun);
        assert!(matches!(
            repackage(&req),
            Err(CoreError::ManifestNotFound(_))
        ));
    }
}
