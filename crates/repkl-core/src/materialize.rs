use crate::resolver::Resolvers;
use crate::synthesize::SynthesizedManifests;
use crate::CoreError;
use repkl_schema::{Identifier, ManifestCodec, ManifestError, ASSETMAP_FILENAME};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// What happens to each resolved asset file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Duplicate the file; the source is untouched.
    #[default]
    Copy,
    /// Relocate the file; the source is removed.
    Move,
    /// Link the destination to the absolute source path.
    Symlink,
    /// Write the manifests only.
    Skip,
    /// Touch nothing, including the manifests.
    #[serde(rename = "dryrun")]
    DryRun,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Copy,
        Action::Move,
        Action::Symlink,
        Action::Skip,
        Action::DryRun,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Copy => "copy",
            Action::Move => "move",
            Action::Symlink => "symlink",
            Action::Skip => "skip",
            Action::DryRun => "dryrun",
        }
    }

    /// Whether this action writes anything into the destination.
    pub fn mutates_destination(self) -> bool {
        !matches!(self, Action::DryRun)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown action '{s}', expected copy|move|dryrun|skip|symlink"))
    }
}

/// One asset's source and destination paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializedAsset {
    pub id: Identifier,
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Require `destination` to be an existing, empty directory unless `action`
/// leaves it untouched.
pub fn check_destination(destination: &Path, action: Action) -> Result<(), CoreError> {
    if !action.mutates_destination() {
        return Ok(());
    }
    if !destination.is_dir() {
        return Err(CoreError::InvalidDestination {
            path: destination.to_path_buf(),
            reason: "not a directory".to_owned(),
        });
    }
    if fs::read_dir(destination)?.next().is_some() {
        return Err(CoreError::InvalidDestination {
            path: destination.to_path_buf(),
            reason: "directory is not empty".to_owned(),
        });
    }
    Ok(())
}

/// Source and destination for every id, in set order. Destination paths are
/// the asset map paths taken verbatim under `destination`.
pub fn plan_assets(
    ids: &BTreeSet<Identifier>,
    resolvers: &Resolvers,
    destination: &Path,
) -> Result<Vec<MaterializedAsset>, CoreError> {
    ids.iter()
        .map(|id| {
            let entry = resolvers.asset_map_entry(id)?;
            if !is_contained_relative(Path::new(&entry.path)) {
                return Err(CoreError::Manifest(ManifestError::InvalidField {
                    document: "asset map",
                    field: "Path",
                    value: entry.path.clone(),
                }));
            }
            Ok(MaterializedAsset {
                id: id.clone(),
                source: resolvers.path(id)?.to_path_buf(),
                destination: destination.join(&entry.path),
            })
        })
        .collect()
}

fn is_contained_relative(path: &Path) -> bool {
    path.components().next().is_some()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Applies one [`Action`] to every planned asset.
#[derive(Debug, Clone, Copy)]
pub struct Materializer {
    action: Action,
}

impl Materializer {
    pub fn new(action: Action) -> Self {
        Self { action }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    /// Write the packing list then the asset map into `destination`.
    /// Returns `false` without touching the filesystem for a dry run.
    pub fn write_manifests<C: ManifestCodec>(
        &self,
        codec: &C,
        destination: &Path,
        manifests: &SynthesizedManifests,
    ) -> Result<bool, CoreError> {
        let pkl_path = destination.join(&manifests.packing_list_file);
        let am_path = destination.join(ASSETMAP_FILENAME);

        if !self.action.mutates_destination() {
            info!(
                "dry run: would write {} and {}",
                pkl_path.display(),
                am_path.display()
            );
            return Ok(false);
        }

        let pkl_bytes = codec.serialize_packing_list(&manifests.packing_list)?;
        let am_bytes = codec.serialize_asset_map(&manifests.asset_map)?;
        write_manifest(&pkl_path, &pkl_bytes)?;
        write_manifest(&am_path, &am_bytes)?;
        info!("wrote {} and {}", pkl_path.display(), am_path.display());
        Ok(true)
    }

    /// Apply the action to one asset. Never overwrites an existing destination.
    pub fn materialize(&self, asset: &MaterializedAsset) -> Result<(), CoreError> {
        let (src, dst) = (&asset.source, &asset.destination);
        match self.action {
            Action::Copy => {
                prepare(src, dst)?;
                debug!("copy {} -> {}", src.display(), dst.display());
                fs::copy(src, dst).map_err(|e| CoreError::asset_io(dst, e))?;
            }
            Action::Move => {
                prepare(src, dst)?;
                debug!("move {} -> {}", src.display(), dst.display());
                move_file(src, dst)?;
            }
            Action::Symlink => {
                prepare(src, dst)?;
                debug!("symlink {} -> {}", dst.display(), src.display());
                symlink_file(src, dst).map_err(|e| CoreError::asset_io(dst, e))?;
            }
            Action::Skip => {
                debug!("skip {}", asset.id);
            }
            Action::DryRun => {
                check_paths(src, dst)?;
                info!("dry run: {} -> {}", src.display(), dst.display());
            }
        }
        Ok(())
    }
}

/// Check the source exists and the destination does not. Read-only.
fn check_paths(src: &Path, dst: &Path) -> Result<(), CoreError> {
    fs::metadata(src).map_err(|e| CoreError::asset_io(src, e))?;
    if fs::symlink_metadata(dst).is_ok() {
        return Err(CoreError::asset_io(
            dst,
            io::Error::new(io::ErrorKind::AlreadyExists, "destination already exists"),
        ));
    }
    Ok(())
}

/// [`check_paths`], then create the destination's parent directories.
fn prepare(src: &Path, dst: &Path) -> Result<(), CoreError> {
    check_paths(src, dst)?;
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| CoreError::asset_io(parent, e))?;
    }
    Ok(())
}

fn move_file(src: &Path, dst: &Path) -> Result<(), CoreError> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(rename_err) if crosses_devices(&rename_err) => {
            warn!(
                "{} is on another filesystem; falling back to copy and remove",
                src.display()
            );
            fs::copy(src, dst).map_err(|e| CoreError::asset_io(dst, e))?;
            fs::remove_file(src).map_err(|e| CoreError::asset_io(src, e))
        }
        Err(rename_err) => Err(CoreError::asset_io(src, rename_err)),
    }
}

#[cfg(unix)]
fn crosses_devices(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(windows)]
fn crosses_devices(err: &io::Error) -> bool {
    // ERROR_NOT_SAME_DEVICE
    err.raw_os_error() == Some(17)
}

#[cfg(not(any(unix, windows)))]
fn crosses_devices(_err: &io::Error) -> bool {
    false
}

#[cfg(unix)]
fn symlink_file(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
fn symlink_file(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(src, dst)
}

#[cfg(not(any(unix, windows)))]
fn symlink_file(_src: &Path, _dst: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}

/// Atomically write a manifest file: temp file in the same directory, fsync,
/// then persist over the final name.
fn write_manifest(path: &Path, bytes: &[u8]) -> Result<(), CoreError> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| CoreError::asset_io(dir, e))?;
    tmp.write_all(bytes)
        .map_err(|e| CoreError::asset_io(path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| CoreError::asset_io(path, e))?;
    tmp.persist_noclobber(path)
        .map_err(|e| CoreError::asset_io(path, e.error))?;
    Ok(())
}
