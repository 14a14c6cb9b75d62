use crate::materialize::Action;
use crate::resolver::DuplicatePolicy;
use crate::synthesize::ManifestDefaults;
use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "REPKL_CONFIG";

/// User defaults for repackaging runs. Every field is optional; command-line
/// flags take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepackConfig {
    /// Creator written when the target composition has none.
    #[serde(default)]
    pub creator: Option<String>,
    /// Issuer written when the target composition has none.
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub strict_duplicates: bool,
}

impl RepackConfig {
    /// Load from `$REPKL_CONFIG`, else `~/.config/repkl/config.toml` when it
    /// exists, else return defaults.
    pub fn load_default() -> Result<Self, CoreError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| CoreError::Config(format!("invalid config {}: {e}", path.display())))
    }

    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| CoreError::Config(format!("config serialization failed: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn defaults(&self) -> ManifestDefaults {
        ManifestDefaults {
            creator: self.creator.clone(),
            issuer: self.issuer.clone(),
        }
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        if self.strict_duplicates {
            DuplicatePolicy::Reject
        } else {
            DuplicatePolicy::Overwrite
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(PathBuf::from(home).join(".config/repkl/config.toml"))
}
