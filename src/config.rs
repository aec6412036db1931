use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use serde::Deserialize;
use tracing::warn;

use crate::error::{OrganiseError, Result};

const PROJECT_NAME: &str = env!("CARGO_PKG_NAME");

/// Path to the user config file: `$HOME/.config/product-organiser.toml`
///
/// Returns `None` if the home directory cannot be determined.
pub static CONFIG_PATH: LazyLock<Option<PathBuf>> = LazyLock::new(|| {
    let home_dir = dirs::home_dir()?;
    Some(home_dir.join(".config").join(format!("{PROJECT_NAME}.toml")))
});

/// Folder names of the organised tree.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Layout {
    /// Staging folder below the root holding media waiting to be organised.
    pub staging: String,
    pub needs_labeling: String,
    pub gslisting: String,
    /// Quarantine folder for superseded files, created inside product folders.
    pub quarantine: String,
    pub max_prune_passes: usize,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            staging: "__WEBP To be move to the right folders".to_string(),
            needs_labeling: "Needs Labeling".to_string(),
            gslisting: "gslisting".to_string(),
            quarantine: "Old Images".to_string(),
            max_prune_passes: 10,
        }
    }
}

impl Layout {
    pub fn staging_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.staging)
    }

    pub fn needs_labeling_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.needs_labeling)
    }

    pub fn gslisting_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.gslisting)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub layout: Layout,
}

impl Config {
    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns an error if the TOML string is invalid.
    pub fn from_toml_str(toml_str: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Read an explicitly requested config file; any problem is an error.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| OrganiseError::io(path, e))?;
        Self::from_toml_str(&content).map_err(|e| OrganiseError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Use `path` when given, else the user config file if present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        let Some(user_path) = CONFIG_PATH.as_deref().filter(|p| p.exists()) else {
            return Ok(Self::default());
        };
        match Self::from_file(user_path) {
            Ok(config) => Ok(config),
            Err(err) => {
                warn!("Ignoring user config: {err}");
                Ok(Self::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::from_toml_str("").expect("should parse empty config");
        assert_eq!(config, Config::default());
        assert_eq!(config.layout.quarantine, "Old Images");
        assert_eq!(config.layout.max_prune_passes, 10);
    }

    #[test]
    fn partial_layout_section() {
        let toml = r#"
[layout]
staging = "_incoming"
max_prune_passes = 3
"#;
        let config = Config::from_toml_str(toml).expect("should parse config");
        assert_eq!(config.layout.staging, "_incoming");
        assert_eq!(config.layout.max_prune_passes, 3);
        assert_eq!(config.layout.needs_labeling, "Needs Labeling");
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(Config::from_toml_str("[layout\nstaging = ").is_err());
    }

    #[test]
    fn explicit_file_errors_are_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "layout = 5").unwrap();
        assert!(matches!(
            Config::load(Some(&path)),
            Err(OrganiseError::Config { .. })
        ));
        assert!(matches!(
            Config::load(Some(&dir.path().join("missing.toml"))),
            Err(OrganiseError::Io { .. })
        ));
    }

    #[test]
    fn layout_paths() {
        let layout = Layout::default();
        let root = Path::new("/media");
        assert_eq!(
            layout.staging_dir(root),
            Path::new("/media/__WEBP To be move to the right folders")
        );
        assert_eq!(layout.gslisting_dir(root), Path::new("/media/gslisting"));
    }
}
