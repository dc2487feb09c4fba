//! Config file loading.
//!
//! Resolution order, first hit wins:
//! 1. `--config <path>` (must exist)
//! 2. `./cpgraph.toml`
//! 3. `<user config dir>/cpgraph/config.toml`
//! 4. built-in defaults
//!
//! Command-line flags override anything in `[defaults]`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use cpgraph_core::DataTypeFilter;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::output::OutputMode;
use crate::style::StyleOverrides;

pub const LOCAL_CONFIG_FILE: &str = "cpgraph.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub style: StyleOverrides,
    pub defaults: Defaults,
}

/// Fallbacks for flags the user did not pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Defaults {
    pub data_type: Option<DataTypeFilter>,
    pub include_disabled: Option<bool>,
    pub highlight_filtered: Option<bool>,
    pub format: Option<OutputMode>,
}

/// A config plus where it came from (`None` for built-in defaults).
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub config: Config,
    pub source: Option<PathBuf>,
}

pub fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str::<Config>(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("cpgraph").join("config.toml"))
}

/// Implicit locations in priority order.
fn implicit_candidates(cwd: &Path, user: Option<PathBuf>) -> Vec<PathBuf> {
    let mut paths = vec![cwd.join(LOCAL_CONFIG_FILE)];
    paths.extend(user);
    paths
}

fn resolve(explicit: Option<&Path>, candidates: &[PathBuf]) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("config file {} does not exist", path.display());
        }
        return Ok(LoadedConfig {
            config: load_config_file(path)?,
            source: Some(path.to_path_buf()),
        });
    }
    for path in candidates {
        if path.exists() {
            debug!(path = %path.display(), "using config file");
            return Ok(LoadedConfig {
                config: load_config_file(path)?,
                source: Some(path.clone()),
            });
        }
    }
    Ok(LoadedConfig::default())
}

/// Load the effective config.
pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    resolve(explicit, &implicit_candidates(&cwd, user_config_path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn empty_file_is_all_defaults() {
        let config: Config = toml::from_str("").expect("parse");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn defaults_section_parses() {
        let config: Config = toml::from_str(
            "[defaults]\ndata_type = \"images_only\"\ninclude_disabled = true\nformat = \"json\"\n",
        )
        .expect("parse");
        assert_eq!(config.defaults.data_type, Some(DataTypeFilter::ImagesOnly));
        assert_eq!(config.defaults.include_disabled, Some(true));
        assert_eq!(config.defaults.format, Some(OutputMode::Json));
        assert_eq!(config.defaults.highlight_filtered, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Config>("[defaults]\ncolour = \"red\"\n").is_err());
    }

    #[test]
    fn local_file_beats_user_file() {
        let dir = TempDir::new().expect("tempdir");
        let local = dir.path().join(LOCAL_CONFIG_FILE);
        let user = dir.path().join("user.toml");
        fs::write(&local, "[defaults]\ninclude_disabled = true\n").expect("write");
        fs::write(&user, "[defaults]\ninclude_disabled = false\n").expect("write");

        let loaded = resolve(None, &implicit_candidates(dir.path(), Some(user))).expect("load");
        assert_eq!(loaded.source.as_deref(), Some(local.as_path()));
        assert_eq!(loaded.config.defaults.include_disabled, Some(true));
    }

    #[test]
    fn no_files_means_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let loaded = resolve(None, &implicit_candidates(dir.path(), None)).expect("load");
        assert!(loaded.source.is_none());
        assert_eq!(loaded.config, Config::default());
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = TempDir::new().expect("tempdir");
        let missing = dir.path().join("nope.toml");
        let err = resolve(Some(&missing), &[]).expect_err("missing");
        assert!(err.to_string().contains("nope.toml"));
    }

    #[test]
    fn malformed_file_names_its_path() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[defaults\n").expect("write");
        let err = resolve(Some(&path), &[]).expect_err("bad");
        assert!(format!("{err:#}").contains("bad.toml"));
    }
}
