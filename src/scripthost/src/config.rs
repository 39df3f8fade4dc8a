//! Configuration management for the script host

use crate::memory::signature::SignatureDef;
use crate::{Error, Result};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory searched for script files
    pub scripts_dir: PathBuf,
    /// Append-only log file; stderr when unset
    pub log_file: Option<PathBuf>,
    /// How long the driving thread waits on one script before aborting it
    pub script_timeout_ms: u64,
    /// Whether keyboard events are recorded at startup
    pub record_keys: bool,
    /// File extensions that make a registered script eligible
    pub script_extensions: Vec<String>,
    /// Signature overrides, keyed by signature name
    pub signatures: BTreeMap<String, SignatureDef>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scripts_dir: PathBuf::from("scripts"),
            log_file: None,
            script_timeout_ms: 5000,
            record_keys: true,
            script_extensions: ["rs", "toml", "so", "dll"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            signatures: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?
            .join("scripthost");

        Ok(config_dir.join("scripthost.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Load configuration from file, or the defaults if it doesn't exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        Self::load(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, contents)?;

        Ok(())
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_millis(self.script_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Resolve;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.scripts_dir, PathBuf::from("scripts"));
        assert_eq!(config.script_timeout(), Duration::from_secs(5));
        assert!(config.record_keys);
        assert!(config.script_extensions.iter().any(|e| e == "dll"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            script_timeout_ms = 250

            [signatures.ped_pool]
            pattern = "48 8B 05 ?? ?? ?? ??"
            resolve = { kind = "relative", displacement_offset = 3, instruction_length = 7 }
            "#,
        )
        .unwrap();

        assert_eq!(config.script_timeout_ms, 250);
        assert_eq!(config.scripts_dir, PathBuf::from("scripts"));
        assert_eq!(
            config.signatures["ped_pool"].resolve,
            Resolve::Relative {
                displacement_offset: 3,
                instruction_length: 7
            }
        );
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("scripthost.toml");

        assert_eq!(Config::load_or_default(&path).unwrap(), Config::default());

        let config = Config {
            log_file: Some(PathBuf::from("scripthost.log")),
            record_keys: false,
            ..Config::default()
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);

        fs::write(&path, "script_timeout_ms = \"soon\"").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }
}
