//! Run configuration, read from a TOML file
//!
//! ```toml
//! [store]
//! path = "reference_data.csv"
//!
//! [selection]
//! exact_tolerance = 0.1
//! min_exact_rows = 3
//! fallback_rows = 3
//! min_training_rows = 2
//!
//! [estimation]
//! target = "effective_dosage_ppm"
//! direction = "signal_to_target"
//! strategy = "per_fiber_group"
//! ```
//!
//! Every table and key is optional and falls back to the values shown.
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::estimator::EstimationConfig;
use crate::selection::SelectionConfig;
use crate::store::CsvStore;
use crate::Result;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub selection: SelectionConfig,
    pub estimation: EstimationConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Reference CSV file
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("reference_data.csv"),
        }
    }
}

impl Config {
    /// Parse a configuration from TOML text
    ///
    /// # Errors
    /// Returns an error if the text is not valid TOML or holds values of the wrong type.
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Read a configuration file
    ///
    /// A relative store path is resolved against the directory holding the file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let mut config = Self::from_toml(&contents)?;
        if config.store.path.is_relative() {
            if let Some(dir) = path.parent() {
                config.store.path = dir.join(&config.store.path);
            }
        }
        debug!(path = %path.display(), store = %config.store.path.display(), "read config");
        Ok(config)
    }

    #[must_use]
    pub fn store(&self) -> CsvStore {
        CsvStore::new(&self.store.path)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempdir::TempDir;

    use super::Config;
    use crate::estimator::{Direction, Strategy, Target};
    use crate::selection::SelectionConfig;
    use crate::Result;

    #[test]
    fn empty_config_uses_defaults() -> Result<()> {
        let config = Config::from_toml("")?;
        assert_eq!(config, Config::default());
        assert_eq!(config.selection, SelectionConfig::default());
        assert_eq!(config.estimation.target, Target::EffectiveDosagePpm);
        assert_eq!(config.estimation.direction, Direction::SignalToTarget);
        assert_eq!(config.estimation.strategy, Strategy::PerFiberGroup);
        Ok(())
    }

    #[test]
    fn partial_tables_keep_remaining_defaults() -> Result<()> {
        let config = Config::from_toml(
            r#"
            [selection]
            min_exact_rows = 5

            [estimation]
            target = "marked_fiber_share"
            direction = "target_to_signal"
            strategy = "joint"
            "#,
        )?;
        assert_eq!(config.selection.min_exact_rows, 5);
        assert_eq!(config.selection.fallback_rows, 3);
        assert_eq!(config.estimation.target, Target::MarkedFiberShare);
        assert_eq!(config.estimation.direction, Direction::TargetToSignal);
        assert_eq!(config.estimation.strategy, Strategy::Joint);
        Ok(())
    }

    #[test]
    fn unknown_target_is_rejected() {
        assert!(Config::from_toml("[estimation]\ntarget = \"colour\"").is_err());
    }

    #[test]
    fn config_round_trips_through_toml() -> Result<()> {
        let mut config = Config::default();
        config.selection.exact_tolerance = 0.5;
        let text = toml::to_string(&config).unwrap();
        assert_eq!(Config::from_toml(&text)?, config);
        Ok(())
    }

    #[test]
    fn relative_store_path_is_resolved_against_config_directory() -> Result<()> {
        let tmp_dir = TempDir::new("relative_store_path_is_resolved").unwrap();
        let path = tmp_dir.path().join("marker.toml");
        std::fs::write(&path, "[store]\npath = \"data/reference.csv\"\n")?;

        let config = Config::from_file(&path)?;
        assert_eq!(
            config.store.path,
            tmp_dir.path().join(PathBuf::from("data/reference.csv"))
        );
        Ok(())
    }
}
