//! Configuration loading for the procedure environment

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use spslibgs::{SpsError, SpsResult};

use crate::waits::WaitOptions;

/// Environment settings read from a JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Catalog to load before the conventional locations are searched
    pub catalog_path: Option<PathBuf>,
    /// Budget for `wait_for` in milliseconds
    pub wait_timeout_ms: u64,
    /// Interval between `wait_for` predicate checks in milliseconds
    pub poll_period_ms: u64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            wait_timeout_ms: constants::WAIT_FOR_TIMEOUT.as_millis() as u64,
            poll_period_ms: constants::POLL_PERIOD.as_millis() as u64,
        }
    }
}

impl EnvironmentConfig {
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            timeout: Duration::from_millis(self.wait_timeout_ms),
            poll_period: Duration::from_millis(self.poll_period_ms),
        }
    }
}

/// Load environment configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> SpsResult<EnvironmentConfig> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let config: EnvironmentConfig = serde_json::from_reader(reader)?;

    if config.poll_period_ms == 0 {
        return Err(SpsError::Config("poll_period_ms must be greater than zero".to_string()));
    }

    Ok(config)
}

/// Configuration constants
pub mod constants {
    use std::time::Duration;

    /// Catalog file searched for in the conventional locations
    pub const CATALOG_FILE_NAME: &str = "SpacePythonDataset.yaml";

    /// Environment variable naming the configuration file
    pub const CONFIG_ENV_VAR: &str = "SPS_CONFIG";

    pub const WAIT_FOR_TIMEOUT: Duration = Duration::from_secs(5);

    pub const POLL_PERIOD: Duration = Duration::from_millis(100);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let config_json = r#"{
            "catalog_path": "/opt/mission/SpacePythonDataset.yaml",
            "wait_timeout_ms": 30000
        }"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(config_json.as_bytes()).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(
            config.catalog_path,
            Some(PathBuf::from("/opt/mission/SpacePythonDataset.yaml"))
        );
        assert_eq!(config.wait_timeout_ms, 30000);
        assert_eq!(config.poll_period_ms, 100);
        assert_eq!(config.wait_options().timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_defaults() {
        let options = EnvironmentConfig::default().wait_options();
        assert_eq!(options.timeout, constants::WAIT_FOR_TIMEOUT);
        assert_eq!(options.poll_period, constants::POLL_PERIOD);
    }

    #[test]
    fn test_zero_poll_period_rejected() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(br#"{"poll_period_ms": 0}"#).unwrap();
        assert!(matches!(load_config(temp_file.path()), Err(SpsError::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_config("/nonexistent/sps.json"),
            Err(SpsError::Io(_))
        ));
    }
}
