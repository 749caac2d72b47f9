//! Configuration and feature toggles for composite resolution.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::processing::DEFAULT_PROCESSED_BATCH_SIZE;

/// Environment variable enabling legacy DAG blocking.
pub const ENV_DAG_LEGACY_BLOCKING: &str = "STAGESTATUS_DAG_LEGACY_BLOCKING";
/// Environment variable enabling dependency-tree expansion.
pub const ENV_DEPENDENCY_TREE_FOR_DAG: &str = "STAGESTATUS_DEPENDENCY_TREE_FOR_DAG";
/// Environment variable for the processed-marking batch size.
pub const ENV_PROCESSED_BATCH_SIZE: &str = "STAGESTATUS_PROCESSED_BATCH_SIZE";

/// Provider of the toggles consulted while resolving composites.
///
/// Values are read on every query, so a provider may flip them mid-run.
pub trait FeatureToggles: Send + Sync {
    /// When true, a DAG composite over any unfinished entry is `pending`.
    fn dag_legacy_blocking(&self) -> bool;

    /// When true, DAG name queries also wait on each job's prior stages.
    fn dependency_tree_for_dag(&self) -> bool;
}

/// Static configuration for a status collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Reproduce stage blocking for DAG queries.
    #[serde(default)]
    pub dag_legacy_blocking: bool,
    /// Expand DAG name queries with prior-stage composites.
    #[serde(default = "default_dependency_tree_for_dag")]
    pub dependency_tree_for_dag: bool,
    /// Rows handed to the processed-marking hook per call.
    #[serde(default = "default_processed_batch_size")]
    pub processed_batch_size: usize,
}

fn default_dependency_tree_for_dag() -> bool {
    true
}

fn default_processed_batch_size() -> usize {
    DEFAULT_PROCESSED_BATCH_SIZE
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            dag_legacy_blocking: false,
            dependency_tree_for_dag: default_dependency_tree_for_dag(),
            processed_batch_size: default_processed_batch_size(),
        }
    }
}

impl StatusConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets legacy DAG blocking.
    #[must_use]
    pub fn with_dag_legacy_blocking(mut self, enabled: bool) -> Self {
        self.dag_legacy_blocking = enabled;
        self
    }

    /// Sets dependency-tree expansion.
    #[must_use]
    pub fn with_dependency_tree_for_dag(mut self, enabled: bool) -> Self {
        self.dependency_tree_for_dag = enabled;
        self
    }

    /// Sets the processed-marking batch size.
    #[must_use]
    pub fn with_processed_batch_size(mut self, size: usize) -> Self {
        self.processed_batch_size = size.max(1);
        self
    }

    /// Parses a configuration from JSON; absent fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        let size = config.processed_batch_size;
        Ok(config.with_processed_batch_size(size))
    }

    /// Reads the configuration from `STAGESTATUS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through a variable lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_DAG_LEGACY_BLOCKING) {
            config.dag_legacy_blocking = parse_bool(ENV_DAG_LEGACY_BLOCKING, &value)?;
        }
        if let Some(value) = lookup(ENV_DEPENDENCY_TREE_FOR_DAG) {
            config.dependency_tree_for_dag = parse_bool(ENV_DEPENDENCY_TREE_FOR_DAG, &value)?;
        }
        if let Some(value) = lookup(ENV_PROCESSED_BATCH_SIZE) {
            let size = value
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::invalid(ENV_PROCESSED_BATCH_SIZE, &value))?;
            config = config.with_processed_batch_size(size);
        }
        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, value)),
    }
}

impl FeatureToggles for StatusConfig {
    fn dag_legacy_blocking(&self) -> bool {
        self.dag_legacy_blocking
    }

    fn dependency_tree_for_dag(&self) -> bool {
        self.dependency_tree_for_dag
    }
}

/// Toggles that can be flipped at runtime, e.g. during a rollout.
#[derive(Debug, Default)]
pub struct SwitchableToggles {
    config: RwLock<StatusConfig>,
}

impl SwitchableToggles {
    /// Creates toggles seeded from a configuration.
    #[must_use]
    pub fn new(config: StatusConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Flips legacy DAG blocking.
    pub fn set_dag_legacy_blocking(&self, enabled: bool) {
        self.config.write().dag_legacy_blocking = enabled;
    }

    /// Flips dependency-tree expansion.
    pub fn set_dependency_tree_for_dag(&self, enabled: bool) {
        self.config.write().dependency_tree_for_dag = enabled;
    }

    /// Returns a copy of the current values.
    #[must_use]
    pub fn snapshot(&self) -> StatusConfig {
        self.config.read().clone()
    }
}

impl FeatureToggles for SwitchableToggles {
    fn dag_legacy_blocking(&self) -> bool {
        self.config.read().dag_legacy_blocking
    }

    fn dependency_tree_for_dag(&self) -> bool {
        self.config.read().dependency_tree_for_dag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = StatusConfig::default();
        assert!(!config.dag_legacy_blocking);
        assert!(config.dependency_tree_for_dag);
        assert_eq!(config.processed_batch_size, DEFAULT_PROCESSED_BATCH_SIZE);
    }

    #[test]
    fn test_from_json_partial() {
        let config = StatusConfig::from_json(r#"{"dag_legacy_blocking": true}"#).unwrap();
        assert_eq!(config, StatusConfig::new().with_dag_legacy_blocking(true));
    }

    #[test]
    fn test_from_json_batch_size() {
        let config = StatusConfig::from_json(
            r#"{"processed_batch_size": 25, "dependency_tree_for_dag": false}"#,
        )
        .unwrap();

        assert_eq!(config.processed_batch_size, 25);
        assert!(!config.dependency_tree_for_dag);
        assert!(!config.dag_legacy_blocking);
    }

    #[test]
    fn test_from_json_clamps_batch_size() {
        let config = StatusConfig::from_json(r#"{"processed_batch_size": 0}"#).unwrap();
        assert_eq!(config.processed_batch_size, 1);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_DAG_LEGACY_BLOCKING, "on"),
            (ENV_DEPENDENCY_TREE_FOR_DAG, "false"),
            (ENV_PROCESSED_BATCH_SIZE, " 25 "),
        ]);
        let config = StatusConfig::from_lookup(|key| vars.get(key).map(ToString::to_string)).unwrap();

        assert!(config.dag_legacy_blocking);
        assert!(!config.dependency_tree_for_dag);
        assert_eq!(config.processed_batch_size, 25);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = StatusConfig::from_lookup(|key| {
            (key == ENV_DAG_LEGACY_BLOCKING).then(|| "maybe".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains(ENV_DAG_LEGACY_BLOCKING));
    }

    #[test]
    fn test_switchable_toggles() {
        let toggles = SwitchableToggles::new(StatusConfig::new());
        assert!(!toggles.dag_legacy_blocking());

        toggles.set_dag_legacy_blocking(true);
        toggles.set_dependency_tree_for_dag(false);
        assert!(toggles.dag_legacy_blocking());
        assert!(!toggles.snapshot().dependency_tree_for_dag);
    }
}
