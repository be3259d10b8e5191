//! Collection configuration and validation.

use drift_core::ConfigError;
use drift_nodes::StoreConfig;

/// Names every particle exposes without registration.
pub const BUILTIN_VARIABLES: [&str; 8] =
    ["lon", "lat", "depth", "time", "dt", "id", "state", "index"];

/// Complete configuration for constructing a
/// [`ParticleCollection`](crate::ParticleCollection).
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionConfig {
    /// Node storage and native mirror settings.
    pub store: StoreConfig,
    /// Extra per-particle variables, in the order values are stored.
    pub variables: Vec<String>,
    /// Seed for random issuer positions and k-means initialisation.
    pub seed: u64,
    /// Iteration cap for the initial k-means partitioning. Default: 100.
    pub kmeans_max_iter: usize,
}

impl CollectionConfig {
    /// Default k-means iteration cap.
    pub const DEFAULT_KMEANS_MAX_ITER: usize = 100;

    /// Config with default storage, no extra variables and the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            store: StoreConfig::default(),
            variables: Vec::new(),
            seed,
            kmeans_max_iter: Self::DEFAULT_KMEANS_MAX_ITER,
        }
    }

    /// Builder: register an extra variable.
    pub fn with_variable(mut self, name: impl Into<String>) -> Self {
        self.variables.push(name.into());
        self
    }

    /// Builder: override the storage config.
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Position of a registered extra variable.
    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v == name)
    }

    /// Whether `name` is a built-in or registered variable.
    pub fn knows_variable(&self, name: &str) -> bool {
        BUILTIN_VARIABLES.contains(&name) || self.variable_index(name).is_some()
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        for (i, name) in self.variables.iter().enumerate() {
            if BUILTIN_VARIABLES.contains(&name.as_str()) || self.variables[..i].contains(name) {
                return Err(ConfigError::DuplicateVariable { name: name.clone() });
            }
        }
        Ok(())
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self::new(0)
    }
}
