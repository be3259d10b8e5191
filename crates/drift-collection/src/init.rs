//! Bulk ingestion input.

use indexmap::IndexMap;

use drift_core::ConfigError;

use crate::config::CollectionConfig;

/// Parallel arrays describing the initial particle set.
///
/// Every array has one entry per particle, checked against `lon`. In a
/// distributed run every worker passes the same arrays and keeps its own
/// subset.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParticleInit {
    /// Longitudes.
    pub lon: Vec<f64>,
    /// Latitudes.
    pub lat: Vec<f64>,
    /// Depths.
    pub depth: Vec<f64>,
    /// Start times.
    pub time: Vec<f64>,
    /// Step size shared by all particles. Default: `1.0`.
    pub dt: f64,
    /// Explicit identifiers, for re-materialising earlier particles.
    pub ids: Option<Vec<i64>>,
    /// Worker label per particle; computed by k-means when absent.
    pub partitions: Option<Vec<i64>>,
    /// Values of registered extra variables. Unlisted ones start at `0.0`.
    pub variables: IndexMap<String, Vec<f64>>,
}

impl ParticleInit {
    /// Positions and times, with no ids, labels or extra variables.
    pub fn new(lon: Vec<f64>, lat: Vec<f64>, depth: Vec<f64>, time: Vec<f64>) -> Self {
        Self {
            lon,
            lat,
            depth,
            time,
            dt: 1.0,
            ids: None,
            partitions: None,
            variables: IndexMap::new(),
        }
    }

    /// Builder: explicit identifiers.
    pub fn with_ids(mut self, ids: Vec<i64>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Builder: explicit worker labels.
    pub fn with_partitions(mut self, partitions: Vec<i64>) -> Self {
        self.partitions = Some(partitions);
        self
    }

    /// Builder: values for one extra variable.
    pub fn with_variable(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.variables.insert(name.into(), values);
        self
    }

    /// Builder: shared step size.
    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    /// Number of particles described.
    pub fn len(&self) -> usize {
        self.lon.len()
    }

    /// Whether no particles are described.
    pub fn is_empty(&self) -> bool {
        self.lon.is_empty()
    }

    /// `[lon, lat]` of every particle.
    pub fn points(&self) -> Vec<[f64; 2]> {
        self.lon.iter().zip(&self.lat).map(|(&x, &y)| [x, y]).collect()
    }

    /// Extra variable values of particle `i`, in registration order.
    pub(crate) fn variables_at<'a>(
        &'a self,
        config: &'a CollectionConfig,
        i: usize,
    ) -> impl Iterator<Item = f64> + 'a {
        config
            .variables
            .iter()
            .map(move |name| self.variables.get(name).map_or(0.0, |v| v[i]))
    }

    /// Check lengths and variable names.
    pub fn validate(&self, config: &CollectionConfig) -> Result<(), ConfigError> {
        let expected = self.lon.len();
        let check = |field: &str, actual: usize| {
            if actual == expected {
                Ok(())
            } else {
                Err(ConfigError::LengthMismatch {
                    field: field.to_string(),
                    expected,
                    actual,
                })
            }
        };
        check("lat", self.lat.len())?;
        check("depth", self.depth.len())?;
        check("time", self.time.len())?;
        if let Some(ids) = &self.ids {
            check("ids", ids.len())?;
        }
        if let Some(partitions) = &self.partitions {
            check("partitions", partitions.len())?;
        }
        for (name, values) in &self.variables {
            if config.variable_index(name).is_none() {
                return Err(ConfigError::UnknownVariable { name: name.clone() });
            }
            check(name, values.len())?;
        }
        Ok(())
    }
}
