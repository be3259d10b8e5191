//! Export batching for output writers.
//!
//! The collection does not format files. It hands a writer the columns to
//! append for one output time, and tracks in [`WriteState`] what has been
//! written so far so that write-once variables are emitted exactly once
//! per particle.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use drift_core::{ConfigError, ParticleId};

/// How often a variable is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteStatus {
    /// Every output time.
    Always,
    /// Only on a particle's first write.
    Once,
    /// Never.
    Never,
}

/// One column of exported values.
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    /// Identifiers, indices and state codes.
    Int(Vec<i64>),
    /// Physical and user variables.
    Float(Vec<f64>),
}

impl Column {
    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            Self::Int(v) => v.len(),
            Self::Float(v) => v.len(),
        }
    }

    /// Whether the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which particles a write covers.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteSelection {
    /// Live particles whose time window covers the output time.
    Active,
    /// Every soft-deleted particle, written before compaction drops it.
    DeletedOnly,
    /// Particles at these positions.
    Indices(Vec<usize>),
    /// Particles with these identifiers.
    Ids(Vec<ParticleId>),
}

impl WriteSelection {
    pub(crate) fn is_deleted_write(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// Columns produced for one output time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteBatch {
    /// Variables written every output time, keyed by name. Includes
    /// `index` when requested.
    pub columns: IndexMap<String, Column>,
    /// Write-once variables for particles written for the first time.
    /// Always carries `id` and `index` when non-empty.
    pub once: IndexMap<String, Column>,
}

impl WriteBatch {
    /// Whether neither map holds anything.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.once.is_empty()
    }

    /// Rows in the recurring columns.
    pub fn rows(&self) -> usize {
        self.columns.values().next().map_or(0, Column::len)
    }
}

/// Writer-side bookkeeping carried across output times.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteState {
    /// Variables written every output time, in column order.
    pub var_names: Vec<String>,
    /// Variables written once per particle.
    pub var_names_once: Vec<String>,
    /// Whether only deleted particles are being written.
    pub write_ondelete: bool,
    /// Output time of the last regular write.
    pub last_time_written: Option<f64>,
    /// Every output time written so far.
    pub time_written: Vec<f64>,
    /// Largest positional index ever written.
    pub max_index_written: Option<usize>,
    /// Identifiers whose write-once variables have been emitted.
    pub written_once: BTreeSet<ParticleId>,
}

impl WriteState {
    /// State writing `var_names` every time and nothing once.
    pub fn new<I, S>(var_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            var_names: var_names.into_iter().map(Into::into).collect(),
            var_names_once: Vec::new(),
            write_ondelete: false,
            last_time_written: None,
            time_written: Vec::new(),
            max_index_written: None,
            written_once: BTreeSet::new(),
        }
    }

    /// Move `name` to the list matching `status`.
    ///
    /// `known` decides which names are valid; unknown names fail with
    /// [`ConfigError::UnknownVariable`].
    pub fn set_write_status(
        &mut self,
        name: &str,
        status: WriteStatus,
        known: impl Fn(&str) -> bool,
    ) -> Result<(), ConfigError> {
        if !known(name) {
            return Err(ConfigError::UnknownVariable {
                name: name.to_string(),
            });
        }
        self.var_names.retain(|v| v != name);
        self.var_names_once.retain(|v| v != name);
        match status {
            WriteStatus::Always => self.var_names.push(name.to_string()),
            WriteStatus::Once => self.var_names_once.push(name.to_string()),
            WriteStatus::Never => {}
        }
        Ok(())
    }

    /// Status currently recorded for `name`.
    pub fn write_status(&self, name: &str) -> WriteStatus {
        if self.var_names.iter().any(|v| v == name) {
            WriteStatus::Always
        } else if self.var_names_once.iter().any(|v| v == name) {
            WriteStatus::Once
        } else {
            WriteStatus::Never
        }
    }
}

impl Default for WriteState {
    fn default() -> Self {
        Self::new(["id", "index", "time", "lon", "lat", "depth"])
    }
}

/// Whether a particle's time window covers output time `time`:
/// `time - |dt/2| <= p.time < time + |dt|`.
pub fn in_write_window(p_time: f64, dt: f64, time: f64) -> bool {
    time - (dt / 2.0).abs() <= p_time && p_time < time + dt.abs()
}

/// Whether a particle has started by `time`, in the direction of `dt`.
pub fn has_started(p_time: f64, dt: f64, time: f64) -> bool {
    dt * p_time <= dt * time || is_close(p_time, time)
}

/// `|a - b| <= atol + rtol * |b|` with `rtol = 1e-5`, `atol = 1e-8`.
pub fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}
