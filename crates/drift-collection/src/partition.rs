//! Spatial assignment of particles to workers.
//!
//! The coordinator owns the authoritative [`Partitioner`]; every other
//! worker keeps a replica it updates from broadcast assignments, so all
//! workers agree on labels and centers after each round.

use rand::Rng;

use drift_core::ConfigError;

use crate::kmeans::{self, nearest};

/// Per-worker cluster centers and the labels assigned so far.
#[derive(Clone, Debug, PartialEq)]
pub struct Partitioner {
    workers: usize,
    labels: Vec<u32>,
    centers: Vec<[f64; 2]>,
    counts: Vec<usize>,
}

impl Partitioner {
    /// Cluster the initial positions, one cluster per worker.
    ///
    /// Fails with [`ConfigError::TooFewParticles`] when there are fewer
    /// points than workers.
    pub fn initial(
        points: &[[f64; 2]],
        workers: usize,
        max_iter: usize,
        rng: &mut impl Rng,
    ) -> Result<Self, ConfigError> {
        check_enough(points.len(), workers)?;
        let clustering = kmeans::kmeans(points, workers, max_iter, rng);
        Ok(Self::from_assignment(clustering.labels, clustering.centers, workers))
    }

    /// Adopt labels supplied by the caller.
    ///
    /// Centers are the per-label means; a worker with no particles gets
    /// the mean of all points until its first assignment.
    pub fn from_labels(
        points: &[[f64; 2]],
        labels: &[i64],
        workers: usize,
    ) -> Result<Self, ConfigError> {
        let mut checked = Vec::with_capacity(labels.len());
        for &label in labels {
            if label < 0 || label as usize >= workers {
                return Err(ConfigError::PartitionOutOfRange { label, workers });
            }
            checked.push(label as u32);
        }

        let mut sums = vec![[0.0f64; 2]; workers];
        let mut counts = vec![0usize; workers];
        let mut all = [0.0f64; 2];
        for (&p, &l) in points.iter().zip(&checked) {
            sums[l as usize][0] += p[0];
            sums[l as usize][1] += p[1];
            counts[l as usize] += 1;
            all[0] += p[0];
            all[1] += p[1];
        }
        let n = points.len().max(1) as f64;
        let fallback = [all[0] / n, all[1] / n];
        let centers = sums
            .iter()
            .zip(&counts)
            .map(|(s, &c)| {
                if c == 0 {
                    fallback
                } else {
                    [s[0] / c as f64, s[1] / c as f64]
                }
            })
            .collect();

        Ok(Self {
            workers,
            labels: checked,
            centers,
            counts,
        })
    }

    /// Rebuild from a broadcast assignment.
    pub fn from_assignment(labels: Vec<u32>, centers: Vec<[f64; 2]>, workers: usize) -> Self {
        let mut counts = vec![0usize; workers];
        for &l in &labels {
            if let Some(c) = counts.get_mut(l as usize) {
                *c += 1;
            }
        }
        Self {
            workers,
            labels,
            centers,
            counts,
        }
    }

    /// Assign a new particle to its nearest center.
    ///
    /// The chosen center moves toward `p` as a running mean.
    pub fn assign(&mut self, p: [f64; 2]) -> u32 {
        let label = nearest(&self.centers, p);
        self.counts[label] += 1;
        let n = self.counts[label] as f64;
        let c = &mut self.centers[label];
        c[0] += (p[0] - c[0]) / n;
        c[1] += (p[1] - c[1]) / n;
        self.labels.push(label as u32);
        label as u32
    }

    /// Apply labels and centers computed by the coordinator.
    pub fn apply(&mut self, labels: &[u32], centers: Vec<[f64; 2]>) {
        for &l in labels {
            if let Some(c) = self.counts.get_mut(l as usize) {
                *c += 1;
            }
        }
        self.labels.extend_from_slice(labels);
        self.centers = centers;
    }

    /// Number of workers.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Every label assigned so far, in assignment order.
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Current centers as `[lon, lat]`.
    pub fn centers(&self) -> &[[f64; 2]] {
        &self.centers
    }

    /// Particles assigned to each worker so far.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }
}

pub(crate) fn check_enough(particles: usize, workers: usize) -> Result<(), ConfigError> {
    if particles < workers {
        return Err(ConfigError::TooFewParticles { particles, workers });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn too_few_particles_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = Partitioner::initial(&[[0.0, 0.0]], 2, 10, &mut rng).unwrap_err();
        assert_eq!(
            err,
            ConfigError::TooFewParticles {
                particles: 1,
                workers: 2
            }
        );
    }

    #[test]
    fn out_of_range_label_rejected() {
        let err = Partitioner::from_labels(&[[0.0, 0.0]], &[2], 2).unwrap_err();
        assert_eq!(
            err,
            ConfigError::PartitionOutOfRange {
                label: 2,
                workers: 2
            }
        );
        assert!(Partitioner::from_labels(&[[0.0, 0.0]], &[-1], 2).is_err());
    }

    #[test]
    fn from_labels_computes_means() {
        let p = Partitioner::from_labels(&[[0.0, 0.0], [2.0, 4.0], [10.0, 10.0]], &[0, 0, 1], 2)
            .unwrap();
        assert_eq!(p.centers(), &[[1.0, 2.0], [10.0, 10.0]]);
        assert_eq!(p.counts(), &[2, 1]);
    }

    #[test]
    fn assign_picks_nearest_and_updates_running_mean() {
        let mut p =
            Partitioner::from_labels(&[[0.0, 0.0], [10.0, 0.0]], &[0, 1], 2).unwrap();
        assert_eq!(p.assign([9.0, 0.0]), 1);
        assert_eq!(p.centers()[1], [9.5, 0.0]);
        assert_eq!(p.counts(), &[1, 2]);
        assert_eq!(p.labels(), &[0, 1, 1]);
    }

    #[test]
    fn replica_matches_after_apply() {
        let mut coord =
            Partitioner::from_labels(&[[0.0, 0.0], [10.0, 0.0]], &[0, 1], 2).unwrap();
        let mut replica = coord.clone();
        let l = coord.assign([1.0, 1.0]);
        replica.apply(&[l], coord.centers().to_vec());
        assert_eq!(coord, replica);
    }
}
