//! Lloyd's k-means over 2-D points with k-means++ seeding.
//!
//! Only used to produce one label per point for worker assignment; no
//! statistical guarantees beyond that.

use rand::Rng;

/// Labels and centers produced by [`kmeans`].
#[derive(Clone, Debug, PartialEq)]
pub struct Clustering {
    /// Cluster index of every input point.
    pub labels: Vec<u32>,
    /// One center per cluster.
    pub centers: Vec<[f64; 2]>,
}

pub(crate) fn dist2(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

/// Index of the center nearest to `p`. Ties go to the lowest index.
pub(crate) fn nearest(centers: &[[f64; 2]], p: [f64; 2]) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, &c) in centers.iter().enumerate() {
        let d = dist2(c, p);
        if d < best_d {
            best = i;
            best_d = d;
        }
    }
    best
}

fn seed_centers(points: &[[f64; 2]], k: usize, rng: &mut impl Rng) -> Vec<[f64; 2]> {
    let mut centers = Vec::with_capacity(k);
    centers.push(points[rng.random_range(0..points.len())]);
    let mut d2: Vec<f64> = points.iter().map(|&p| dist2(p, centers[0])).collect();
    while centers.len() < k {
        let total: f64 = d2.iter().sum();
        let pick = if total > 0.0 {
            let mut target = rng.random::<f64>() * total;
            let mut chosen = points.len() - 1;
            for (i, &w) in d2.iter().enumerate() {
                if target < w {
                    chosen = i;
                    break;
                }
                target -= w;
            }
            chosen
        } else {
            // All points coincide with a center.
            rng.random_range(0..points.len())
        };
        let c = points[pick];
        centers.push(c);
        for (d, &p) in d2.iter_mut().zip(points) {
            *d = d.min(dist2(p, c));
        }
    }
    centers
}

/// Cluster `points` into `k` groups.
///
/// Requires `1 <= k <= points.len()`. Iterates until labels stop changing
/// or `max_iter` rounds have run. A cluster that empties is re-seeded with
/// the point farthest from its current center.
pub fn kmeans(points: &[[f64; 2]], k: usize, max_iter: usize, rng: &mut impl Rng) -> Clustering {
    debug_assert!(k >= 1 && k <= points.len());
    let mut centers = seed_centers(points, k, rng);
    let mut labels: Vec<u32> = points.iter().map(|&p| nearest(&centers, p) as u32).collect();

    for round in 0..max_iter {
        let mut sums = vec![[0.0f64; 2]; k];
        let mut counts = vec![0usize; k];
        for (&p, &l) in points.iter().zip(&labels) {
            let l = l as usize;
            sums[l][0] += p[0];
            sums[l][1] += p[1];
            counts[l] += 1;
        }
        for c in 0..k {
            if counts[c] > 0 {
                let n = counts[c] as f64;
                centers[c] = [sums[c][0] / n, sums[c][1] / n];
            } else {
                let far = points
                    .iter()
                    .zip(&labels)
                    .map(|(&p, &l)| dist2(p, centers[l as usize]))
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (i, d)| if d > best.1 { (i, d) } else { best })
                    .0;
                centers[c] = points[far];
                labels[far] = c as u32;
            }
        }

        let mut changed = false;
        for (l, &p) in labels.iter_mut().zip(points) {
            let new = nearest(&centers, p) as u32;
            if new != *l {
                *l = new;
                changed = true;
            }
        }
        if !changed {
            log::debug!("k-means converged after {} rounds", round + 1);
            break;
        }
    }

    Clustering { labels, centers }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn separates_two_blobs() {
        let mut points = Vec::new();
        for i in 0..10 {
            points.push([i as f64 * 0.01, 0.0]);
            points.push([100.0 + i as f64 * 0.01, 50.0]);
        }
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let c = kmeans(&points, 2, 50, &mut rng);
        assert_eq!(c.labels.len(), points.len());
        for pair in c.labels.chunks(2) {
            assert_ne!(pair[0], pair[1]);
        }
        let first = c.labels[0];
        assert!(c.labels.iter().step_by(2).all(|&l| l == first));
    }

    #[test]
    fn k_equal_to_points_gives_every_label() {
        let points = [[0.0, 0.0], [5.0, 5.0], [10.0, 0.0]];
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let c = kmeans(&points, 3, 20, &mut rng);
        let mut seen = c.labels.clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn identical_points_still_label_everything() {
        let points = vec![[1.0, 1.0]; 8];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let c = kmeans(&points, 3, 10, &mut rng);
        assert_eq!(c.labels.len(), 8);
        assert!(c.labels.iter().all(|&l| l < 3));
        assert_eq!(c.centers.len(), 3);
    }

    #[test]
    fn nearest_prefers_lowest_index_on_tie() {
        let centers = [[0.0, 0.0], [2.0, 0.0]];
        assert_eq!(nearest(&centers, [1.0, 0.0]), 0);
        assert_eq!(nearest(&centers, [1.5, 0.0]), 1);
    }
}
