//! Integration tests: distributed ingestion and assignment over a group
//! of in-process workers.

use std::collections::BTreeSet;
use std::thread;

use drift_collection::{CollectionConfig, ParticleCollection, ParticleInit, ThreadComm};
use drift_core::{CollectionError, ConfigError, Particle, ParticleId, SequentialIssuer};
use drift_test_utils::fixtures::clustered;

/// Run `f` once per worker of a fresh group and collect the results in
/// rank order.
fn run_group<T: Send + 'static>(
    workers: usize,
    f: impl Fn(ParticleCollection) -> T + Send + Sync + Clone + 'static,
    init: ParticleInit,
) -> Vec<Result<T, CollectionError>> {
    let handles: Vec<_> = ThreadComm::group(workers)
        .into_iter()
        .map(|comm| {
            let f = f.clone();
            let init = init.clone();
            thread::spawn(move || {
                ParticleCollection::from_init(
                    CollectionConfig::new(21),
                    Box::new(SequentialIssuer::new()),
                    Box::new(comm),
                    init,
                )
                .map(f)
            })
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

fn init_from(points: &[[f64; 2]]) -> ParticleInit {
    let n = points.len();
    ParticleInit::new(
        points.iter().map(|p| p[0]).collect(),
        points.iter().map(|p| p[1]).collect(),
        vec![0.0; n],
        vec![0.0; n],
    )
    .with_ids((0..n as i64).collect())
}

fn local_ids(c: ParticleCollection) -> Vec<ParticleId> {
    c.iter().map(|p| p.id).collect()
}

#[test]
fn kmeans_partition_is_complete_and_disjoint() {
    let points = clustered(&[[0.0, 0.0], [120.0, 60.0]], 20, 1.0, 5);
    let results = run_group(2, local_ids, init_from(&points));

    let mut union = BTreeSet::new();
    for ids in results {
        for id in ids.unwrap() {
            assert!(union.insert(id), "particle {id} owned twice");
        }
    }
    let all: BTreeSet<_> = (0..40).map(ParticleId).collect();
    assert_eq!(union, all);
}

#[test]
fn separated_clusters_land_on_separate_workers() {
    let points = clustered(&[[0.0, 0.0], [120.0, 60.0]], 20, 1.0, 5);
    let results = run_group(
        2,
        |c| c.iter().map(|p| p.lon > 60.0).collect::<BTreeSet<_>>(),
        init_from(&points),
    );
    for sides in results {
        assert_eq!(sides.unwrap().len(), 1);
    }
}

#[test]
fn explicit_labels_are_honoured() {
    let points: Vec<[f64; 2]> = (0..6).map(|i| [i as f64, 0.0]).collect();
    let init = init_from(&points).with_partitions(vec![1, 0, 1, 0, 1, 0]);
    let results = run_group(2, local_ids, init);
    let ids: Vec<Vec<u64>> = results
        .into_iter()
        .map(|r| r.unwrap().into_iter().map(|id| id.0).collect())
        .collect();
    assert_eq!(ids[0], vec![1, 3, 5]);
    assert_eq!(ids[1], vec![0, 2, 4]);
}

#[test]
fn fewer_particles_than_workers_fails_everywhere() {
    let points = [[0.0, 0.0], [1.0, 1.0]];
    let results = run_group(3, |c| c.len(), init_from(&points));
    for r in results {
        assert_eq!(
            r.unwrap_err(),
            CollectionError::Config(ConfigError::TooFewParticles {
                particles: 2,
                workers: 3
            })
        );
    }
}

#[test]
fn supplied_labels_do_not_bypass_worker_count_check() {
    let init = init_from(&[[0.0, 0.0]]).with_partitions(vec![0]);
    let results = run_group(2, |c| c.len(), init);
    for r in results {
        assert_eq!(
            r.unwrap_err(),
            CollectionError::Config(ConfigError::TooFewParticles {
                particles: 1,
                workers: 2
            })
        );
    }
}

#[test]
fn out_of_range_label_fails_everywhere() {
    let points = [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]];
    let init = init_from(&points).with_partitions(vec![0, 2, 1]);
    let results = run_group(2, |c| c.len(), init);
    for r in results {
        assert_eq!(
            r.unwrap_err(),
            CollectionError::Config(ConfigError::PartitionOutOfRange {
                label: 2,
                workers: 2
            })
        );
    }
}

#[test]
fn added_particle_has_exactly_one_owner_and_rebased_id() {
    let points = clustered(&[[0.0, 0.0], [120.0, 60.0]], 5, 1.0, 8);
    let init = init_from(&points).with_ids(vec![3, 40, 7, 12, 9, 1, 0, 2, 5, 6]);
    let results = run_group(
        2,
        |mut c| {
            let pos = c
                .add_single(Particle::new(119.0, 59.0, 0.0, 0.0))
                .unwrap();
            let id = pos.map(|i| c.get_by_index(i).unwrap().id);
            let counts = c.worker_counts().unwrap();
            (id, counts)
        },
        init,
    );
    let results: Vec<_> = results.into_iter().map(Result::unwrap).collect();
    let owners: Vec<ParticleId> = results.iter().filter_map(|(id, _)| *id).collect();
    assert_eq!(owners, vec![ParticleId(41)]);

    let counts = results[0].1.as_ref().unwrap();
    assert_eq!(counts.iter().sum::<usize>(), 11);
    assert!(results[1].1.is_none());
}
