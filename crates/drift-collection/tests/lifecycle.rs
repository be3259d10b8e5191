//! Integration tests: insertion order, soft deletion, compaction and the
//! native mirror across whole-collection workflows.

use drift_collection::{CollectionConfig, ParticleCollection};
use drift_core::{NodeKind, Particle, ParticleId, SequentialIssuer};
use drift_nodes::StoreConfig;
use drift_test_utils::fixtures::along_equator;
use drift_test_utils::{assert_mirror_consistent, chain_ids, RecordingIssuer};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn collection_of(lons: &[f64]) -> ParticleCollection {
    let mut c =
        ParticleCollection::new(CollectionConfig::new(11), Box::new(SequentialIssuer::new()))
            .unwrap();
    c.add_multiple(along_equator(lons)).unwrap();
    c
}

fn head_ids(c: &ParticleCollection) -> Vec<ParticleId> {
    let head = c.get_node_by_index(0).map(|n| n.key());
    chain_ids(c.store(), head)
}

// ── Ordering ─────────────────────────────────────────────────────────

#[test]
fn traversal_follows_increasing_ids() {
    init_logging();
    let c = collection_of(&[0.0, 10.0, 20.0]);
    let begin = c.begin().unwrap();
    let second = begin.next().unwrap();
    assert!(begin.id() < second.id());
    assert!(second.id() < c.end().unwrap().id());
    assert_eq!(c.get_by_index(1).unwrap().lon, 10.0);

    let ids: Vec<_> = c.iter().map(|p| p.id).collect();
    assert_eq!(ids, head_ids(&c));
    assert_mirror_consistent(c.store());
}

#[test]
fn fresh_ids_continue_past_explicit_ones() {
    let mut c = collection_of(&[0.0, 10.0]);
    c.add_single(Particle::new(5.0, 0.0, 0.0, 0.0).with_id(ParticleId(3)))
        .unwrap();
    c.add_single(Particle::new(6.0, 0.0, 0.0, 0.0)).unwrap();
    c.add_single(Particle::new(7.0, 0.0, 0.0, 0.0)).unwrap();
    let ids: Vec<u64> = c.iter().map(|p| p.id.0).collect();
    assert_eq!(ids, vec![0, 1, 3, 4, 5]);

    // A lower explicit id slots in without moving the issuer back.
    c.add_single(Particle::new(8.0, 0.0, 0.0, 0.0).with_id(ParticleId(2)))
        .unwrap();
    c.add_single(Particle::new(9.0, 0.0, 0.0, 0.0)).unwrap();
    let ids: Vec<u64> = c.iter().map(|p| p.id.0).collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4, 5, 6]);
    assert_eq!(head_ids(&c), c.iter().map(|p| p.id).collect::<Vec<_>>());
    assert_mirror_consistent(c.store());
}

// ── Deletion ─────────────────────────────────────────────────────────

#[test]
fn soft_delete_is_hidden_until_compaction() {
    init_logging();
    let mut c = collection_of(&[0.0, 10.0, 20.0]);
    let doomed = c.get_by_index(1).unwrap().id;
    c.delete_by_index(1).unwrap();

    assert_eq!(c.len(), 3);
    assert!(c.iter().all(|p| p.id != doomed));
    assert_eq!(c.deleted_indices(), vec![1]);
    // Still chained natively until compacted.
    assert_eq!(head_ids(&c).len(), 3);

    assert_eq!(c.compact(), 1);
    assert_eq!(c.len(), 2);
    assert!(c.get_by_id(doomed).is_none());
    let lons: Vec<f64> = c.iter().map(|p| p.lon).collect();
    assert_eq!(lons, vec![0.0, 20.0]);
    assert_mirror_consistent(c.store());
}

#[test]
fn every_destroyed_id_released_exactly_once() {
    let issuer = RecordingIssuer::new();
    let log = issuer.clone();
    {
        let mut c = ParticleCollection::new(CollectionConfig::new(2), Box::new(issuer)).unwrap();
        c.add_multiple(along_equator(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]))
            .unwrap();
        c.delete_by_id(ParticleId(1));
        c.compact();
        c.remove_single_by_id(ParticleId(4)).unwrap();
        c.pop_single_by_index(Some(0)).unwrap();
        assert_eq!(log.released().len(), 3);
    }
    // Dropping the collection releases the rest.
    let mut released: Vec<u64> = log.released().iter().map(|id| id.0).collect();
    released.sort_unstable();
    assert_eq!(released, vec![0, 1, 2, 3, 4, 5]);
    log.assert_released_once();
}

#[test]
fn random_churn_keeps_mirror_consistent() {
    init_logging();
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let config = CollectionConfig::new(4)
        .with_store(StoreConfig::new(NodeKind::Mirrored).with_segment_len(16));
    let mut c = ParticleCollection::new(config, Box::new(SequentialIssuer::new())).unwrap();
    for round in 0..200 {
        match rng.random_range(0..4) {
            0 | 1 => {
                let lon = rng.random_range(-180.0..180.0);
                c.add_single(Particle::new(lon, 0.0, 0.0, round as f64))
                    .unwrap();
            }
            2 if !c.is_empty() => {
                let i = rng.random_range(0..c.len());
                c.delete_by_index(i).unwrap();
            }
            3 if !c.is_empty() => {
                let i = rng.random_range(0..c.len());
                c.remove_single_by_index(i).unwrap();
            }
            _ => {
                c.compact();
            }
        }
        assert_mirror_consistent(c.store());
        assert_eq!(head_ids(&c).len(), c.len());
    }
    let ids: Vec<_> = c.iter().map(|p| p.id).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn managed_collection_exposes_no_native_chain() {
    let config = CollectionConfig::new(0).with_store(StoreConfig::new(NodeKind::Managed));
    let mut c = ParticleCollection::new(config, Box::new(SequentialIssuer::new())).unwrap();
    c.add_multiple(along_equator(&[0.0, 1.0])).unwrap();
    assert_eq!(c.kind(), NodeKind::Managed);
    assert!(c.native_head().is_null());
    assert_eq!(c.native_ptr(0), None);
    assert_eq!(c.iter().count(), 2);
    assert_mirror_consistent(c.store());
}

#[test]
fn id_lookup_over_sequential_appends() {
    let mut c =
        ParticleCollection::new(CollectionConfig::new(0), Box::new(SequentialIssuer::starting_at(1)))
            .unwrap();
    let n = 64u64;
    for i in 0..n {
        c.add_single(Particle::new(i as f64, 0.0, 0.0, 0.0)).unwrap();
    }
    for k in 1..=n {
        let p = c.get_by_id(ParticleId(k)).unwrap();
        assert_eq!(p.id, ParticleId(k));
        assert_eq!(c.index_of_id(ParticleId(k)), Some((k - 1) as usize));
    }
    assert!(c.get_by_id(ParticleId(0)).is_none());
    assert!(c.get_by_id(ParticleId(n + 1)).is_none());
}

#[test]
fn compacting_twice_matches_compacting_once() {
    let mut once = collection_of(&[0.0, 10.0, 20.0]);
    let mut twice = collection_of(&[0.0, 10.0, 20.0]);
    once.delete_by_index(1).unwrap();
    twice.delete_by_index(1).unwrap();
    once.compact();
    twice.compact();
    assert_eq!(twice.compact(), 0);
    assert_eq!(once.to_vec(), twice.to_vec());
    assert_eq!(once.len(), twice.len());
}
