//! Seed a collection, retire some particles and export a batch.
//!
//! Run with `RUST_LOG=debug` to see compaction logging.

use drift_bench::reference_init;
use drift_collection::{
    CollectionConfig, ParticleCollection, SoloComm, WriteSelection, WriteState,
};
use drift_core::{CollectionError, SequentialIssuer};

fn main() -> Result<(), CollectionError> {
    env_logger::init();

    let mut coll = ParticleCollection::from_init(
        CollectionConfig::new(2024),
        Box::new(SequentialIssuer::new()),
        Box::new(SoloComm),
        reference_init(1_000, 2024),
    )?;

    // Retire everything in the southern hemisphere.
    let south: Vec<_> = coll.iter().filter(|p| p.lat < 0.0).map(|p| p.id).collect();
    for id in &south {
        coll.delete_by_id(*id);
    }

    let mut state = WriteState::default();
    let deleted = coll.to_write_batch(0.0, &mut state, &WriteSelection::DeletedOnly);
    log::info!("wrote {} deleted particles", deleted.rows());

    let removed = coll.compact();
    let batch = coll.to_write_batch(0.0, &mut state, &WriteSelection::Active);
    println!(
        "removed {removed}, {} remain, {} rows written",
        coll.len(),
        batch.rows()
    );
    Ok(())
}
