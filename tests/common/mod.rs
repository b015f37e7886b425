use artifact_store::{CasSharded, Flat, Store, StateId};
use tempfile::TempDir;

/// Two-state (`staging`, `committed`) store rooted in a fresh temp dir,
/// unbounded map, no buffer pool — the default shape most tests want.
pub struct Fixture {
    pub tempdir: TempDir,
    pub store: Store,
    pub staging: StateId,
    pub committed: StateId,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_factory(Flat)
    }

    pub fn cas() -> Self {
        Self::with_factory(CasSharded::default())
    }

    fn with_factory(factory: impl artifact_store::EntryFactory + 'static) -> Self {
        let tempdir = TempDir::new().expect("create temp dir");
        let store = Store::builder(factory)
            .with_state("staging", tempdir.path().join("staging"))
            .with_state("committed", tempdir.path().join("committed"))
            .build();
        let staging = store.state_id("staging").unwrap();
        let committed = store.state_id("committed").unwrap();
        Self { tempdir, store, staging, committed }
    }
}
