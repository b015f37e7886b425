use artifact_store::Flat;
use tempfile::TempDir;

fn store_over(tempdir: &TempDir) -> artifact_store::Store {
    artifact_store::Store::builder(Flat)
        .with_state("staging", tempdir.path().join("staging"))
        .with_state("committed", tempdir.path().join("committed"))
        .build()
}

/// A sidecar left on disk by a prior process (so this `FileEntry` instance
/// never loaded it into its metadata cache) must still move with the main
/// file, not get stranded in the old state's directory.
#[test]
fn move_carries_sidecars_never_loaded_by_this_instance() {
    let tempdir = TempDir::new().unwrap();
    {
        let store = store_over(&tempdir);
        let staging = store.state_id("staging").unwrap();
        store.new_file_op().create_file("a.txt", staging, 0).unwrap();
    }
    std::fs::write(tempdir.path().join("staging").join("a.txt_checksum"), b"stale-cache-miss").unwrap();

    let store = store_over(&tempdir);
    assert!(store.is_empty());
    let staging = store.state_id("staging").unwrap();
    let committed = store.state_id("committed").unwrap();
    store.new_file_op().accept_state(staging).move_file("a.txt", committed).unwrap();

    assert!(!tempdir.path().join("staging").join("a.txt_checksum").exists());
    assert_eq!(
        std::fs::read(tempdir.path().join("committed").join("a.txt_checksum")).unwrap(),
        b"stale-cache-miss"
    );
}

/// A sidecar left on disk by a prior process must still be removed by
/// `DeleteFile`, not just the ones this `FileEntry` instance happened to
/// cache in memory.
#[test]
fn delete_removes_sidecars_never_loaded_by_this_instance() {
    let tempdir = TempDir::new().unwrap();
    {
        let store = store_over(&tempdir);
        let staging = store.state_id("staging").unwrap();
        store.new_file_op().create_file("a.txt", staging, 0).unwrap();
    }
    let sidecar = tempdir.path().join("staging").join("a.txt_checksum");
    std::fs::write(&sidecar, b"orphan").unwrap();

    let store = store_over(&tempdir);
    assert!(store.is_empty());
    store.new_file_op().delete_file("a.txt").unwrap();

    assert!(!sidecar.exists(), "sidecar this instance never cached should still be deleted");
}
