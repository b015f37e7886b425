mod common;

use artifact_store::{Error, Flat, Store};
use tempfile::TempDir;

fn store_over(tempdir: &TempDir) -> Store {
    Store::builder(Flat)
        .with_state("staging", tempdir.path().join("staging"))
        .with_state("committed", tempdir.path().join("committed"))
        .build()
}

/// A fresh `Store` (simulating a process restart) finds an on-disk file
/// left by a prior one, via the single-hit reload path, without the
/// entry ever having been inserted into this instance's map.
#[test]
fn fresh_store_reloads_entry_left_on_disk() {
    let tempdir = TempDir::new().unwrap();
    {
        let store = store_over(&tempdir);
        let staging = store.state_id("staging").unwrap();
        store.new_file_op().create_file("a.txt", staging, 128).unwrap();
    }

    let store = store_over(&tempdir);
    assert!(store.is_empty());
    let stat = store.new_file_op().get_file_stat("a.txt").unwrap();
    assert_eq!(stat.size, 128);
    assert_eq!(store.state_id("staging"), Some(stat.state));
}

/// A name present under two states at once (e.g. hand-placed, or left
/// over from a non-atomic crash mid-move) is reported as corrupt rather
/// than picking one arbitrarily.
#[test]
fn entry_present_in_two_states_is_corrupt() {
    let tempdir = TempDir::new().unwrap();
    std::fs::create_dir_all(tempdir.path().join("staging")).unwrap();
    std::fs::create_dir_all(tempdir.path().join("committed")).unwrap();
    std::fs::write(tempdir.path().join("staging").join("a.txt"), b"x").unwrap();
    std::fs::write(tempdir.path().join("committed").join("a.txt"), b"y").unwrap();

    let store = store_over(&tempdir);
    let err = store.new_file_op().get_file_stat("a.txt").unwrap_err();
    assert!(matches!(err, Error::Corrupt { .. }));
}
