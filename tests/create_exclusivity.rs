mod common;

use common::Fixture;

/// Spec property: racing creates of the same name resolve to exactly one
/// winner, the rest observing `FileExists`, regardless of which thread's
/// entry object ends up registered.
#[test]
fn racing_creates_exactly_one_winner() {
    let f = Fixture::new();
    let target = f.staging;

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..16)
            .map(|_| scope.spawn(|| f.store.new_file_op().create_file("race.bin", target, 4096)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let ok_count = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(ok_count, 1, "expected exactly one winner, got {results:?}");

    let stat = f.store.new_file_op().get_file_stat("race.bin").unwrap();
    assert_eq!(stat.size, 4096);
}
