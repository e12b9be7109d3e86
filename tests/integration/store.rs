//! Service list scenarios: publication, no-op preservation, rollback, and
//! shadow isolation across handles.

use crate::*;

#[test]
fn empty_list_publishes_the_bare_prefix() {
    let store = TestStore::new();
    let mut list = store.open();
    list.commit().unwrap();

    assert_eq!(store.advertised(), b"##");
    assert_eq!(list.count().unwrap(), 0);
}

#[test]
fn three_services_advertise_in_position_order() {
    let store = TestStore::new();
    let mut list = store.open();
    seed_catalog(&mut list);

    let ssid = store.advertised();
    assert_eq!(ssid, b"##^1^2,service2^3");
    assert_eq!(ssid.len(), 17);
}

#[test]
fn noop_edit_chain_preserves_the_publication_time() {
    let store = TestStore::new();
    let mut list = store.open();
    seed_catalog(&mut list);
    let t0 = list.last_published_mod_time().unwrap();
    assert_ne!(t0, 0);

    // Cross a wall-clock second so a restamp would be visible.
    std::thread::sleep(std::time::Duration::from_millis(1100));

    // Edits whose net effect leaves every tuple as published.
    list.replace(
        &draft(4, "http://odb.org")
            .with_desc("desc4")
            .with_long_desc("Our Daily Bread"),
        2,
    )
    .unwrap();
    list.replace(&draft(3, "uri3"), 2).unwrap();
    list.remove(0).unwrap();
    list.add_first(&draft(1, "uri1").with_long_desc("service1"))
        .unwrap();
    list.commit().unwrap();

    assert_eq!(list.last_published_mod_time().unwrap(), t0);
    assert_eq!(store.advertised(), b"##^1^2,service2^3");
}

#[test]
fn oversized_catalog_is_rejected_and_nothing_moves() {
    let store = TestStore::new();
    let mut list = store.open();
    seed_catalog(&mut list);
    let t0 = list.last_published_mod_time().unwrap();

    list.add_last(&draft(77777, "uri-x").with_desc("way too descriptive"))
        .unwrap();
    list.add_last(&draft(88888, "uri-y").with_desc("and then some"))
        .unwrap();

    assert!(matches!(
        list.commit(),
        Err(lantern_store::StoreError::SsidTooLong)
    ));
    assert_eq!(store.advertised(), b"##^1^2,service2^3");
    assert_eq!(list.last_published_mod_time().unwrap(), t0);

    // The shadow still holds the oversized set; pruning it makes the
    // commit go through.
    assert_eq!(list.count().unwrap(), 5);
    list.remove(4).unwrap();
    list.remove(3).unwrap();
    list.commit().unwrap();
    assert_eq!(store.advertised(), b"##^1^2,service2^3");
}

#[test]
fn contiguity_holds_at_every_observable_moment() {
    let store = TestStore::new();
    let mut list = store.open();
    seed_catalog(&mut list);

    let checkpoints: [&dyn Fn(&mut ServiceList); 4] = [
        &|l| l.insert(&draft(9, "uri9"), 1).unwrap(),
        &|l| l.remove(0).unwrap(),
        &|l| l.add_first(&draft(8, "uri8")).unwrap(),
        &|l| l.remove(2).unwrap(),
    ];
    for edit in checkpoints {
        edit(&mut list);
        let count = list.count().unwrap();
        for i in 0..count {
            assert!(list.get(i).unwrap().is_some(), "gap at {i} of {count}");
        }
        assert!(list.get(count).unwrap().is_none());
    }
}

#[test]
fn writers_are_isolated_until_commit() {
    let store = TestStore::new();
    let mut writer = store.open();
    seed_catalog(&mut writer);

    let mut editor = store.open();
    editor.replace(&draft(42, "uri42"), 0).unwrap();

    // A reader that snapshots before the commit keeps its view.
    let mut snapshot = store.open();
    assert_eq!(snapshot.get(0).unwrap().unwrap().cat_id, 1);

    editor.commit().unwrap();
    assert_eq!(snapshot.get(0).unwrap().unwrap().cat_id, 1);

    // A handle loaded after the commit observes it.
    let mut fresh = store.open();
    assert_eq!(fresh.get(0).unwrap().unwrap().cat_id, 42);
    assert!(store.advertised().starts_with(b"##^42"));
}
