use mpx::Info;

#[test]
fn duplicate_insert_keeps_first_value() {
    let mut store = Info::new();
    store.insert("host", "node01");
    store.insert("host", "node02");
    assert_eq!(store.len(), 1);
    assert_eq!(store.get("host").as_deref(), Some("node01"));
}

#[test]
fn merge_moves_only_keys_missing_from_the_target() {
    let mut store = Info::from([("a", "1"), ("b", "2")]);
    let mut store2 = Info::from([("a", "9"), ("c", "3")]);
    store.merge(&mut store2);
    assert_eq!(store, Info::from([("a", "1"), ("b", "2"), ("c", "3")]));
    assert_eq!(store2, Info::from([("a", "9")]));
}

#[test]
fn values_round_trip_byte_for_byte() {
    let mut store = Info::new();
    let value = "spaces  and\ttabs and unicode: \u{00e9}";
    store.insert("key", value);
    let back = store.get("key").unwrap();
    assert_eq!(back, value);
    assert_eq!(back.len(), value.len());
}

#[test]
fn front_erase_shifts_later_positions_down() {
    let mut store = Info::from([("a", "1"), ("b", "2"), ("c", "3")]);
    let mut iter = store.iter();
    iter.next();
    drop(iter);
    store.erase_at(0);
    // The element that used to live at position 1 is now position 0.
    let (key, value) = store.get_at(0).unwrap();
    assert_eq!((key.as_str(), value.as_str()), ("b", "2"));
    assert_eq!(store.iter().len(), 2);
}

#[test]
fn extract_then_contains_is_false() {
    let mut store = Info::from([("host", "node01")]);
    let removed = store.extract("host").unwrap();
    assert_eq!(removed, ("host".to_string(), "node01".to_string()));
    assert!(!store.contains("host"));
    assert_eq!(store.extract("host"), None);
    assert!(store.is_empty());
}

#[test]
fn environment_info_describes_the_process() {
    let env = Info::env();
    assert!(env.contains("command"));
    assert!(env.contains("maxprocs"));
    // Wrapping is read-only sharing: a second wrapper sees the same table.
    assert_eq!(Info::env().get("command"), env.get("command"));
}

#[test]
fn collected_pairs_build_a_store() {
    let pairs = vec![("one", "1"), ("two", "2"), ("three", "3")];
    let store: Info = pairs.iter().copied().collect();
    assert_eq!(store.len(), 3);
    for (key, value) in &pairs {
        assert_eq!(store.get(key).as_deref(), Some(*value));
    }
    let keys = store.keys();
    let values = store.values();
    assert_eq!(keys.len(), 3);
    assert_eq!(values.len(), 3);
}
