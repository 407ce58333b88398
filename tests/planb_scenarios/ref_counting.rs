//! Reference data shared across keys and maps

use planb::codec::value_store::{
    clone_and_decrement_ref_count, clone_and_increment_ref_count, read_ref_count, ValueStoreMeta,
};
use planb::{Error, RefDataStore, Val};

#[test]
fn test_shared_value_lives_until_last_reference() {
    let store = RefDataStore::create();
    let shared = Val::from("Europe/Paris");
    for map in ["site", "office", "warehouse"] {
        for i in 0..10 {
            store.put(map, &format!("k{i}"), &shared).unwrap();
        }
    }
    store.put("site", "other", &Val::Int(-1)).unwrap();
    assert_eq!(store.entry_count().unwrap(), 31);
    assert_eq!(store.value_count().unwrap(), 2);
    assert_eq!(store.ref_count("office", "k3").unwrap(), Some(30));

    assert_eq!(store.purge_map("site").unwrap(), 11);
    assert_eq!(store.ref_count("office", "k3").unwrap(), Some(20));
    assert_eq!(store.value_count().unwrap(), 1);

    store.purge_map("office").unwrap();
    store.purge_map("warehouse").unwrap();
    assert_eq!(store.entry_count().unwrap(), 0);
    assert_eq!(store.value_count().unwrap(), 0);
}

#[test]
fn test_every_value_type_round_trips() {
    let store = RefDataStore::create();
    let values = [
        Val::Boolean(false),
        Val::Byte(-3),
        Val::Short(300),
        Val::Int(70_000),
        Val::Long(i64::MIN),
        Val::Float(1.5),
        Val::Double(-0.25),
        Val::date_from_millis(1_700_000_000_000),
        Val::from(""),
        Val::from("plain"),
    ];
    for (i, val) in values.iter().enumerate() {
        store.put("types", &i.to_string(), val).unwrap();
    }
    for (i, val) in values.iter().enumerate() {
        assert_eq!(store.get("types", &i.to_string()).unwrap().as_ref(), Some(val));
    }
}

#[test]
fn test_ref_count_bounds() {
    let max = ValueStoreMeta::new(9, u32::MAX).encode();
    assert!(matches!(
        clone_and_increment_ref_count(&max),
        Err(Error::RefCountOverflow)
    ));
    let zero = ValueStoreMeta::new(9, 0).encode();
    assert!(matches!(
        clone_and_decrement_ref_count(&zero),
        Err(Error::RefCountUnderflow)
    ));
    let one = clone_and_increment_ref_count(&zero).unwrap();
    assert_eq!(read_ref_count(&one).unwrap(), 1);
    // The source buffer is untouched
    assert_eq!(read_ref_count(&zero).unwrap(), 0);
}
