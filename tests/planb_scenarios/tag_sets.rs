//! Tag-set subjects through the session store

use planb::{KeyPrefix, KeyType, Session, SessionDb, SessionSettings, Tag, Val};

use crate::common::{at, table_len};

fn tags(pairs: &[(&str, Val)]) -> KeyPrefix {
    KeyPrefix::tags(pairs.iter().map(|(name, value)| Tag::new(*name, value.clone()))).unwrap()
}

#[test]
fn test_insertion_order_does_not_matter() {
    let db = SessionDb::create(SessionSettings::with_key_type(KeyType::Tags)).unwrap();
    let forward = tags(&[("host", Val::from("web-1")), ("port", Val::Int(443))]);
    let backward = tags(&[("port", Val::Int(443)), ("host", Val::from("web-1"))]);

    db.insert(&Session::new(forward.clone(), at(0), at(10)).unwrap())
        .unwrap();
    db.insert(&Session::new(backward.clone(), at(0), at(10)).unwrap())
        .unwrap();
    assert_eq!(db.count().unwrap(), 1);
    assert_eq!(
        db.get_state(&backward, at(5)).unwrap().map(|s| s.prefix().clone()),
        Some(forward)
    );
}

#[test]
fn test_retention_sweeps_all_three_levels() {
    let db = SessionDb::create(SessionSettings::with_key_type(KeyType::Tags)).unwrap();
    let kept = tags(&[("host", Val::from("a")), ("dc", Val::from("eu"))]);
    let dropped = tags(&[("rack", Val::Int(7))]);
    db.insert(&Session::new(kept.clone(), at(0), at(100)).unwrap())
        .unwrap();
    db.insert(&Session::new(dropped, at(0), at(10)).unwrap())
        .unwrap();
    // names host, dc, rack; tag sets [dc host], [rack]; values "a", "eu", 7
    assert_eq!(table_len(&db, "key-uid"), 8);

    assert_eq!(db.delete_old_data(at(50), true).unwrap(), 1);
    assert_eq!(table_len(&db, "key-uid"), 5);
    assert!(db.get_state(&kept, at(60)).unwrap().is_some());
}
