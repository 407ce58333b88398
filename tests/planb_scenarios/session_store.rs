//! State queries, condensing and merging across whole stores

use planb::{KeyPrefix, KeyType, SessionDb, SessionSettings, TemporalPrecision};

use crate::common::{at, session};

#[test]
fn test_state_timeline() {
    let db = SessionDb::create(SessionSettings::default()).unwrap();
    let history = [
        session("valve", 0, 100),
        session("valve", 150, 200),
        session("valve", 200, 260),
        session("pump", 50, 500),
    ];
    db.insert_all(&history).unwrap();

    let valve = KeyPrefix::val("valve");
    assert_eq!(db.get_state(&valve, at(50)).unwrap(), Some(session("valve", 0, 100)));
    assert_eq!(db.get_state(&valve, at(120)).unwrap(), None);
    // 150..200 and 200..260 both cover 200; the earlier start wins
    assert_eq!(db.get_state(&valve, at(200)).unwrap(), Some(session("valve", 150, 200)));
    assert_eq!(db.get_state(&valve, at(230)).unwrap(), Some(session("valve", 200, 260)));

    assert_eq!(db.condense(at(1_000)).unwrap(), 1);
    assert_eq!(db.get_state(&valve, at(170)).unwrap(), Some(session("valve", 150, 260)));
    assert_eq!(db.get_state(&valve, at(120)).unwrap(), None);
    assert_eq!(db.count().unwrap(), 3);
}

#[test]
fn test_double_decode_is_idempotent() {
    let db = SessionDb::create(SessionSettings::default()).unwrap();
    let s = session("q".repeat(120), 3, 4);
    db.insert(&s).unwrap();
    let txn = db.env().begin_read();
    let mut buf = Vec::new();
    let key = db
        .serde()
        .to_buffer_for_get(&txn, &s, &mut buf)
        .unwrap()
        .unwrap();
    let first = db.serde().read(&txn, key).unwrap();
    let second = db.serde().read(&txn, key).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, s);
}

#[test]
fn test_merge_stores_with_lookups() {
    let a = SessionDb::create(SessionSettings::default()).unwrap();
    let b = SessionDb::create(SessionSettings::default()).unwrap();
    a.insert_all(&[session("m".repeat(100), 0, 10), session("n", 0, 10)])
        .unwrap();
    b.insert_all(&[
        session("p".repeat(100), 0, 10),
        session("m".repeat(100), 20, 30),
        session("h".repeat(400), 0, 10),
    ])
    .unwrap();

    assert_eq!(a.merge(&b).unwrap(), 3);
    assert_eq!(a.count().unwrap(), 5);
    let m = KeyPrefix::val("m".repeat(100));
    assert_eq!(a.get_state(&m, at(25)).unwrap(), Some(session("m".repeat(100), 20, 30)));
    assert_eq!(a.get_state(&m, at(5)).unwrap(), Some(session("m".repeat(100), 0, 10)));
    assert_eq!(a.collect_garbage().unwrap().swept, 0);
}

#[test]
fn test_each_precision_round_trips_through_the_store() {
    for precision in [
        TemporalPrecision::Nanosecond,
        TemporalPrecision::Millisecond,
        TemporalPrecision::Second,
        TemporalPrecision::Minute,
        TemporalPrecision::Hour,
        TemporalPrecision::Day,
    ] {
        let mut settings = SessionSettings::with_key_type(KeyType::Long);
        settings.key_schema.temporal_precision = precision;
        let db = SessionDb::create(settings).unwrap();
        // Multiples of a day survive every truncation
        let day = 86_400_000;
        let s = session(42i64, 3 * day, 5 * day);
        db.insert(&s).unwrap();
        assert_eq!(db.sessions().unwrap(), vec![s.clone()], "{precision:?}");
        assert_eq!(
            db.get_state(&KeyPrefix::val(42i64), at(4 * day)).unwrap(),
            Some(s),
            "{precision:?}"
        );
    }
}
