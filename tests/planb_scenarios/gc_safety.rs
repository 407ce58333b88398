//! Mark-and-sweep leaves exactly the lookups live keys reference

use proptest::prelude::*;
use rustc_hash::FxHashSet;

use planb::codec::GcPhase;
use planb::{KeyPrefix, ReadTxn, Session, SessionDb, SessionSettings, TableRegistry};

use crate::common::{at, lookup_entries, session};

/// Two inline, two sequential and two hashed subjects
fn pool() -> Vec<String> {
    vec![
        "a".to_string(),
        "b".repeat(20),
        "c".repeat(40),
        "d".repeat(200),
        "e".repeat(300),
        "f".repeat(900),
    ]
}

#[test]
fn test_gc_keeps_k_entries_then_none() {
    let db = SessionDb::create(SessionSettings::default()).unwrap();
    let values = ["u".repeat(50), "v".repeat(60), "h".repeat(500), "i".repeat(600)];
    let sessions: Vec<Session> = (0..12)
        .map(|i| session(values[i % values.len()].as_str(), i as i64, i as i64 + 1))
        .collect();
    db.insert_all(&sessions).unwrap();

    // Interned by a writer that never stored its key
    let orphan = session("o".repeat(70), 0, 0);
    let mut buf = Vec::new();
    db.env()
        .write(|txn| db.serde().write(txn, &orphan, &mut buf).map(|_| ()))
        .unwrap();
    assert_eq!(lookup_entries(&db), 5);

    let stats = db.collect_garbage().unwrap();
    assert_eq!(stats.keys_scanned, 12);
    assert_eq!(stats.swept, 1);
    assert_eq!(lookup_entries(&db), 4);
    for s in &sessions {
        assert_eq!(db.get(s).unwrap().as_ref(), Some(s));
    }

    // Retention sweeps in the same transaction as the deletes
    assert_eq!(db.delete_old_data(at(1_000), true).unwrap(), 12);
    assert_eq!(lookup_entries(&db), 0);
    assert_eq!(db.collect_garbage().unwrap().swept, 0);
}

#[test]
fn test_aborted_gc_deletes_nothing() {
    let db = SessionDb::create(SessionSettings::default()).unwrap();
    let orphan = session("o".repeat(70), 0, 0);
    let mut buf = Vec::new();
    db.env()
        .write(|txn| db.serde().write(txn, &orphan, &mut buf).map(|_| ()))
        .unwrap();

    let recorder = db.serde().used_lookups_recorder();
    let uid = db.env().open_table("key-uid");
    {
        let mut txn = db.env().begin_write();
        let stats = db
            .garbage_collector()
            .run(&mut txn, db.table(), recorder.as_ref())
            .unwrap();
        assert_eq!(stats.swept, 1);
        assert_eq!(txn.entry_count(uid).unwrap(), 0);
        // dropped without commit
    }
    assert_eq!(db.garbage_collector().phase(), GcPhase::Idle);
    assert_eq!(lookup_entries(&db), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_retention_keeps_exactly_surviving_lookups(
        picks in prop::collection::vec(0usize..6, 1..24),
        cut in 0i64..24,
    ) {
        let db = SessionDb::create(SessionSettings::default()).unwrap();
        let pool = pool();
        let sessions: Vec<Session> = picks
            .iter()
            .enumerate()
            .map(|(i, &pick)| {
                Session::new(KeyPrefix::val(pool[pick].as_str()), at(0), at(i as i64)).unwrap()
            })
            .collect();
        db.insert_all(&sessions).unwrap();
        db.delete_old_data(at(cut), true).unwrap();

        // Inline subjects (the first two) never use a lookup
        let expected: FxHashSet<usize> = picks
            .iter()
            .enumerate()
            .filter(|&(i, &pick)| i as i64 >= cut && pick >= 2)
            .map(|(_, &pick)| pick)
            .collect();
        prop_assert_eq!(lookup_entries(&db), expected.len() as u64);
        prop_assert_eq!(db.collect_garbage().unwrap().swept, 0);
    }
}
