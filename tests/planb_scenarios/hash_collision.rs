//! Values sharing a hash stay distinct and addressable

use std::sync::Arc;

use planb::codec::{HashLookupDb, ValueStoreDb};
use planb::{Error, KeyPrefix, KeyType, MemoryEnv, ReadTxn, TableRegistry};

use crate::common::{at, colliding_store, session, table_len, ConstantHash};

#[test]
fn test_colliding_subjects_round_trip() {
    let db = colliding_store(KeyType::HashLookup);
    let alpha = session("alpha", 0, 10);
    let beta = session("beta", 20, 30);
    db.insert_all(&[alpha.clone(), beta.clone()]).unwrap();
    assert_eq!(table_len(&db, "key-hash"), 2);

    assert_eq!(db.get(&alpha).unwrap(), Some(alpha.clone()));
    assert_eq!(db.get(&beta).unwrap(), Some(beta.clone()));
    assert_eq!(db.get_state(&KeyPrefix::val("alpha"), at(5)).unwrap(), Some(alpha));
    assert_eq!(db.get_state(&KeyPrefix::val("beta"), at(5)).unwrap(), None);
    assert_eq!(db.get_state(&KeyPrefix::val("beta"), at(25)).unwrap(), Some(beta));
    assert_eq!(db.get_state(&KeyPrefix::val("gamma"), at(25)).unwrap(), None);
}

#[test]
fn test_swept_unique_id_is_reused() {
    let db = colliding_store(KeyType::HashLookup);
    db.insert_all(&[session("alpha", 0, 10), session("beta", 20, 30)])
        .unwrap();
    assert_eq!(db.delete_old_data(at(15), true).unwrap(), 1);
    assert_eq!(table_len(&db, "key-hash"), 1);

    let gamma = session("gamma", 40, 50);
    db.insert(&gamma).unwrap();
    let txn = db.env().begin_read();
    let mut buf = Vec::new();
    let key = db
        .serde()
        .to_buffer_for_get(&txn, &gamma, &mut buf)
        .unwrap()
        .unwrap();
    // [hash u64][unique id u16][start][end]; alpha's slot 0 was free again
    assert_eq!(&key[8..10], &[0, 0]);
    assert_eq!(db.get(&gamma).unwrap(), Some(gamma));
}

#[test]
fn test_variable_keys_collide_only_in_hash_tier() {
    let db = colliding_store(KeyType::Variable);
    let sessions = [
        session("x".repeat(300), 0, 1),
        session("y".repeat(300), 0, 1),
        session("z".repeat(300), 0, 1),
        session("short", 0, 1),
    ];
    db.insert_all(&sessions).unwrap();
    assert_eq!(table_len(&db, "key-hash"), 3);
    assert_eq!(db.sessions().unwrap().len(), 4);
    for s in &sessions {
        assert_eq!(db.get(s).unwrap().as_ref(), Some(s));
    }
}

#[test]
fn test_bucket_exhaustion() {
    let env = MemoryEnv::new();
    let hash = HashLookupDb::new(&env, "capped", Arc::new(ConstantHash)).with_max_unique_id(1);
    let err = env
        .write(|txn| {
            hash.put(txn, b"one")?;
            hash.put(txn, b"two")?;
            // Already stored: no new slot needed
            hash.put(txn, b"one")?;
            hash.put(txn, b"three")
        })
        .unwrap_err();
    assert!(matches!(err, Error::HashCollisionExhausted { hash: 0x5eed, .. }));
    // The failed transaction left nothing behind
    assert_eq!(hash.entry_count(&env.begin_read()).unwrap(), 0);

    let store = ValueStoreDb::new(&env, "capped-values", Arc::new(ConstantHash)).with_max_unique_id(0);
    let err = env
        .write(|txn| {
            store.get_or_create(txn, 9, b"one")?;
            store.get_or_create(txn, 9, b"two")
        })
        .unwrap_err();
    assert!(matches!(err, Error::HashCollisionExhausted { .. }));
    let values = env.open_table("capped-values-value");
    assert_eq!(env.begin_read().entry_count(values).unwrap(), 0);
}
