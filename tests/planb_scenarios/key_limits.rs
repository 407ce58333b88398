//! Key ceiling and variable tier boundaries

use planb::codec::val::tagged_len;
use planb::{Error, KeyType, SessionDb, SessionSettings, Val};

use crate::common::{session, table_len};

/// A string whose tagged encoding is exactly `len` bytes
fn tagged_string(len: usize) -> String {
    let s = "t".repeat(len - 1);
    assert_eq!(tagged_len(&Val::from(s.as_str())), len);
    s
}

#[test]
fn test_limited_string_over_length_is_an_error() {
    let db = SessionDb::create(SessionSettings::with_key_type(KeyType::String)).unwrap();
    db.insert(&session("a".repeat(495), 0, 1)).unwrap();

    let err = db.insert(&session("a".repeat(496), 0, 1)).unwrap_err();
    assert!(matches!(err, Error::KeyTooLong { actual: 512, max: 511 }));
    assert_eq!(db.count().unwrap(), 1);

    // Never stored, so probing is a miss rather than an error
    assert_eq!(db.get(&session("a".repeat(496), 0, 1)).unwrap(), None);
}

#[test]
fn test_variable_threshold_boundaries() {
    let db = SessionDb::create(SessionSettings::default()).unwrap();
    let steps = [
        (32, 0, 0),
        (33, 1, 0),
        (256, 2, 0),
        (257, 2, 1),
    ];
    for (len, uids, hashes) in steps {
        let s = session(tagged_string(len), 0, 1);
        db.insert(&s).unwrap();
        assert_eq!(table_len(&db, "key-uid"), uids, "tagged length {len}");
        assert_eq!(table_len(&db, "key-hash"), hashes, "tagged length {len}");
        assert_eq!(db.get(&s).unwrap(), Some(s));
    }
}

#[test]
fn test_uid_lookup_value_over_ceiling() {
    let db = SessionDb::create(SessionSettings::with_key_type(KeyType::UidLookup)).unwrap();
    let err = db.insert(&session("w".repeat(600), 0, 1)).unwrap_err();
    assert!(matches!(err, Error::KeyTooLong { .. }));
    assert_eq!(table_len(&db, "key-uid"), 0);

    // Hash lookup keys stay short however long the value
    let db = SessionDb::create(SessionSettings::with_key_type(KeyType::HashLookup)).unwrap();
    let long = session("w".repeat(600), 0, 1);
    db.insert(&long).unwrap();
    assert_eq!(db.get(&long).unwrap(), Some(long));
}

#[test]
fn test_settings_that_cannot_fit_the_ceiling() {
    let mut settings = SessionSettings::default();
    settings.max_key_length = 40;
    assert!(matches!(
        SessionDb::create(settings),
        Err(Error::InvalidConfig(_))
    ));

    let mut settings = SessionSettings::default();
    settings.key_schema.uid_lookup_threshold = 300;
    assert!(matches!(
        SessionDb::create(settings),
        Err(Error::InvalidConfig(_))
    ));
}
