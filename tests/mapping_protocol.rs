// Bulk operations through the Mapping trait: update shapes, key-set reads
// and removals.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use dbdict::{Error, KeySet, Mapping, SqliteConfig, SqliteDict, Update, UpdateSource, Value};

fn items<M: Mapping>(dict: &M) -> Result<HashSet<(Value, Value)>> {
    Ok(dict.items()?.collect::<dbdict::Result<HashSet<_>>>()?)
}

fn pairs(range: std::ops::Range<i64>) -> Vec<(Value, Value)> {
    range.map(|i| (Value::from(i), Value::from(i))).collect()
}

#[test]
fn update_shapes_agree() -> Result<()> {
    let expected: HashSet<_> = pairs(0..10).into_iter().collect();

    let mut dict = SqliteDict::open_in_memory()?;
    let shapes: Vec<Update> = vec![
        (0..10i64).map(|i| (i, i)).collect::<HashMap<_, _>>().into(),
        (0..10i64).map(|i| (i, i)).collect::<Vec<_>>().into(),
        [(0i64, 0i64), (1, 1), (2, 2), (3, 3), (4, 4), (5, 5), (6, 6), (7, 7), (8, 8), (9, 9)].into(),
        Update::drain((0..10i64).map(|i| (i, i))),
        Update::records(
            pairs(0..10)
                .into_iter()
                .map(|(k, v)| vec![k, v])
                .collect(),
        ),
    ];
    for shape in shapes {
        dict.update(shape)?;
        assert_eq!(items(&dict)?, expected);
        dict.clear()?;
    }
    Ok(())
}

#[test]
fn update_later_duplicates_win() -> Result<()> {
    let mut dict = SqliteDict::open_in_memory()?;
    dict.update(vec![(1, "a"), (2, "b"), (1, "c")])?;
    assert_eq!(dict.size()?, 2);
    assert_eq!(dict.get(1)?, Value::from("c"));

    // named pairs are applied after the positional source
    dict.update(Update::from(vec![("foo", 1)]).named("foo", 2).named("bar", 3))?;
    assert_eq!(dict.get("foo")?, Value::Integer(2));
    assert_eq!(dict.get("bar")?, Value::Integer(3));
    Ok(())
}

#[test]
fn update_with_named_pairs_only() -> Result<()> {
    let mut dict = SqliteDict::open_in_memory()?;
    dict.update(Update::new().named("foo", 1).named("bar", 2))?;
    let expected: HashSet<_> = [
        (Value::from("foo"), Value::from(1)),
        (Value::from("bar"), Value::from(2)),
    ]
    .into_iter()
    .collect();
    assert_eq!(items(&dict)?, expected);

    // nothing to apply is not an error
    dict.update(Update::new())?;
    assert_eq!(dict.size()?, 2);
    Ok(())
}

#[test]
fn uninterpretable_update_writes_nothing() -> Result<()> {
    let mut dict = SqliteDict::open_in_memory()?;
    let source = UpdateSource::Records(vec![
        vec![Value::from(1), Value::from("one")],
        vec![Value::from(2), Value::from("two"), Value::from("extra")],
    ]);
    let err = dict.update(source).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert_eq!(dict.size()?, 0);
    Ok(())
}

#[test]
fn get_many_skips_missing_keys() -> Result<()> {
    let mut dict = SqliteDict::open_in_memory()?;
    dict.update(pairs(0..10))?;

    let found: HashSet<_> = dict.get_many(KeySet::many(8..12))?.into_iter().collect();
    assert_eq!(found, pairs(8..10).into_iter().collect::<HashSet<_>>());

    assert_eq!(
        dict.get_many(Value::from(3))?,
        vec![(Value::from(3), Value::from(3))]
    );
    assert!(dict.get_many(KeySet::one(42))?.is_empty());
    assert!(dict.get_many(KeySet::default())?.is_empty());
    Ok(())
}

#[test]
fn remove_many_ignores_missing_keys() -> Result<()> {
    let mut dict = SqliteDict::open_in_memory()?;
    dict.update(pairs(0..10))?;

    dict.remove_many(KeySet::many([8, 9, 10, 11]))?;
    assert_eq!(dict.size()?, 8);
    assert!(dict.get_many(KeySet::many(8..10))?.is_empty());

    dict.remove_many(KeySet::one(0))?;
    dict.remove_many(KeySet::one(0))?;
    dict.remove_many(KeySet::default())?;
    assert_eq!(dict.size()?, 7);
    Ok(())
}

#[test]
fn key_sets_are_bound_not_spliced() -> Result<()> {
    let mut dict = SqliteDict::open_in_memory()?;
    dict.update(vec![("a", 1), ("b", 2)])?;

    let hostile = KeySet::many(["x') OR 1=1 --", "1) OR (1=1", "a' , 'b"]);
    assert!(dict.get_many(hostile.clone())?.is_empty());
    dict.remove_many(hostile)?;
    assert_eq!(dict.size()?, 2);

    // a key that looks like SQL is stored and matched literally
    dict.set("1) OR (1=1", 3)?;
    assert_eq!(dict.get_many(KeySet::one("1) OR (1=1"))?.len(), 1);
    Ok(())
}

#[test]
fn large_key_sets_are_chunked() -> Result<()> {
    let config = SqliteConfig::default().with_max_keys_per_statement(3);
    let mut dict = SqliteDict::with_config(config)?;
    dict.update(pairs(0..20))?;

    let found: HashSet<_> = dict.get_many(KeySet::many(5..25))?.into_iter().collect();
    assert_eq!(found, pairs(5..20).into_iter().collect::<HashSet<_>>());

    dict.remove_many(KeySet::many(0..17))?;
    assert_eq!(items(&dict)?, pairs(17..20).into_iter().collect::<HashSet<_>>());
    Ok(())
}

#[test]
fn repeated_keys_match_once_across_chunks() -> Result<()> {
    let config = SqliteConfig::default().with_max_keys_per_statement(1);
    let mut dict = SqliteDict::with_config(config)?;
    dict.set(1, "a")?;
    dict.set(2, "b")?;

    assert_eq!(
        dict.get_many(KeySet::many([1, 1]))?,
        vec![(Value::from(1), Value::from("a"))]
    );
    assert_eq!(dict.get_many(vec![2, 1, 2, 1])?.len(), 2);

    dict.remove_many(vec![1, 3, 1])?;
    assert_eq!(dict.size()?, 1);
    assert_eq!(dict.get(2)?, Value::from("b"));
    Ok(())
}

#[test]
fn repeated_keys_match_once_at_default_cap() -> Result<()> {
    let mut dict = SqliteDict::open_in_memory()?;
    dict.update(pairs(1..601))?;

    // the repeat of 1 would land past the first 500-key statement
    let mut keys: Vec<i64> = (1..601).collect();
    keys.push(1);
    keys.push(600);
    let found = dict.get_many(keys.clone())?;
    assert_eq!(found.len(), 600);
    assert_eq!(
        found.iter().filter(|(k, _)| *k == Value::from(1)).count(),
        1
    );

    dict.remove_many(keys)?;
    assert!(dict.is_empty()?);
    Ok(())
}

#[test]
fn scalar_and_vec_keys_convert_at_call_site() -> Result<()> {
    let mut dict = SqliteDict::open_in_memory()?;
    dict.update(pairs(0..5))?;

    assert_eq!(dict.get_many(3)?, vec![(Value::from(3), Value::from(3))]);
    assert_eq!(dict.get_many(vec![1, 3])?.len(), 2);
    assert_eq!(dict.get_many([0, 4, 9])?.len(), 2);

    dict.remove_many(4)?;
    dict.remove_many(vec![0, 1])?;
    assert_eq!(dict.size()?, 2);
    Ok(())
}

#[test]
fn drained_update_may_borrow_caller_data() -> Result<()> {
    let mut dict = SqliteDict::open_in_memory()?;
    let names = vec![(1, "one".to_string()), (2, "two".to_string())];
    dict.update(Update::drain(names.iter().map(|(k, v)| (*k, v.as_str()))))?;
    assert_eq!(dict.get(2)?, Value::from("two"));
    assert_eq!(names.len(), 2);
    Ok(())
}

#[test]
fn zero_key_cap_still_works() -> Result<()> {
    let config = SqliteConfig::default().with_max_keys_per_statement(0);
    let mut dict = SqliteDict::with_config(config)?;
    dict.update(pairs(0..3))?;
    assert_eq!(dict.get_many(KeySet::many(0..3))?.len(), 3);
    Ok(())
}

#[test]
fn bulk_round_trip_scenario() -> Result<()> {
    let mut dict = SqliteDict::open_in_memory()?;
    dict.update(HashMap::from([(1, "a"), (2, "b")]))?;
    assert_eq!(dict.size()?, 2);
    assert_eq!(dict.get(1)?, Value::from("a"));

    dict.remove_many(KeySet::many([1, 3]))?;
    assert_eq!(dict.size()?, 1);
    assert_eq!(
        dict.get_many(KeySet::many([1, 2]))?,
        vec![(Value::from(2), Value::from("b"))]
    );
    Ok(())
}
