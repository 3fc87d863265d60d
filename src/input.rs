//! Caller-side input shapes: bulk update sources and key sets.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::{Error, Result};
use crate::value::Value;

/// The shapes a bulk update may be given in.
pub enum UpdateSource<'a> {
    /// Key to value mapping. Iteration order is unspecified; keys are unique.
    Mapping(HashMap<Value, Value>),
    /// Ordered pairs, applied in order. Later duplicates win.
    Pairs(Vec<(Value, Value)>),
    /// One-shot sequence, drained into a vector before anything is written.
    Drain(Box<dyn Iterator<Item = (Value, Value)> + 'a>),
    /// Untyped records; each must hold exactly `[key, value]`.
    Records(Vec<Vec<Value>>),
}

impl fmt::Debug for UpdateSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateSource::Mapping(m) => f.debug_tuple("Mapping").field(m).finish(),
            UpdateSource::Pairs(p) => f.debug_tuple("Pairs").field(p).finish(),
            UpdateSource::Drain(_) => f.write_str("Drain(..)"),
            UpdateSource::Records(r) => f.debug_tuple("Records").field(r).finish(),
        }
    }
}

impl UpdateSource<'_> {
    fn into_pairs(self) -> Result<Vec<(Value, Value)>> {
        match self {
            UpdateSource::Mapping(map) => Ok(map.into_iter().collect()),
            UpdateSource::Pairs(pairs) => Ok(pairs),
            UpdateSource::Drain(iter) => Ok(iter.collect()),
            UpdateSource::Records(records) => records
                .into_iter()
                .enumerate()
                .map(|(i, record)| {
                    let len = record.len();
                    let mut fields = record.into_iter();
                    match (fields.next(), fields.next(), fields.next()) {
                        (Some(key), Some(value), None) => Ok((key, value)),
                        _ => Err(Error::InvalidArgument(format!(
                            "record {i} has {len} fields, expected a (key, value) pair"
                        ))),
                    }
                })
                .collect(),
        }
    }
}

/// One bulk update: an optional positional source plus named pairs.
///
/// Named pairs are appended after the source, so a name that repeats a
/// source key overrides it.
#[derive(Debug, Default)]
pub struct Update<'a> {
    source: Option<UpdateSource<'a>>,
    named: Vec<(String, Value)>,
}

impl<'a> Update<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update from a one-shot iterator of pairs. The iterator may borrow
    /// caller data; it is drained before anything is written.
    pub fn drain<I, K, V>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        I::IntoIter: 'a,
        K: Into<Value> + 'a,
        V: Into<Value> + 'a,
    {
        UpdateSource::Drain(Box::new(
            iter.into_iter().map(|(k, v)| (k.into(), v.into())),
        ))
        .into()
    }

    /// Update from untyped records, each expected to be `[key, value]`.
    pub fn records(records: Vec<Vec<Value>>) -> Self {
        UpdateSource::Records(records).into()
    }

    /// Add a named pair to the same batch.
    pub fn named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.push((name.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.named.is_empty()
    }

    /// Normalise every shape into one ordered batch of pairs.
    pub(crate) fn into_pairs(self) -> Result<Vec<(Value, Value)>> {
        let mut pairs = match self.source {
            Some(source) => source.into_pairs()?,
            None => Vec::new(),
        };
        pairs.extend(
            self.named
                .into_iter()
                .map(|(name, value)| (Value::Text(name), value)),
        );
        Ok(pairs)
    }
}

impl<'a> From<UpdateSource<'a>> for Update<'a> {
    fn from(source: UpdateSource<'a>) -> Self {
        Self {
            source: Some(source),
            named: Vec::new(),
        }
    }
}

impl<K: Into<Value>, V: Into<Value>> From<HashMap<K, V>> for Update<'_> {
    fn from(map: HashMap<K, V>) -> Self {
        UpdateSource::Mapping(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect()).into()
    }
}

impl<K: Into<Value>, V: Into<Value>> From<Vec<(K, V)>> for Update<'_> {
    fn from(pairs: Vec<(K, V)>) -> Self {
        UpdateSource::Pairs(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()).into()
    }
}

impl<K: Into<Value>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Update<'_> {
    fn from(pairs: [(K, V); N]) -> Self {
        UpdateSource::Pairs(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()).into()
    }
}

/// Keys for `get_many`/`remove_many`: a lone key or a collection of keys.
///
/// Repeated keys are dropped when the set is built, keeping the first
/// occurrence, so a key is bound at most once however the set is split into
/// statements. A `Vec<u8>` converts to a set of integer keys; use
/// [`KeySet::one`] for a single blob key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeySet(Vec<Value>);

impl KeySet {
    pub fn one(key: impl Into<Value>) -> Self {
        Self(vec![key.into()])
    }

    pub fn many<I>(keys: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        keys.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn as_slice(&self) -> &[Value] {
        &self.0
    }
}

impl<T: Into<Value>> FromIterator<T> for KeySet {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for key in iter.into_iter().map(Into::into) {
            if !seen.contains(&key) {
                seen.insert(key.clone());
                keys.push(key);
            }
        }
        Self(keys)
    }
}

macro_rules! key_set_from_scalar {
    ($($t:ty),*) => {
        $(
            impl From<$t> for KeySet {
                fn from(key: $t) -> Self {
                    Self::one(key)
                }
            }
        )*
    };
}

key_set_from_scalar!(Value, i8, i16, i32, i64, u8, u16, u32, bool, f32, f64, String, &str);

impl<T: Into<Value>> From<Vec<T>> for KeySet {
    fn from(keys: Vec<T>) -> Self {
        keys.into_iter().collect()
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for KeySet {
    fn from(keys: [T; N]) -> Self {
        keys.into_iter().collect()
    }
}

impl From<&[Value]> for KeySet {
    fn from(keys: &[Value]) -> Self {
        keys.iter().collect()
    }
}
