use crate::error::{Error, Result};
use crate::input::Update;
use crate::value::Value;

/// An associative container of [`Value`] keys to [`Value`] values.
///
/// Every method is fallible because implementations sit on top of storage
/// that can fail or be closed.
pub trait Mapping {
    type Keys<'a>: Iterator<Item = Result<Value>>
    where
        Self: 'a;
    type Values<'a>: Iterator<Item = Result<Value>>
    where
        Self: 'a;
    type Items<'a>: Iterator<Item = Result<(Value, Value)>>
    where
        Self: 'a;

    /// Value stored at `key`, or [`Error::NotFound`].
    fn get(&self, key: impl Into<Value>) -> Result<Value>;

    /// Insert or replace the value at `key`.
    fn set(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Result<()>;

    /// Remove `key`, or fail with [`Error::NotFound`].
    fn delete(&mut self, key: impl Into<Value>) -> Result<()>;

    fn contains(&self, key: impl Into<Value>) -> Result<bool>;

    fn size(&self) -> Result<usize>;

    fn keys(&self) -> Result<Self::Keys<'_>>;

    fn values(&self) -> Result<Self::Values<'_>>;

    fn items(&self) -> Result<Self::Items<'_>>;

    /// Apply every pair of `update` as one batch.
    fn update<'a>(&mut self, update: impl Into<Update<'a>>) -> Result<()>;

    /// Remove every entry.
    fn clear(&mut self) -> Result<()>;

    /// Remove and return some entry, or fail with [`Error::Exhausted`].
    /// Which entry is unspecified.
    fn pop_item(&mut self) -> Result<(Value, Value)>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.size()? == 0)
    }

    /// Existing value at `key`, or store `default` there and return it.
    fn set_default(&mut self, key: impl Into<Value>, default: impl Into<Value>) -> Result<Value> {
        let key = key.into();
        match self.get(&key) {
            Err(Error::NotFound(_)) => {
                let default = default.into();
                self.set(key, default.clone())?;
                Ok(default)
            }
            found => found,
        }
    }
}
