use facet_core::Facet;

use crate::serialize;

/// A dynamic value extracted from a [`facet_core::Facet`] type.
///
/// This is the intermediate currency of the conversion engine: the read side
/// renders source values into `Value` trees, and the write side fills target
/// shapes from them. Integer scalars keep their signedness and width class
/// (`u64` vs `i64` vs the 128-bit variants) so that no precision is lost
/// before the target type is known.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent or explicit null (e.g. `Option::None`, an unresolved deferred
    /// reference under the lazy-safe policy, or a depth-exhausted branch).
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Character scalar.
    Char(char),
    /// Unsigned 64-bit integer scalar.
    U64(u64),
    /// Signed 64-bit integer scalar.
    I64(i64),
    /// 128-bit unsigned integer scalar.
    U128(u128),
    /// 128-bit signed integer scalar.
    I128(i128),
    /// 64-bit floating-point scalar.
    F64(f64),
    /// Owned string data (also the fallback rendering for opaque scalars).
    Text(String),
    /// A sequence of values (lists, arrays, sets).
    Seq(Vec<Value>),
    /// A nested string-keyed container (maps and structured records).
    Map(ConvertedMap),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::U64(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

/// An insertion-ordered, string-keyed container of [`Value`]s.
///
/// Produced by [`crate::Converter::to_map`] as the universal intermediate
/// representation of a structured value, and consumed by [`ConvertedMap::to`]
/// to build a concrete type back out of it. Key order is preserved exactly as
/// inserted, which for flattened records means declaration order.
///
/// ```
/// use facet_convert::ConvertedMap;
///
/// let map = ConvertedMap::new()
///     .put_over("name", "John".into())
///     .put_over("age", 30u64.into());
/// assert_eq!(map.to_text(), r#"{"name":"John","age":30}"#);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertedMap {
    entries: Vec<(String, Value)>,
}

impl ConvertedMap {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` under `key`. An existing entry is replaced in place,
    /// keeping its original position; the previous value is returned.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        for (existing, slot) in &mut self.entries {
            if *existing == key {
                return Some(std::mem::replace(slot, value));
            }
        }
        self.entries.push((key, value));
        None
    }

    /// Chaining variant of [`ConvertedMap::insert`].
    pub fn put_over(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    /// Looks up the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    /// Whether an entry exists under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the container holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }

    /// Iterates keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Builds an instance of `T` from this container, matching entries to
    /// fields by name through the same engine as [`crate::Converter::to`].
    ///
    /// Returns `None` when the target cannot be built; the causes are logged.
    pub fn to<'facet, T: Facet<'facet>>(&self) -> Option<T> {
        crate::convert::build_from_value(
            &Value::Map(self.clone()),
            &crate::convert::ConvertCtx::default(),
        )
    }

    /// Renders the container as a JSON-shaped string.
    ///
    /// Scalars use their literal textual form, sequences render as `[...]`,
    /// nested containers as objects. String contents are emitted verbatim:
    /// there is no quote or control-character escaping, so adversarial input
    /// can produce malformed JSON. This is a documented limitation of the
    /// format, not an error case.
    pub fn to_text(&self) -> String {
        serialize::to_text(self)
    }
}

impl FromIterator<(String, Value)> for ConvertedMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut map = ConvertedMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}
