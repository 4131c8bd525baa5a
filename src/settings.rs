//! Settings blobs
//!
//! Every control surface accepts settings either as a JSON object
//! (`{"setting1":100}`) or as a flat query string (`setting1=100&x=y`).
//! The encoding is sniffed: a blob wrapped in `{` `}` is JSON, anything else
//! is a query string. Both parse into the same ordered map.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Parsed settings, keys kept in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    map: Map<String, Value>,
}

impl Settings {
    /// Empty settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a settings blob, sniffing JSON vs. query string
    pub fn parse(blob: &str) -> Result<Self> {
        let blob = blob.trim();
        if blob.is_empty() {
            return Ok(Self::new());
        }
        if blob.starts_with('{') && blob.ends_with('}') {
            return Self::parse_json(blob);
        }
        Self::parse_query(blob)
    }

    fn parse_json(blob: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(blob)
            .map_err(|e| Error::invalid(format!("malformed JSON settings: {e}")))?;
        match value {
            Value::Object(map) => Ok(Self { map }),
            _ => Err(Error::invalid("JSON settings must be an object")),
        }
    }

    fn parse_query(blob: &str) -> Result<Self> {
        let mut map = Map::new();
        for (key, value) in url::form_urlencoded::parse(blob.as_bytes()) {
            if key.is_empty() {
                return Err(Error::invalid(format!("empty key in query string '{blob}'")));
            }
            map.insert(key.into_owned(), Value::String(value.into_owned()));
        }
        Ok(Self { map })
    }

    /// Wrap an existing JSON object
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self { map }
    }

    /// Raw value for `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    /// String value; numbers and booleans are rendered
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.map.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Integer value
    ///
    /// Returns `Err(InvalidArgument)` when the key is present but does not
    /// hold an integer, `Ok(None)` when absent.
    pub fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        let Some(value) = self.map.get(key) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| Error::invalid(format!("'{key}' is not an integer: {value}")))
    }

    /// Boolean value, accepting `true/false/1/0`
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        let Some(value) = self.map.get(key) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|n| n != 0),
            Value::String(s) => match s.as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| Error::invalid(format!("'{key}' is not a boolean: {value}")))
    }

    /// Insert or replace a value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.map.insert(key.into(), value.into());
    }

    /// Remove a key, returning its value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.map.shift_remove(key)
    }

    /// Whether no key is set
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Underlying map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.map
    }

    /// Consume into the underlying map
    pub fn into_map(self) -> Map<String, Value> {
        self.map
    }

    /// Render as a JSON object string
    pub fn to_json_string(&self) -> String {
        Value::Object(self.map.clone()).to_string()
    }
}

/// Build a new map with `key` first, followed by the entries of `rest`
///
/// `rest` must not already hold `key`; if it does, that entry is dropped.
pub(crate) fn prepend(key: &str, value: Value, rest: Map<String, Value>) -> Map<String, Value> {
    let mut map = Map::with_capacity(rest.len() + 1);
    map.insert(key.to_owned(), value);
    for (k, v) in rest {
        if k != key {
            map.insert(k, v);
        }
    }
    map
}
