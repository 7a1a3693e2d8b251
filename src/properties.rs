//! Flat named-value store shared across the SDK.
//!
//! Endpoint instance properties, model/collection attributes, and auth
//! credentials all use the same bag type rather than ad-hoc maps, so
//! get/set/remove semantics stay consistent everywhere.

use serde_json::{Map, Value};

/// A flat key/value bag over JSON values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    values: Map<String, Value>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing JSON object map.
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String view of a value: strings verbatim, numbers/bools formatted.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.values.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Shallow merge: entries from `other` overwrite existing keys.
    pub fn extend(&mut self, other: Map<String, Value>) {
        for (k, v) in other {
            self.values.insert(k, v);
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

impl From<Map<String, Value>> for PropertyBag {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}
