//! Request payload container with defaults and required-field rules.
//!
//! The container distinguishes "never set" from "explicitly set but empty":
//! a GET endpoint with an untouched container sends no query string at all,
//! while `set`/`extend` calls (even with empty maps removed again) mark the
//! payload as present.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::DataError;

/// Expected JSON type for a required field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

/// Definition-level payload rules, cloned into each container instance.
#[derive(Debug, Clone, Default)]
pub struct DataRules {
    /// Values applied at construction and on `reset()`.
    pub defaults: Map<String, Value>,
    /// Required fields, each with an optional expected type.
    pub required: BTreeMap<String, Option<FieldType>>,
    /// When false, an untouched empty container still serializes as `{}`.
    pub nullable: bool,
    /// Validate automatically when producing the wire payload.
    pub auto_validate: bool,
}

impl DataRules {
    pub fn new() -> Self {
        Self {
            nullable: true,
            ..Self::default()
        }
    }

    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    pub fn with_required(mut self, key: impl Into<String>, ty: Option<FieldType>) -> Self {
        self.required.insert(key.into(), ty);
        self
    }

    pub fn auto_validate(mut self, on: bool) -> Self {
        self.auto_validate = on;
        self
    }

    pub fn nullable(mut self, on: bool) -> Self {
        self.nullable = on;
        self
    }
}

/// Validated flat key/value payload.
#[derive(Debug, Clone)]
pub struct EndpointData {
    rules: DataRules,
    attributes: Map<String, Value>,
    /// False until any value is explicitly set.
    touched: bool,
}

impl Default for EndpointData {
    fn default() -> Self {
        Self::new(DataRules::new())
    }
}

impl EndpointData {
    pub fn new(rules: DataRules) -> Self {
        let mut data = Self {
            rules,
            attributes: Map::new(),
            touched: false,
        };
        data.apply_defaults();
        data
    }

    /// Defaults count as explicit content when present.
    fn apply_defaults(&mut self) {
        if !self.rules.defaults.is_empty() {
            self.extend(self.rules.defaults.clone());
        }
    }

    pub fn rules(&self) -> &DataRules {
        &self.rules
    }

    pub fn set_rules(&mut self, rules: DataRules) {
        self.rules = rules;
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.touched = true;
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn extend(&mut self, values: Map<String, Value>) -> &mut Self {
        if !values.is_empty() {
            self.touched = true;
        }
        for (k, v) in values {
            self.attributes.insert(k, v);
        }
        self
    }

    /// Replace all attributes with the given map.
    pub fn replace(&mut self, values: Map<String, Value>) -> &mut Self {
        self.attributes.clear();
        self.touched = false;
        self.extend(values)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// True when the payload should be treated as absent rather than `{}`.
    pub fn is_null(&self) -> bool {
        self.rules.nullable && !self.touched && self.attributes.is_empty()
    }

    /// Clear attributes and the touched flag; rules and defaults survive but
    /// defaults are not re-applied until `reset()`.
    pub fn clear(&mut self) -> &mut Self {
        self.attributes.clear();
        self.touched = false;
        self
    }

    /// Back to the freshly constructed state, defaults included.
    pub fn reset(&mut self) -> &mut Self {
        self.clear();
        self.apply_defaults();
        self
    }

    /// Check required-field rules without serializing.
    pub fn validate(&self) -> Result<(), DataError> {
        let mut missing = Vec::new();
        let mut invalid = Vec::new();
        for (field, expected) in &self.rules.required {
            match self.attributes.get(field) {
                None => missing.push(field.clone()),
                Some(value) => {
                    if let Some(ty) = expected {
                        if !ty.matches(value) {
                            invalid.push(field.clone());
                        }
                    }
                }
            }
        }
        if missing.is_empty() && invalid.is_empty() {
            Ok(())
        } else {
            Err(DataError::Validation { missing, invalid })
        }
    }

    /// Produce the wire-ready payload. `None` when the container is null.
    ///
    /// `validate` overrides the `auto_validate` rule when given.
    pub fn to_payload(&self, validate: Option<bool>) -> Result<Option<Map<String, Value>>, DataError> {
        if validate.unwrap_or(self.rules.auto_validate) {
            self.validate()?;
        }
        if self.is_null() {
            return Ok(None);
        }
        Ok(Some(self.attributes.clone()))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.attributes
    }
}
