//! URL template resolution and argument binding.
//!
//! Endpoint URLs are `/`-delimited templates where a segment may be a
//! variable: `$name` is required, `$:name` is optional. Resolution binds a
//! mixed named/positional argument set against the variables, substitutes
//! whole segments, and truncates the path at the first optional variable
//! left without a value — the path is hierarchical, so everything after an
//! absent optional segment is dropped too.
//!
//! When a variable name repeats across segments with inconsistent optional
//! markers, the first occurrence decides: later occurrences never change a
//! variable's optionality.

use std::collections::{BTreeMap, HashMap};

use crate::error::ConfigError;

/// Marker character introducing a URL variable inside a segment.
pub const URL_VAR_SIGIL: char = '$';

/// Marker character flagging a URL variable as optional.
pub const URL_VAR_OPTIONAL: char = ':';

/// A variable extracted from a URL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlVariable {
    pub name: String,
    /// 0-based left-to-right index of the variable's first occurrence.
    pub ordinal: usize,
    pub optional: bool,
}

/// Caller-supplied argument set: named entries plus integer-keyed
/// positional entries, mirroring the mixed maps SDK callers pass in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlArgs {
    named: HashMap<String, String>,
    positional: BTreeMap<usize, String>,
}

impl UrlArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.named.insert(name.into(), value.into());
        self
    }

    pub fn set_positional(&mut self, index: usize, value: impl Into<String>) -> &mut Self {
        self.positional.insert(index, value.into());
        self
    }

    /// Append a positional value after the current highest index.
    pub fn push(&mut self, value: impl Into<String>) -> &mut Self {
        let next = self
            .positional
            .keys()
            .next_back()
            .map(|k| k + 1)
            .unwrap_or(0);
        self.positional.insert(next, value.into());
        self
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    pub fn has(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.positional.is_empty()
    }

    pub fn clear(&mut self) {
        self.named.clear();
        self.positional.clear();
    }
}

/// Parse a segment into `(name, optional)` when it embeds a variable.
fn segment_variable(segment: &str) -> Option<(String, bool)> {
    if !segment.contains(URL_VAR_SIGIL) {
        return None;
    }
    let optional = segment.contains(URL_VAR_OPTIONAL);
    let name: String = segment
        .chars()
        .filter(|c| *c != URL_VAR_SIGIL && *c != URL_VAR_OPTIONAL)
        .collect();
    Some((name, optional))
}

/// Extract the variables of a template, left to right, first occurrence only.
pub fn extract_variables(template: &str) -> Vec<UrlVariable> {
    let mut variables: Vec<UrlVariable> = Vec::new();
    for segment in template.split('/') {
        if let Some((name, optional)) = segment_variable(segment) {
            if variables.iter().any(|v| v.name == name) {
                continue;
            }
            let ordinal = variables.len();
            variables.push(UrlVariable {
                name,
                ordinal,
                optional,
            });
        }
    }
    variables
}

/// Normalize the raw argument set into a `name -> value` binding.
///
/// Named entries matching a known variable bind verbatim and always beat
/// positional entries. Positional values are consumed in ascending key
/// order, strictly left-to-right through still-unclaimed variables; blank
/// positional values are skipped without consuming a slot. An empty named
/// value does not claim its variable, but is kept as a last resort so the
/// optional-truncation path sees an explicit empty.
fn bind_arguments(variables: &[UrlVariable], args: &UrlArgs) -> HashMap<String, String> {
    let mut positionals = args
        .positional
        .values()
        .filter(|v| !v.is_empty())
        .cloned();
    let mut bound = HashMap::new();
    for variable in variables {
        let named = args.named.get(&variable.name);
        if let Some(value) = named {
            if !value.is_empty() {
                bound.insert(variable.name.clone(), value.clone());
                continue;
            }
        }
        if let Some(value) = positionals.next() {
            bound.insert(variable.name.clone(), value);
        } else if let Some(value) = named {
            bound.insert(variable.name.clone(), value.clone());
        }
    }
    bound
}

/// Resolve a template against an argument set into a concrete relative path.
///
/// Fails with [`ConfigError::InvalidUrl`] when a required variable stays
/// unresolved — such a URL must never be dispatched.
pub fn resolve(template: &str, args: &UrlArgs) -> Result<String, ConfigError> {
    let variables = extract_variables(template);
    let mut segments: Vec<String> = template.split('/').map(str::to_string).collect();

    if !variables.is_empty() {
        let bound = bind_arguments(&variables, args);
        for variable in &variables {
            let replace = bound.get(&variable.name).map(String::as_str).unwrap_or("");
            if replace.is_empty() {
                if variable.optional {
                    // Hierarchical path: drop this segment and everything after.
                    if let Some(pos) = segments
                        .iter()
                        .position(|s| segment_variable(s).is_some_and(|(n, _)| n == variable.name))
                    {
                        segments.truncate(pos);
                        break;
                    }
                }
                // Required and empty: the marker stays and fails verification.
            } else {
                for segment in segments.iter_mut() {
                    if segment_variable(segment).is_some_and(|(n, _)| n == variable.name) {
                        *segment = replace.to_string();
                    }
                }
            }
        }
    }

    let url = segments.join("/");
    let url = url.trim_end_matches('/').to_string();
    if url.contains(URL_VAR_SIGIL) {
        return Err(ConfigError::InvalidUrl(url));
    }
    Ok(url)
}
