//! Core data model: value types, values and presets.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three recognized value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Int,
    Float,
    #[default]
    String,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::String => "string",
        }
    }

    /// Output kind used when a preset is resolved into typed outputs.
    pub fn output_kind(&self) -> &'static str {
        match self {
            ValueType::Int => "INT",
            ValueType::Float => "FLOAT",
            ValueType::String => "STRING",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" => Ok(ValueType::Int),
            "float" => Ok(ValueType::Float),
            "string" => Ok(ValueType::String),
            other => Err(format!("unknown value type '{other}' (expected int, float or string)")),
        }
    }
}

/// A typed value. `raw` is the canonical text; numeric types are interpreted
/// from it on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetValue {
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(rename = "value")]
    pub raw: String,
}

impl PresetValue {
    pub fn new(value_type: ValueType, raw: impl Into<String>) -> Self {
        Self {
            value_type,
            raw: raw.into(),
        }
    }
}

/// Snapshot of one value as handed to callers and observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSnapshot {
    pub key: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub value: String,
}

/// A named, ordered set of values.
///
/// The map's iteration order *is* the canonical order: keys are appended on
/// insert, updated in place, and only move on an explicit reorder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preset {
    values: IndexMap<String, PresetValue>,
}

impl Preset {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_values(values: IndexMap<String, PresetValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&PresetValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PresetValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Insert or update. New keys go to the end; existing keys keep their slot.
    pub(crate) fn upsert(&mut self, key: &str, value: PresetValue) {
        if let Some(slot) = self.values.get_mut(key) {
            *slot = value;
        } else {
            self.values.insert(key.to_string(), value);
        }
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut PresetValue> {
        self.values.get_mut(key)
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<PresetValue> {
        self.values.shift_remove(key)
    }

    /// Rename `old` to `new` in `old`'s position. A value already stored under
    /// `new` is dropped.
    pub(crate) fn rename(&mut self, old: &str, new: &str) -> bool {
        let Some(index) = self.values.get_index_of(old) else {
            return false;
        };
        if old == new {
            return true;
        }
        // Drop the colliding entry first so the index shift is accounted for.
        let index = match self.values.get_index_of(new) {
            Some(existing) => {
                self.values.shift_remove_index(existing);
                if existing < index { index - 1 } else { index }
            }
            None => index,
        };
        let Some((_, value)) = self.values.shift_remove_index(index) else {
            return false;
        };
        self.values.shift_insert(index, new.to_string(), value);
        true
    }

    /// Apply a requested order.
    ///
    /// Unknown keys are ignored, duplicates count once, and existing keys the
    /// request omits follow in their prior relative order.
    pub(crate) fn reorder<S: AsRef<str>>(&mut self, requested: &[S]) -> bool {
        let mut next: IndexMap<String, PresetValue> = IndexMap::with_capacity(self.values.len());
        for key in requested {
            let key = key.as_ref();
            if next.contains_key(key) {
                continue;
            }
            if let Some(value) = self.values.get(key) {
                next.insert(key.to_string(), value.clone());
            }
        }
        for (key, value) in &self.values {
            if !next.contains_key(key) {
                next.insert(key.clone(), value.clone());
            }
        }

        let changed = !next.keys().eq(self.values.keys());
        self.values = next;
        changed
    }

    pub fn snapshot(&self) -> Vec<ValueSnapshot> {
        self.values
            .iter()
            .map(|(key, v)| ValueSnapshot {
                key: key.clone(),
                value_type: v.value_type,
                value: v.raw.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preset(keys: &[&str]) -> Preset {
        let mut p = Preset::new();
        for k in keys {
            p.upsert(k, PresetValue::new(ValueType::String, *k));
        }
        p
    }

    fn order(p: &Preset) -> Vec<&str> {
        p.keys().collect()
    }

    #[test]
    fn test_upsert_keeps_position() {
        let mut p = preset(&["a", "b", "c"]);
        p.upsert("a", PresetValue::new(ValueType::Int, "1"));
        assert_eq!(order(&p), vec!["a", "b", "c"]);
        assert_eq!(p.get("a").unwrap().raw, "1");
    }

    #[test]
    fn test_rename_preserves_position() {
        let mut p = preset(&["a", "b", "c"]);
        assert!(p.rename("b", "x"));
        assert_eq!(order(&p), vec!["a", "x", "c"]);
        assert!(!p.rename("missing", "y"));
    }

    #[test]
    fn test_rename_onto_existing_key_overwrites() {
        let mut p = preset(&["a", "b", "c"]);
        assert!(p.rename("c", "a"));
        assert_eq!(order(&p), vec!["b", "a"]);
        assert_eq!(p.get("a").unwrap().raw, "c");

        let mut p = preset(&["a", "b", "c"]);
        assert!(p.rename("a", "c"));
        assert_eq!(order(&p), vec!["c", "b"]);
        assert_eq!(p.get("c").unwrap().raw, "a");
    }

    #[test]
    fn test_reorder_policy() {
        let mut p = preset(&["a", "b", "c", "d"]);
        assert!(p.reorder(&["c", "ghost", "a", "c"]));
        assert_eq!(order(&p), vec!["c", "a", "b", "d"]);

        // Same order again is not a change
        assert!(!p.reorder(&["c", "a", "b", "d"]));
        assert!(!p.reorder::<&str>(&[]));
    }

    #[test]
    fn test_value_type_parse() {
        assert_eq!("INT".parse::<ValueType>().unwrap(), ValueType::Int);
        assert_eq!(" float ".parse::<ValueType>().unwrap(), ValueType::Float);
        assert!("bool".parse::<ValueType>().is_err());
    }
}
