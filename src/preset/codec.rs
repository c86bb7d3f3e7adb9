//! Document codec: one collection <-> one TOML document.
//!
//! ```toml
//! [sunset.values.steps]
//! type = "int"
//! value = "20"
//!
//! [sunset.values.cfg]
//! type = "float"
//! value = "4.55"
//! ```
//!
//! Table order in the document is the canonical preset and key order, so the
//! `toml` crate's `preserve_order` feature and `IndexMap` carry it both ways.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use super::types::{Preset, PresetValue, ValueType};

/// Presets of one collection, in document order.
pub type PresetMap = IndexMap<String, Preset>;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("{0}")]
    Parse(#[from] toml::de::Error),

    #[error("{0}")]
    Encode(#[from] toml::ser::Error),
}

#[derive(Deserialize)]
struct PresetEntryIn {
    #[serde(default)]
    values: IndexMap<String, ValueEntryIn>,
}

#[derive(Deserialize)]
struct ValueEntryIn {
    #[serde(rename = "type", default)]
    value_type: ValueType,
    #[serde(default, deserialize_with = "scalar_text")]
    value: String,
}

#[derive(Serialize)]
struct PresetEntryOut<'a> {
    values: IndexMap<&'a str, ValueEntryOut<'a>>,
}

#[derive(Serialize)]
struct ValueEntryOut<'a> {
    #[serde(rename = "type")]
    value_type: &'static str,
    value: &'a str,
}

/// Hand-edited documents may write `value = 99` instead of `value = "99"`.
fn scalar_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match toml::Value::deserialize(deserializer)? {
        toml::Value::String(s) => Ok(s),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        other => Err(D::Error::custom(format!(
            "value must be a scalar, found {}",
            other.type_str()
        ))),
    }
}

/// Parse a collection document.
pub fn decode(text: &str) -> Result<PresetMap, CodecError> {
    let doc: IndexMap<String, PresetEntryIn> = toml::from_str(text)?;

    Ok(doc
        .into_iter()
        .map(|(title, entry)| {
            let values = entry
                .values
                .into_iter()
                .map(|(key, v)| (key, PresetValue::new(v.value_type, v.value)))
                .collect();
            (title, Preset::from_values(values))
        })
        .collect())
}

/// Encode a collection. Values are always written as strings.
pub fn encode(presets: &PresetMap) -> Result<String, CodecError> {
    let doc: IndexMap<&str, PresetEntryOut<'_>> = presets
        .iter()
        .map(|(title, preset)| {
            let values = preset
                .iter()
                .map(|(key, v)| {
                    (
                        key,
                        ValueEntryOut {
                            value_type: v.value_type.as_str(),
                            value: v.raw.as_str(),
                        },
                    )
                })
                .collect();
            (title.as_str(), PresetEntryOut { values })
        })
        .collect();

    Ok(toml::to_string_pretty(&doc)?)
}
