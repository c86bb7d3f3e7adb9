//! Typed outputs of a preset, in canonical order.

use serde::Serialize;

use super::types::{Preset, ValueType};
use crate::error::{StoreError, StoreResult};

/// A value converted to its declared type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    Int(i64),
    Float(f64),
    Text(String),
}

/// One named output slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresetOutput {
    /// `<key>_<type>`
    pub name: String,
    /// `INT`, `FLOAT` or `STRING`
    pub kind: &'static str,
    pub value: TypedValue,
}

impl PresetOutput {
    /// The slot reported when a preset has nothing to output.
    pub fn fallback() -> Self {
        Self {
            name: "output".to_string(),
            kind: ValueType::String.output_kind(),
            value: TypedValue::Text(String::new()),
        }
    }
}

/// Convert every value of `preset` in order. An empty or absent preset
/// resolves to the single fallback slot.
pub fn resolve(preset: Option<&Preset>) -> StoreResult<Vec<PresetOutput>> {
    let Some(preset) = preset.filter(|p| !p.is_empty()) else {
        return Ok(vec![PresetOutput::fallback()]);
    };

    preset
        .iter()
        .map(|(key, v)| {
            let invalid = || StoreError::InvalidValue {
                key: key.to_string(),
                value_type: v.value_type,
                raw: v.raw.clone(),
            };
            let text = v.raw.trim();
            let value = match v.value_type {
                ValueType::Int => TypedValue::Int(text.parse().map_err(|_| invalid())?),
                ValueType::Float => {
                    let n: f64 = text.parse().map_err(|_| invalid())?;
                    TypedValue::Float(n)
                }
                ValueType::String => TypedValue::Text(v.raw.clone()),
            };
            Ok(PresetOutput {
                name: format!("{key}_{}", v.value_type),
                kind: v.value_type.output_kind(),
                value,
            })
        })
        .collect()
}
