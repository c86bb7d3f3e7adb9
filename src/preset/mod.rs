//! Preset data model, type rules and the on-disk document format.

pub mod codec;
pub mod coerce;
pub mod names;
pub mod outputs;
pub mod types;

pub use codec::{CodecError, PresetMap};
pub use coerce::ValidationWarning;
pub use outputs::{PresetOutput, TypedValue};
pub use types::{Preset, PresetValue, ValueSnapshot, ValueType};
