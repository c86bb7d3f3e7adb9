//! In-memory state of one collection and the edits applied to it.
//!
//! Edits work on a private copy of the state; the store persists the copy and
//! swaps it in only when the write succeeded.

use std::collections::{HashMap, HashSet};

use super::persistence::Digest;
use crate::error::{StoreError, StoreResult};
use crate::preset::{Preset, PresetMap, PresetValue, ValidationWarning, ValueSnapshot, ValueType, coerce};

/// Snapshot of a loaded collection.
#[derive(Debug, Clone, Default)]
pub struct CollectionState {
    pub(crate) presets: PresetMap,
    /// Per-title version counters. Entries outlive deleted titles so a
    /// re-created title keeps counting up.
    pub(crate) versions: HashMap<String, u64>,
    /// Digest of the document last read or written; `None` when no file.
    pub(crate) digest: Option<Digest>,
}

/// What an edit changed, if anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Change {
    /// Titles whose version advances and whose state gets pushed.
    pub touched: Vec<String>,
    /// Whether titles or key sets changed.
    pub listing: bool,
}

impl Change {
    fn values(title: &str) -> Option<Self> {
        Some(Self {
            touched: vec![title.to_string()],
            listing: false,
        })
    }

    fn shape(titles: &[&str]) -> Option<Self> {
        Some(Self {
            touched: titles.iter().map(|t| t.to_string()).collect(),
            listing: true,
        })
    }
}

fn missing_preset(title: &str) -> StoreError {
    StoreError::not_found(format!("preset '{title}'"))
}

fn missing_key(title: &str, key: &str) -> StoreError {
    StoreError::not_found(format!("key '{key}' in preset '{title}'"))
}

impl CollectionState {
    pub(crate) fn loaded(presets: PresetMap, digest: Option<Digest>) -> Self {
        Self {
            presets,
            versions: HashMap::new(),
            digest,
        }
    }

    pub fn titles(&self) -> Vec<String> {
        self.presets.keys().cloned().collect()
    }

    pub fn preset(&self, title: &str) -> Option<&Preset> {
        self.presets.get(title)
    }

    pub fn snapshot(&self, title: &str) -> Option<Vec<ValueSnapshot>> {
        self.presets.get(title).map(Preset::snapshot)
    }

    pub fn version(&self, title: &str) -> u64 {
        self.versions.get(title).copied().unwrap_or(0)
    }

    pub(crate) fn bump(&mut self, title: &str) -> u64 {
        let v = self.versions.entry(title.to_string()).or_insert(0);
        *v += 1;
        *v
    }

    fn preset_mut(&mut self, title: &str) -> StoreResult<&mut Preset> {
        self.presets.get_mut(title).ok_or_else(|| missing_preset(title))
    }

    pub(crate) fn set_value(
        &mut self,
        title: &str,
        key: &str,
        value_type: ValueType,
        raw: &str,
    ) -> (Option<Change>, Option<ValidationWarning>) {
        let (stored, warning) = coerce::normalize(key, value_type, raw);
        let value = PresetValue::new(value_type, stored);

        let created = !self.presets.contains_key(title);
        let preset = self.presets.entry(title.to_string()).or_default();
        let is_new = !preset.contains(key);
        let change = if preset.get(key) == Some(&value) {
            None
        } else {
            preset.upsert(key, value);
            if is_new {
                Change::shape(&[title])
            } else {
                Change::values(title)
            }
        };

        let change = match change {
            Some(c) => Some(Change { listing: c.listing || created, ..c }),
            None if created => Change::shape(&[title]),
            None => None,
        };
        (change, warning)
    }

    pub(crate) fn set_type(
        &mut self,
        title: &str,
        key: &str,
        value_type: ValueType,
    ) -> StoreResult<Option<Change>> {
        let preset = self.preset_mut(title)?;
        let value = preset.get_mut(key).ok_or_else(|| missing_key(title, key))?;

        let converted = coerce::convert(value_type, &value.raw);
        if value.value_type == value_type && value.raw == converted {
            return Ok(None);
        }
        value.value_type = value_type;
        value.raw = converted;
        Ok(Change::values(title))
    }

    pub(crate) fn rename_key(&mut self, title: &str, old: &str, new: &str) -> StoreResult<Option<Change>> {
        let preset = self.preset_mut(title)?;
        if !preset.contains(old) {
            return Err(missing_key(title, old));
        }
        if old == new {
            return Ok(None);
        }
        if preset.contains(new) {
            tracing::warn!("[store] rename '{old}' -> '{new}' in '{title}' overwrites an existing value");
        }
        preset.rename(old, new);
        Ok(Change::shape(&[title]))
    }

    pub(crate) fn delete_key(&mut self, title: &str, key: &str) -> StoreResult<Option<Change>> {
        let preset = self.preset_mut(title)?;
        Ok(match preset.remove(key) {
            Some(_) => Change::shape(&[title]),
            None => None,
        })
    }

    pub(crate) fn reorder<S: AsRef<str>>(&mut self, title: &str, order: &[S]) -> StoreResult<Option<Change>> {
        let preset = self.preset_mut(title)?;
        Ok(if preset.reorder(order) {
            Change::values(title)
        } else {
            None
        })
    }

    pub(crate) fn create_title(&mut self, title: &str) -> Option<Change> {
        if self.presets.contains_key(title) {
            return None;
        }
        self.presets.insert(title.to_string(), Preset::new());
        Change::shape(&[title])
    }

    pub(crate) fn delete_title(&mut self, title: &str) -> StoreResult<Option<Change>> {
        if self.presets.shift_remove(title).is_none() {
            return Err(missing_preset(title));
        }
        Ok(Change::shape(&[title]))
    }

    pub(crate) fn rename_title(&mut self, old: &str, new: &str) -> StoreResult<Option<Change>> {
        let Some(index) = self.presets.get_index_of(old) else {
            return Err(missing_preset(old));
        };
        if old == new {
            return Ok(None);
        }
        if self.presets.contains_key(new) {
            return Err(StoreError::TitleExists {
                title: new.to_string(),
            });
        }
        let Some((_, preset)) = self.presets.shift_remove_index(index) else {
            return Err(missing_preset(old));
        };
        self.presets.shift_insert(index, new.to_string(), preset);

        // The new title continues from whichever counter is further along.
        let carried = self.version(old).max(self.version(new));
        self.versions.insert(new.to_string(), carried);
        Ok(Change::shape(&[old, new]))
    }

    /// Compare against a freshly loaded document and carry versions over,
    /// bumping every preset whose content differs.
    pub(crate) fn absorb(&self, mut next: CollectionState) -> (CollectionState, Change) {
        next.versions = self.versions.clone();

        let mut touched = Vec::new();
        let mut seen = HashSet::new();
        for title in self.presets.keys().chain(next.presets.keys()) {
            if !seen.insert(title.clone()) {
                continue;
            }
            if self.presets.get(title) != next.presets.get(title) {
                touched.push(title.clone());
            }
        }
        for title in &touched {
            next.bump(title);
        }

        let listing = self.digest.is_none() != next.digest.is_none() || !self.same_shape(&next);
        (next, Change { touched, listing })
    }

    /// Same titles, and every title has the same key set.
    fn same_shape(&self, other: &CollectionState) -> bool {
        if self.presets.len() != other.presets.len() {
            return false;
        }
        self.presets.iter().all(|(title, preset)| {
            other.presets.get(title).is_some_and(|o| {
                o.len() == preset.len() && preset.keys().all(|k| o.contains(k))
            })
        }) && self.presets.keys().eq(other.presets.keys())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> CollectionState {
        let mut s = CollectionState::default();
        s.set_value("sunset", "steps", ValueType::Int, "20");
        s.set_value("sunset", "cfg", ValueType::Float, "4.55");
        s
    }

    fn keys(s: &CollectionState, title: &str) -> Vec<String> {
        s.preset(title).unwrap().keys().map(str::to_string).collect()
    }

    #[test]
    fn test_set_value_creates_preset_and_appends() {
        let mut s = CollectionState::default();
        let (change, warning) = s.set_value("sunset", "steps", ValueType::Int, "20");
        assert!(warning.is_none());
        assert_eq!(change, Change::shape(&["sunset"]));

        let (change, _) = s.set_value("sunset", "cfg", ValueType::Float, "4.55");
        assert!(change.unwrap().listing);
        assert_eq!(keys(&s, "sunset"), vec!["steps", "cfg"]);

        // Update in place: no listing change
        let (change, _) = s.set_value("sunset", "steps", ValueType::Int, "30");
        assert_eq!(change, Change::values("sunset"));
        assert_eq!(keys(&s, "sunset"), vec!["steps", "cfg"]);

        // Identical value is a no-op
        let (change, _) = s.set_value("sunset", "steps", ValueType::Int, "30");
        assert!(change.is_none());
    }

    #[test]
    fn test_set_value_coerces_with_warning() {
        let mut s = CollectionState::default();
        let (_, warning) = s.set_value("sunset", "steps", ValueType::Int, "many");
        assert!(warning.is_some());
        assert_eq!(s.preset("sunset").unwrap().get("steps").unwrap().raw, "0");
    }

    #[test]
    fn test_set_type_conversions() {
        let mut s = CollectionState::default();
        s.set_value("p", "a", ValueType::String, "abc");
        s.set_value("p", "b", ValueType::String, "3.1459");

        s.set_type("p", "a", ValueType::Int).unwrap();
        s.set_type("p", "b", ValueType::Float).unwrap();
        let preset = s.preset("p").unwrap();
        assert_eq!(preset.get("a").unwrap().raw, "0");
        assert_eq!(preset.get("b").unwrap().raw, "3.15");
        assert_eq!(keys(&s, "p"), vec!["a", "b"]);

        // Back to string keeps the text
        s.set_type("p", "b", ValueType::String).unwrap();
        assert_eq!(s.preset("p").unwrap().get("b").unwrap().raw, "3.15");

        assert!(s.set_type("p", "zzz", ValueType::Int).unwrap_err().is_not_found());
        assert!(s.set_type("nope", "a", ValueType::Int).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_key_is_idempotent_and_keeps_preset() {
        let mut s = state();
        assert!(s.delete_key("sunset", "steps").unwrap().is_some());
        assert!(s.delete_key("sunset", "steps").unwrap().is_none());
        assert!(s.delete_key("sunset", "cfg").unwrap().is_some());
        assert!(s.preset("sunset").unwrap().is_empty());
        assert_eq!(s.titles(), vec!["sunset"]);
        assert!(s.delete_key("ghost", "x").unwrap_err().is_not_found());
    }

    #[test]
    fn test_rename_key() {
        let mut s = state();
        assert!(s.rename_key("sunset", "steps", "steps").unwrap().is_none());
        s.rename_key("sunset", "steps", "n").unwrap();
        assert_eq!(keys(&s, "sunset"), vec!["n", "cfg"]);
        assert!(s.rename_key("sunset", "steps", "x").unwrap_err().is_not_found());
    }

    #[test]
    fn test_reorder_noop_has_no_change() {
        let mut s = state();
        assert!(s.reorder("sunset", &["cfg", "steps"]).unwrap().is_some());
        assert!(s.reorder("sunset", &["cfg", "steps"]).unwrap().is_none());
        assert_eq!(keys(&s, "sunset"), vec!["cfg", "steps"]);
    }

    #[test]
    fn test_title_management() {
        let mut s = state();
        assert!(s.create_title("night").is_some());
        assert!(s.create_title("night").is_none());
        s.bump("night");
        s.bump("night");

        s.rename_title("night", "dusk").unwrap();
        assert_eq!(s.titles(), vec!["sunset", "dusk"]);
        assert_eq!(s.version("dusk"), 2);
        assert!(matches!(
            s.rename_title("dusk", "sunset"),
            Err(StoreError::TitleExists { .. })
        ));

        s.delete_title("dusk").unwrap();
        s.delete_title("sunset").unwrap();
        assert!(s.titles().is_empty());
        assert!(s.delete_title("sunset").unwrap_err().is_not_found());
    }

    #[test]
    fn test_absorb_bumps_changed_presets_only() {
        let mut base = state();
        base.create_title("night");
        base.bump("sunset");
        base.digest = Some([1; 32]);

        let mut next = base.clone();
        next.versions.clear();
        next.digest = Some([2; 32]);
        next.set_value("sunset", "steps", ValueType::Int, "99");

        let (merged, change) = base.absorb(next);
        assert_eq!(change.touched, vec!["sunset"]);
        assert!(!change.listing);
        assert_eq!(merged.version("sunset"), 2);
        assert_eq!(merged.version("night"), 0);
    }

    #[test]
    fn test_absorb_detects_shape_change() {
        let mut base = state();
        base.digest = Some([1; 32]);
        let mut next = base.clone();
        next.delete_key("sunset", "cfg").unwrap();

        let (_, change) = base.absorb(next);
        assert!(change.listing);

        // Collection file disappearing
        let gone = CollectionState::default();
        let (merged, change) = base.absorb(gone);
        assert!(change.listing);
        assert_eq!(change.touched, vec!["sunset"]);
        assert!(merged.titles().is_empty());
    }
}
