use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    lenient,
    types::{CammingPattern, CammingTarget, SegmentPattern, SegmentUpdate, DEFAULT_SEGMENT},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresetError {
    #[error("Name required")]
    EmptyName,
    #[error("State not found")]
    NotFound(String),
}

/// A snapshot type that can live in a preset file.
pub trait PresetSnapshot: Clone + Serialize {
    /// Normalizes one stored entry field by field. Fields that cannot be
    /// read are left out and described in `notes`. Returns `None` only when
    /// the entry is not a JSON object at all.
    fn from_stored(value: Value, notes: &mut Vec<String>) -> Option<Self>;
}

/// LED preset: partial parameters for any number of segments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentsSnapshot {
    pub segments: BTreeMap<String, SegmentUpdate>,
}

impl PresetSnapshot for SegmentsSnapshot {
    fn from_stored(value: Value, notes: &mut Vec<String>) -> Option<Self> {
        let Value::Object(mut object) = value else {
            return None;
        };

        match object.remove("segments") {
            Some(Value::Object(segments)) => {
                let mut normalized = BTreeMap::new();
                for (name, entry) in segments {
                    match entry {
                        Value::Object(fields) => {
                            let scope = format!("segment {name}");
                            normalized.insert(name, segment_update(fields, &scope, notes));
                        }
                        other => {
                            notes.push(format!("segment {name}: dropped, not an object: {other}"))
                        }
                    }
                }
                return Some(Self {
                    segments: normalized,
                });
            }
            Some(other) => notes.push(format!("dropped unreadable segments: {other}")),
            None => {}
        }

        // Older files stored a single segment's fields at the top level.
        let update = segment_update(object, "flat entry", notes);
        let name = update
            .segment
            .clone()
            .unwrap_or_else(|| DEFAULT_SEGMENT.to_string());
        Some(Self {
            segments: BTreeMap::from([(name, update)]),
        })
    }
}

fn segment_update(
    fields: Map<String, Value>,
    scope: &str,
    notes: &mut Vec<String>,
) -> SegmentUpdate {
    let mut update = SegmentUpdate::default();
    for (key, value) in fields {
        if value.is_null() {
            continue;
        }
        let kept = match key.as_str() {
            "segment" => keep(&mut update.segment, value.as_str().map(str::to_string)),
            "pattern" => keep(
                &mut update.pattern,
                value.as_str().and_then(|name| SegmentPattern::parse(name.trim())),
            ),
            "brightness" => keep(&mut update.brightness, lenient::number(&value)),
            "speed" => keep(&mut update.speed, lenient::number(&value)),
            "color" => keep(&mut update.color, lenient::rgb(&value)),
            "wave_shape" => keep(&mut update.wave_shape, value.as_str().map(str::to_string)),
            "wave_count" => keep(&mut update.wave_count, lenient::number(&value)),
            "mic_gain" => keep(&mut update.mic_gain, lenient::number(&value)),
            "mic_floor" => keep(&mut update.mic_floor, lenient::number(&value)),
            "mic_smooth" => keep(&mut update.mic_smooth, lenient::number(&value)),
            "mic_enabled" => keep(&mut update.mic_enabled, lenient::flag(&value)),
            "mic_beat" => keep(&mut update.mic_beat, lenient::flag(&value)),
            "gradient_enabled" => keep(&mut update.gradient_enabled, lenient::flag(&value)),
            "gradient_low" => keep(&mut update.gradient_low, lenient::rgb(&value)),
            "gradient_mid" => keep(&mut update.gradient_mid, lenient::rgb(&value)),
            "gradient_high" => keep(&mut update.gradient_high, lenient::rgb(&value)),
            _ => {
                notes.push(format!("{scope}: ignored unknown field {key}"));
                continue;
            }
        };
        if !kept {
            notes.push(format!("{scope}: dropped unreadable {key}: {value}"));
        }
    }
    update
}

fn keep<T>(slot: &mut Option<T>, value: Option<T>) -> bool {
    let kept = value.is_some();
    if kept {
        *slot = value;
    }
    kept
}

/// Camming-light preset. Missing fields fall back to the live state when applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CammingSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<CammingPattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_balance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<CammingTarget>,
}

impl PresetSnapshot for CammingSnapshot {
    fn from_stored(value: Value, notes: &mut Vec<String>) -> Option<Self> {
        let Value::Object(fields) = value else {
            return None;
        };

        let mut snapshot = Self::default();
        for (key, value) in fields {
            if value.is_null() {
                continue;
            }
            let kept = match key.as_str() {
                "pattern" | "last_pattern" => keep(
                    &mut snapshot.pattern,
                    value.as_str().map(CammingPattern::parse_lossy),
                ),
                "brightness" => keep(&mut snapshot.brightness, lenient::number(&value)),
                "white_balance" => keep(&mut snapshot.white_balance, lenient::number(&value)),
                "target" => keep(
                    &mut snapshot.target,
                    value.as_str().map(CammingTarget::parse_lossy),
                ),
                _ => {
                    notes.push(format!("ignored unknown field {key}"));
                    continue;
                }
            };
            if !kept {
                notes.push(format!("dropped unreadable {key}: {value}"));
            }
        }
        Some(snapshot)
    }
}

/// Named snapshots plus an optional default pointer.
///
/// The default always names a preset present in the book.
#[derive(Debug, Clone, PartialEq)]
pub struct PresetBook<S> {
    presets: BTreeMap<String, S>,
    default: Option<String>,
}

impl<S> Default for PresetBook<S> {
    fn default() -> Self {
        Self {
            presets: BTreeMap::new(),
            default: None,
        }
    }
}

#[derive(Serialize)]
struct PresetDocument<'a, S> {
    states: &'a BTreeMap<String, S>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<&'a str>,
}

impl<S: PresetSnapshot> PresetBook<S> {
    /// Parses a stored document. Accepts the `{states, default}` wrapper and
    /// the older bare `{name: snapshot}` map.
    pub fn from_document(value: Value) -> Self {
        Self::read_document(value).0
    }

    /// Like [`PresetBook::from_document`], also describing everything that
    /// had to be left out along the way.
    pub fn read_document(value: Value) -> (Self, Vec<String>) {
        let Value::Object(mut root) = value else {
            return (Self::default(), vec!["document is not an object".to_string()]);
        };

        let (raw, default) = match root.remove("states") {
            Some(Value::Object(states)) => {
                let default = match root.remove("default") {
                    Some(Value::String(name)) => Some(name),
                    _ => None,
                };
                (states, default)
            }
            Some(other) => {
                root.insert("states".to_string(), other);
                (root, None)
            }
            None => (root, None),
        };

        Self::from_entries(raw, default)
    }

    fn from_entries(raw: Map<String, Value>, default: Option<String>) -> (Self, Vec<String>) {
        let mut notes = Vec::new();
        let mut presets = BTreeMap::new();
        for (name, entry) in raw {
            let mut entry_notes = Vec::new();
            match S::from_stored(entry, &mut entry_notes) {
                Some(snapshot) => {
                    presets.insert(name.clone(), snapshot);
                }
                None => notes.push(format!("preset {name}: dropped, not an object")),
            }
            notes.extend(
                entry_notes
                    .into_iter()
                    .map(|note| format!("preset {name}: {note}")),
            );
        }

        let default = default.filter(|name| {
            let known = presets.contains_key(name);
            if !known {
                notes.push(format!("default {name} names no preset, cleared"));
            }
            known
        });
        (Self { presets, default }, notes)
    }

    pub fn to_document(&self) -> Value {
        let document = PresetDocument {
            states: &self.presets,
            default: self.default_name(),
        };
        serde_json::to_value(document).unwrap_or(Value::Null)
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default
            .as_deref()
            .filter(|name| self.presets.contains_key(*name))
    }

    pub fn default_snapshot(&self) -> Option<(&str, &S)> {
        let name = self.default_name()?;
        self.presets.get(name).map(|snapshot| (name, snapshot))
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// Presets in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &S)> {
        self.presets
            .iter()
            .map(|(name, snapshot)| (name.as_str(), snapshot))
    }

    pub fn get(&self, name: &str) -> Result<&S, PresetError> {
        let name = name.trim();
        self.presets
            .get(name)
            .ok_or_else(|| PresetError::NotFound(name.to_string()))
    }

    /// Inserts or overwrites. Returns the trimmed name the preset was stored under.
    pub fn save_preset(&mut self, name: &str, snapshot: S) -> Result<String, PresetError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PresetError::EmptyName);
        }
        self.presets.insert(name.to_string(), snapshot);
        Ok(name.to_string())
    }

    /// Removes a preset, clearing the default if it pointed there. Returns
    /// the default after removal.
    pub fn delete_preset(&mut self, name: &str) -> Result<Option<String>, PresetError> {
        let name = name.trim();
        if self.presets.remove(name).is_none() {
            return Err(PresetError::NotFound(name.to_string()));
        }
        if self.default.as_deref() == Some(name) {
            self.default = None;
        }
        Ok(self.default.clone())
    }

    pub fn set_default(&mut self, name: &str) -> Result<&S, PresetError> {
        let name = name.trim();
        let Some(snapshot) = self.presets.get(name) else {
            return Err(PresetError::NotFound(name.to_string()));
        };
        self.default = Some(name.to_string());
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn party() -> SegmentsSnapshot {
        SegmentsSnapshot::from_stored(json!({
            "segments": {
                "strip1": {"pattern": "rainbow", "brightness": 200, "speed": 1.2, "color": [0, 0, 0]}
            }
        }), &mut Vec::new())
        .unwrap()
    }

    #[test]
    fn unknown_name_is_not_found_and_leaves_book_untouched() {
        let mut book = PresetBook::default();
        book.save_preset("party", party()).unwrap();
        book.set_default("party").unwrap();
        let before = book.clone();

        assert_eq!(
            book.get("ghost").unwrap_err(),
            PresetError::NotFound("ghost".into())
        );
        assert_eq!(
            book.set_default("ghost").unwrap_err(),
            PresetError::NotFound("ghost".into())
        );
        assert_eq!(
            book.delete_preset("ghost").unwrap_err(),
            PresetError::NotFound("ghost".into())
        );
        assert_eq!(book, before);
    }

    #[test]
    fn blank_names_are_rejected() {
        let mut book = PresetBook::<SegmentsSnapshot>::default();

        assert_eq!(book.save_preset("", party()), Err(PresetError::EmptyName));
        assert_eq!(book.save_preset("   \t", party()), Err(PresetError::EmptyName));
        assert!(book.is_empty());
    }

    #[test]
    fn names_are_trimmed_and_saves_overwrite() {
        let mut book = PresetBook::default();
        assert_eq!(book.save_preset("  party ", party()).unwrap(), "party");
        book.save_preset("party", SegmentsSnapshot::default()).unwrap();

        assert_eq!(book.len(), 1);
        assert_eq!(book.get(" party").unwrap(), &SegmentsSnapshot::default());
    }

    #[test]
    fn deleting_default_clears_pointer() {
        let mut book = PresetBook::default();
        book.save_preset("party", party()).unwrap();
        book.save_preset("calm", SegmentsSnapshot::default()).unwrap();
        book.set_default("party").unwrap();

        assert_eq!(book.delete_preset("calm").unwrap(), Some("party".into()));
        assert_eq!(book.delete_preset("party").unwrap(), None);

        let reloaded = PresetBook::<SegmentsSnapshot>::from_document(book.to_document());
        assert_eq!(reloaded.default_name(), None);
    }

    #[test]
    fn document_round_trip_normalizes_legacy_entries() {
        let stored = json!({
            "party": {"segments": {"strip1": {"pattern": "rainbow", "brightness": 200}}},
            "old": {"segment": "strip3", "pattern": "sine", "speed": 0.5},
            "older": {"pattern": "solid", "color": [1, 2, 3]},
            "junk": 7
        });

        let book = PresetBook::<SegmentsSnapshot>::from_document(stored);
        assert_eq!(book.len(), 3);

        let old = book.get("old").unwrap();
        assert_eq!(
            old.segments.get("strip3").and_then(|update| update.pattern),
            Some(SegmentPattern::Sine)
        );
        let older = book.get("older").unwrap();
        assert_eq!(
            older.segments.get("strip1").and_then(|update| update.color),
            Some([1, 2, 3])
        );

        let document = book.to_document();
        assert!(document["states"]["old"]["segments"]["strip3"].is_object());
        assert_eq!(PresetBook::from_document(document), book);
    }

    #[test]
    fn wrapper_round_trip_keeps_default() {
        let mut book = PresetBook::default();
        book.save_preset("party", party()).unwrap();
        book.set_default("party").unwrap();

        let document = book.to_document();
        assert_eq!(document["default"], "party");

        let reloaded = PresetBook::<SegmentsSnapshot>::from_document(document);
        assert_eq!(reloaded, book);
        assert_eq!(reloaded.default_snapshot().map(|(name, _)| name), Some("party"));
    }

    #[test]
    fn dangling_default_is_dropped_on_load() {
        let book = PresetBook::<CammingSnapshot>::from_document(json!({
            "states": {"evening": {"pattern": "white", "white_balance": 2700}},
            "default": "morning"
        }));

        assert_eq!(book.len(), 1);
        assert_eq!(book.default_name(), None);
        assert!(book.to_document().get("default").is_none());
    }

    #[test]
    fn non_object_documents_load_empty() {
        assert!(PresetBook::<SegmentsSnapshot>::from_document(json!([1, 2])).is_empty());
        assert!(PresetBook::<CammingSnapshot>::from_document(Value::Null).is_empty());
    }

    #[test]
    fn loose_fields_are_coerced_instead_of_dropping_entries() {
        let (book, notes) = PresetBook::<SegmentsSnapshot>::read_document(json!({
            "states": {
                "cozy": {"segments": {
                    "strip1": {"pattern": "solid", "brightness": "120", "color": [255, 120, 0, 9]},
                    "strip2": {"pattern": "disco", "speed": 0.5},
                    "strip3": "off"
                }},
                "old": {"segment": "strip3", "pattern": "sine", "color": [256, 0, 0]}
            },
            "default": "old"
        }));

        assert_eq!(book.default_name(), Some("old"));
        let cozy = &book.get("cozy").unwrap().segments;
        assert_eq!(cozy["strip1"].brightness, Some(120.0));
        assert_eq!(cozy["strip1"].color, Some([255, 120, 0]));
        assert_eq!(cozy["strip2"].pattern, None);
        assert_eq!(cozy["strip2"].speed, Some(0.5));
        assert!(!cozy.contains_key("strip3"));

        let old = &book.get("old").unwrap().segments["strip3"];
        assert_eq!(old.pattern, Some(SegmentPattern::Sine));
        assert_eq!(old.color, Some([255, 0, 0]));

        assert_eq!(notes.len(), 2);
        assert!(notes
            .iter()
            .any(|note| note.contains("cozy") && note.contains("pattern")));
    }

    #[test]
    fn camming_snapshot_reads_numeric_text() {
        let mut notes = Vec::new();
        let snapshot = CammingSnapshot::from_stored(
            json!({"last_pattern": "rainbow", "brightness": "90", "white_balance": "warm"}),
            &mut notes,
        )
        .unwrap();

        assert_eq!(snapshot.pattern, Some(CammingPattern::Rainbow));
        assert_eq!(snapshot.brightness, Some(90.0));
        assert_eq!(snapshot.white_balance, None);
        assert_eq!(notes, vec![r#"dropped unreadable white_balance: "warm""#.to_string()]);
    }

    #[test]
    fn camming_snapshot_coerces_unknown_values() {
        let snapshot = CammingSnapshot::from_stored(json!({
            "pattern": "disco",
            "brightness": 120,
            "target": "left"
        }), &mut Vec::new())
        .unwrap();

        assert_eq!(snapshot.pattern, Some(CammingPattern::White));
        assert_eq!(snapshot.brightness, Some(120.0));
        assert_eq!(snapshot.target, Some(CammingTarget::Both));
        assert_eq!(snapshot.white_balance, None);
    }
}
