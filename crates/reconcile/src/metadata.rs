//! Typed metadata side table carried by every [`Item`](crate::Item)
//!
//! Resources use metadata to hand context from `desired()`/`actual()` through
//! reconciliation into `apply()`. The recognized keys are listed in [`keys`];
//! anything else is opaque to the reconciler.

use crate::drift::DriftComparator;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Recognized metadata keys.
///
/// Dotfile items use `source`, `destination`, `is_directory` and `template`.
/// Any item may carry `drift_comparator` (or the legacy `compare_fn`).
pub mod keys {
    /// Absolute path of the source file in the config directory
    pub const SOURCE: &str = "source";
    /// Absolute path of the deployed file
    pub const DESTINATION: &str = "destination";
    /// Whether the entry is a directory
    pub const IS_DIRECTORY: &str = "is_directory";
    /// Whether the source is rendered as a template before deployment
    pub const TEMPLATE: &str = "template";
    /// Typed drift comparator
    pub const DRIFT_COMPARATOR: &str = "drift_comparator";
    /// Legacy drift comparator key
    pub const COMPARE_FN: &str = "compare_fn";

    /// `meta` key set on degraded items
    pub const DRIFT_STATUS: &str = "drift_status";
    /// `meta` value of [`DRIFT_STATUS`] for content drift
    pub const DRIFT_MODIFIED: &str = "modified";
    /// `meta` key holding a comparison failure message
    pub const DRIFT_ERROR: &str = "drift_error";
}

/// Small string-to-string side table (`Item::meta`)
pub type StringMap = BTreeMap<String, String>;

/// A single metadata value
#[derive(Debug, Clone)]
pub enum MetaValue {
    Text(String),
    Bool(bool),
    Int(i64),
    List(Vec<String>),
    Map(Metadata),
    /// Capability, not data: skipped when serialized
    Comparator(Arc<dyn DriftComparator>),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Metadata> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    fn is_comparator(&self) -> bool {
        matches!(self, Self::Comparator(_))
    }
}

impl PartialEq for MetaValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            // Comparators are equal only when they are the same handle
            (Self::Comparator(a), Self::Comparator(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<Vec<String>> for MetaValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<Metadata> for MetaValue {
    fn from(value: Metadata) -> Self {
        Self::Map(value)
    }
}

impl Serialize for MetaValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(m) => m.serialize(serializer),
            Self::Comparator(_) => serializer.serialize_unit(),
        }
    }
}

/// Key-value metadata map with deterministic key order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata(BTreeMap<String, MetaValue>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.0.get(key)
    }

    /// Get a text value
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetaValue::as_str)
    }

    /// Get a boolean value, `false` when absent or not a boolean
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).and_then(MetaValue::as_bool).unwrap_or(false)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Option<MetaValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Attach a drift comparator under `key`
    pub fn set_comparator(&mut self, key: impl Into<String>, comparator: Arc<dyn DriftComparator>) {
        self.0.insert(key.into(), MetaValue::Comparator(comparator));
    }

    pub fn remove(&mut self, key: &str) -> Option<MetaValue> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetaValue)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

impl FromIterator<(String, MetaValue)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (String, MetaValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Metadata {
    type Item = (&'a String, &'a MetaValue);
    type IntoIter = std::collections::btree_map::Iter<'a, String, MetaValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let data: Vec<_> = self.0.iter().filter(|(_, v)| !v.is_comparator()).collect();
        let mut map = serializer.serialize_map(Some(data.len()))?;
        for (key, value) in data {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// ============================================================================
// Copy and merge helpers
// ============================================================================

/// Copy a metadata map.
///
/// Nested [`MetaValue::Map`] values are copied recursively. Comparator
/// handles are shared, not duplicated.
pub fn deep_copy_metadata(src: &Metadata) -> Metadata {
    src.iter()
        .map(|(key, value)| {
            let value = match value {
                MetaValue::Map(nested) => MetaValue::Map(deep_copy_metadata(nested)),
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect()
}

/// Copy a string map
pub fn deep_copy_string_map(src: &StringMap) -> StringMap {
    src.clone()
}

/// Merge `src` into a copy of `dst`; keys already in `dst` are kept.
pub fn merge_metadata(dst: &Metadata, src: &Metadata) -> Metadata {
    let mut merged = deep_copy_metadata(dst);
    for (key, value) in src {
        if !merged.contains_key(key) {
            let value = match value {
                MetaValue::Map(nested) => MetaValue::Map(deep_copy_metadata(nested)),
                other => other.clone(),
            };
            merged.0.insert(key.clone(), value);
        }
    }
    merged
}

/// Merge `src` into a copy of `dst`; keys already in `dst` are kept.
pub fn merge_string_map(dst: &StringMap, src: &StringMap) -> StringMap {
    let mut merged = dst.clone();
    for (key, value) in src {
        merged.entry(key.clone()).or_insert_with(|| value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::FnComparator;

    fn sample() -> Metadata {
        let mut nested = Metadata::new();
        nested.insert("inner", "value");

        let mut m = Metadata::new();
        m.insert("k1", "v1");
        m.insert("flag", true);
        m.insert("count", 3_i64);
        m.insert("nested", nested);
        m
    }

    #[test]
    fn test_deep_copy_empty() {
        assert!(deep_copy_metadata(&Metadata::new()).is_empty());
        assert!(deep_copy_string_map(&StringMap::new()).is_empty());
    }

    #[test]
    fn test_deep_copy_is_equal_but_independent() {
        let original = sample();
        let mut copy = deep_copy_metadata(&original);
        assert_eq!(copy, original);

        copy.insert("k1", "changed");
        assert_eq!(original.get_str("k1"), Some("v1"));
    }

    #[test]
    fn test_deep_copy_nested_map_is_independent() {
        let original = sample();
        let mut copy = deep_copy_metadata(&original);

        if let Some(MetaValue::Map(nested)) = copy.0.get_mut("nested") {
            nested.insert("inner", "mutated");
        }

        let nested = original.get("nested").and_then(MetaValue::as_map).unwrap();
        assert_eq!(nested.get_str("inner"), Some("value"));
    }

    #[test]
    fn test_deep_copy_shares_comparator() {
        let mut original = Metadata::new();
        original.set_comparator(keys::DRIFT_COMPARATOR, Arc::new(FnComparator::new(|| Ok(true))));
        let copy = deep_copy_metadata(&original);
        assert_eq!(copy.get(keys::DRIFT_COMPARATOR), original.get(keys::DRIFT_COMPARATOR));
    }

    #[test]
    fn test_merge_dst_wins() {
        let mut dst = Metadata::new();
        dst.insert("shared", "dst");
        dst.insert("only_dst", "a");
        let mut src = Metadata::new();
        src.insert("shared", "src");
        src.insert("only_src", "b");

        let merged = merge_metadata(&dst, &src);
        assert_eq!(merged.get_str("shared"), Some("dst"));
        assert_eq!(merged.get_str("only_dst"), Some("a"));
        assert_eq!(merged.get_str("only_src"), Some("b"));
        assert_eq!(merged.len(), 3);

        // inputs untouched
        assert_eq!(dst.len(), 2);
        assert_eq!(src.len(), 2);
    }

    #[test]
    fn test_merge_with_empty_sides() {
        let m = sample();
        assert_eq!(merge_metadata(&m, &Metadata::new()), m);
        assert_eq!(merge_metadata(&Metadata::new(), &m), m);
        assert!(merge_metadata(&Metadata::new(), &Metadata::new()).is_empty());
    }

    #[test]
    fn test_merge_result_does_not_alias_src() {
        let dst = Metadata::new();
        let src = sample();
        let mut merged = merge_metadata(&dst, &src);
        if let Some(MetaValue::Map(nested)) = merged.0.get_mut("nested") {
            nested.insert("inner", "mutated");
        }
        let nested = src.get("nested").and_then(MetaValue::as_map).unwrap();
        assert_eq!(nested.get_str("inner"), Some("value"));
    }

    #[test]
    fn test_merge_string_map() {
        let dst: StringMap = [("a".to_string(), "1".to_string())].into();
        let src: StringMap = [
            ("a".to_string(), "2".to_string()),
            ("b".to_string(), "3".to_string()),
        ]
        .into();
        let merged = merge_string_map(&dst, &src);
        assert_eq!(merged["a"], "1");
        assert_eq!(merged["b"], "3");
    }

    #[test]
    fn test_accessors() {
        let m = sample();
        assert!(m.get_bool("flag"));
        assert!(!m.get_bool("missing"));
        assert!(!m.get_bool("k1"));
        assert_eq!(m.get_str("flag"), None);
        assert!(m.contains_key("count"));
    }

    #[test]
    fn test_serialize_skips_comparators() {
        let mut m = Metadata::new();
        m.insert(keys::SOURCE, "/cfg/zshrc");
        m.insert(keys::IS_DIRECTORY, false);
        m.set_comparator(keys::DRIFT_COMPARATOR, Arc::new(FnComparator::new(|| Ok(true))));

        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "is_directory": false, "source": "/cfg/zshrc" })
        );
    }
}
