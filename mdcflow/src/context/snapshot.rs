//! Immutable context snapshots.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// An immutable point-in-time copy of an execution unit's context.
///
/// Snapshots are what crosses execution-unit boundaries: they are captured
/// on the submitting unit and installed on the worker. Cloning is cheap
/// since the entries are shared behind an `Arc`, and the empty snapshot
/// holds no allocation at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextSnapshot {
    entries: Option<Arc<HashMap<String, String>>>,
}

impl ContextSnapshot {
    /// Returns the canonical empty snapshot.
    #[must_use]
    pub const fn empty() -> Self {
        Self { entries: None }
    }

    /// Creates a snapshot from a map of entries.
    ///
    /// Entries with an empty key are dropped.
    #[must_use]
    pub fn from_map(mut map: HashMap<String, String>) -> Self {
        map.retain(|k, _| !k.is_empty());
        if map.is_empty() {
            Self::empty()
        } else {
            Self {
                entries: Some(Arc::new(map)),
            }
        }
    }

    /// Gets a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.as_ref()?.get(key).map(String::as_str)
    }

    /// Checks if a key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.as_ref().is_some_and(|e| e.contains_key(key))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |e| e.len())
    }

    /// Returns true if the snapshot has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_none()
    }

    /// Iterates over the entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|e| e.iter())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the keys in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.iter().map(|(k, _)| k).collect();
        keys.sort_unstable();
        keys
    }

    /// Returns an owned copy of the entries.
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, String> {
        self.entries
            .as_ref()
            .map_or_else(HashMap::new, |e| e.as_ref().clone())
    }

    /// Returns the entries sorted by key.
    #[must_use]
    pub fn to_sorted(&self) -> BTreeMap<&str, &str> {
        self.iter().collect()
    }

    /// Returns a new snapshot with one entry added or replaced.
    #[must_use]
    pub fn with_entry(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut map = self.to_map();
        map.insert(key.into(), value.into());
        Self::from_map(map)
    }

    /// Returns true if both snapshots share the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.entries, &other.entries) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<HashMap<String, String>> for ContextSnapshot {
    fn from(map: HashMap<String, String>) -> Self {
        Self::from_map(map)
    }
}

impl<K, V> FromIterator<(K, V)> for ContextSnapshot
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl std::fmt::Display for ContextSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.to_sorted().into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("}")
    }
}

// Serialized as a sorted JSON object so structured log output is stable.
impl Serialize for ContextSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_sorted().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContextSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        HashMap::<String, String>::deserialize(deserializer).map(Self::from_map)
    }
}
