use super::normalizer::canonicalize_property;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;

/// A property name as seen across feeds: `canonical` is the comparison key, `display`
/// the first-seen human-readable spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct PropertyKey {
    pub canonical: String,
    pub display: String,
}

impl PropertyKey {
    pub fn parse(raw: &str) -> Option<Self> {
        let canonical = canonicalize_property(raw);
        if canonical.is_empty() {
            return None;
        }

        Some(Self {
            canonical,
            display: raw.trim().to_string(),
        })
    }
}

/// Map keyed by property. Lookups canonicalize the probe, so either the canonical or the
/// display spelling (or any other casing of it) finds the entry. Serialization publishes
/// every entry under both keys.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMap<V> {
    entries: BTreeMap<String, (PropertyKey, V)>,
}

impl<V> Default for PropertyMap<V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<V> PropertyMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the value. The display spelling already on record is kept.
    pub fn insert(&mut self, key: PropertyKey, value: V) -> Option<V> {
        match self.entries.get_mut(&key.canonical) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.insert(key.canonical.clone(), (key, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.entries
            .get(&canonicalize_property(name))
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut V> {
        self.entries
            .get_mut(&canonicalize_property(name))
            .map(|(_, value)| value)
    }

    pub fn get_or_insert_with(&mut self, key: &PropertyKey, make: impl FnOnce() -> V) -> &mut V {
        let (_, value) = self
            .entries
            .entry(key.canonical.clone())
            .or_insert_with(|| (key.clone(), make()));
        value
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&canonicalize_property(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<V> {
        self.entries
            .remove(&canonicalize_property(name))
            .map(|(_, value)| value)
    }

    pub fn key(&self, name: &str) -> Option<&PropertyKey> {
        self.entries
            .get(&canonicalize_property(name))
            .map(|(key, _)| key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropertyKey, &V)> {
        self.entries.values().map(|(key, value)| (key, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> FromIterator<(PropertyKey, V)> for PropertyMap<V> {
    fn from_iter<I: IntoIterator<Item = (PropertyKey, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<V: Serialize> Serialize for PropertyMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut published: BTreeMap<&str, &V> = BTreeMap::new();
        for (key, value) in self.entries.values() {
            published.insert(key.canonical.as_str(), value);
        }
        for (key, value) in self.entries.values() {
            published.entry(key.display.as_str()).or_insert(value);
        }

        let mut map = serializer.serialize_map(Some(published.len()))?;
        for (name, value) in published {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for PropertyMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, V>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .filter_map(|(name, value)| PropertyKey::parse(&name).map(|key| (key, value)))
            .collect())
    }
}

/// First-seen display spellings across every feed of one run, so all maps built from
/// that run publish the same display key for a property.
#[derive(Debug, Default, Clone)]
pub struct PropertyRegistry {
    seen: PropertyMap<()>,
}

impl PropertyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, raw: &str) -> Option<PropertyKey> {
        let parsed = PropertyKey::parse(raw)?;
        self.seen.get_or_insert_with(&parsed, || ());
        self.seen.key(&parsed.canonical).cloned()
    }
}
