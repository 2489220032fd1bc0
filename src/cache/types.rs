//! Cache data model
//!
//! A cache maps fingerprints to the resource they were computed for. It keeps
//! insertion order so the persisted snapshot is stable between passes and
//! readable in a diff.

use std::collections::HashMap;
use std::fmt;

use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identity of a resource's current remote state
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A remotely hosted file tracked by the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Absolute URL of the file
    pub url: String,
}

impl ResourceDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// File name used for the local copy: everything after the last `/`
    pub fn local_name(&self) -> &str {
        local_name(&self.url)
    }
}

/// Derive the local file name for a URL
pub fn local_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

#[derive(Debug, Clone)]
struct Slot {
    seq: u64,
    descriptor: ResourceDescriptor,
}

/// Fingerprint → descriptor mapping with stable insertion order
///
/// Serialized as a JSON array of `[fingerprint, descriptor]` pairs.
#[derive(Debug, Clone, Default)]
pub struct Cache {
    slots: HashMap<Fingerprint, Slot>,
    next_seq: u64,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry. Replacing keeps the original position.
    pub fn insert(&mut self, fingerprint: Fingerprint, descriptor: ResourceDescriptor) {
        if let Some(slot) = self.slots.get_mut(&fingerprint) {
            slot.descriptor = descriptor;
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots.insert(fingerprint, Slot { seq, descriptor });
    }

    pub fn remove(&mut self, fingerprint: &Fingerprint) -> Option<ResourceDescriptor> {
        self.slots.remove(fingerprint).map(|slot| slot.descriptor)
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&ResourceDescriptor> {
        self.slots.get(fingerprint).map(|slot| &slot.descriptor)
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.slots.contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Entries in insertion order
    pub fn entries(&self) -> Vec<(&Fingerprint, &ResourceDescriptor)> {
        let mut entries: Vec<_> = self.slots.iter().collect();
        entries.sort_by_key(|(_, slot)| slot.seq);
        entries
            .into_iter()
            .map(|(fingerprint, slot)| (fingerprint, &slot.descriptor))
            .collect()
    }

    /// Fingerprints in insertion order
    pub fn fingerprints(&self) -> Vec<&Fingerprint> {
        self.entries().into_iter().map(|(fp, _)| fp).collect()
    }
}

impl PartialEq for Cache {
    /// Two caches are equal when they hold the same mapping, regardless of order.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .slots
                .iter()
                .all(|(fp, slot)| other.get(fp) == Some(&slot.descriptor))
    }
}

impl Eq for Cache {}

impl FromIterator<(Fingerprint, ResourceDescriptor)> for Cache {
    fn from_iter<I: IntoIterator<Item = (Fingerprint, ResourceDescriptor)>>(iter: I) -> Self {
        let mut cache = Cache::new();
        for (fingerprint, descriptor) in iter {
            cache.insert(fingerprint, descriptor);
        }
        cache
    }
}

impl Serialize for Cache {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = self.entries();
        let mut seq = serializer.serialize_seq(Some(entries.len()))?;
        for pair in entries {
            seq.serialize_element(&pair)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Cache {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = Cache;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an array of [fingerprint, {\"url\": ...}] pairs")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Cache, A::Error> {
                let mut cache = Cache::new();
                while let Some((fingerprint, descriptor)) =
                    seq.next_element::<(Fingerprint, ResourceDescriptor)>()?
                {
                    cache.insert(fingerprint, descriptor);
                }
                Ok(cache)
            }
        }

        deserializer.deserialize_seq(PairsVisitor)
    }
}
