//! Per-destination history of delivered content fingerprints.

use std::collections::{HashMap, HashSet, VecDeque};

use {
    maxrelay_common::DestinationId,
    serde::{Deserialize, Serialize},
};

/// Fixed-width hex digest of a message text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Recency-ordered fingerprints with a set view for O(1) membership.
///
/// Persisted as a plain JSON array, oldest first.
#[derive(Debug, Clone, Default)]
pub struct FingerprintLog {
    order: VecDeque<Fingerprint>,
    seen: HashSet<Fingerprint>,
}

impl FingerprintLog {
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.seen.contains(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Fingerprint> {
        self.order.iter()
    }

    /// Append `fingerprint` unless already present. When the log already
    /// holds `cap` entries it is first cut down to the newest `retain`.
    /// Returns whether the fingerprint was added.
    pub fn insert(&mut self, fingerprint: Fingerprint, cap: usize, retain: usize) -> bool {
        if self.seen.contains(&fingerprint) {
            return false;
        }
        if self.order.len() >= cap {
            let drop_count = self.order.len().saturating_sub(retain);
            for old in self.order.drain(..drop_count) {
                self.seen.remove(&old);
            }
        }
        self.seen.insert(fingerprint.clone());
        self.order.push_back(fingerprint);
        true
    }
}

impl From<Vec<Fingerprint>> for FingerprintLog {
    fn from(list: Vec<Fingerprint>) -> Self {
        let mut log = Self::default();
        for fingerprint in list {
            if log.seen.insert(fingerprint.clone()) {
                log.order.push_back(fingerprint);
            }
        }
        log
    }
}

impl Serialize for FingerprintLog {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.order.iter())
    }
}

impl<'de> Deserialize<'de> for FingerprintLog {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Fingerprint>::deserialize(deserializer).map(Self::from)
    }
}

/// `processed_messages.json`: destination → fingerprint log.
pub type ProcessedHistory = HashMap<DestinationId, FingerprintLog>;
