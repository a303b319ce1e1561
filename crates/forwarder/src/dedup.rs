//! Content fingerprints checked against the per-destination history.

use std::sync::Arc;

use {
    maxrelay_common::DestinationId,
    maxrelay_store::{Fingerprint, Store},
    sha2::{Digest, Sha256},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Not yet delivered to this destination. Carries the fingerprint to
    /// record.
    New(Fingerprint),
    Duplicate,
}

impl Classification {
    pub fn is_new(&self) -> bool {
        matches!(self, Self::New(_))
    }
}

/// SHA-256 of the UTF-8 text, hex encoded.
pub fn fingerprint(text: &str) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    Fingerprint::from_hex(format!("{:x}", hasher.finalize()))
}

/// Only the forwarding worker calls into this; registry and settings writers
/// elsewhere never touch the history table.
pub struct Deduplicator {
    store: Arc<Store>,
}

impl Deduplicator {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn classify(&self, destination: &DestinationId, text: &str) -> Classification {
        let fp = fingerprint(text);
        if self.store.is_processed(destination, &fp) {
            Classification::Duplicate
        } else {
            Classification::New(fp)
        }
    }

    /// Idempotent. Returns `true` when the fingerprint was not yet recorded.
    pub fn record_seen(
        &self,
        destination: &DestinationId,
        fingerprint: Fingerprint,
    ) -> maxrelay_store::Result<bool> {
        self.store.mark_processed(destination, fingerprint)
    }
}
